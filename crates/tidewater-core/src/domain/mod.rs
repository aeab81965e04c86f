//! Domain model (ids, records, queries, tasks, outcomes, errors).

pub mod errors;
pub mod ids;
pub mod outcome;
pub mod partition;
pub mod query;
pub mod record;
pub mod task;

pub use errors::{
    ConfigError, ErrorKind, ExtractError, PersistError, RegistryError, SchemaMismatch,
    SourceError, TaskError,
};
pub use ids::RunId;
pub use outcome::{ExtractionOutcome, RunSummary, TaskReport};
pub use partition::{DEFAULT_STREAM, PartitionLayout, PartitionScope, VehicleId, date_partition};
pub use query::{ParamValue, Query, QueryParam};
pub use record::{Record, ResultSet};
pub use task::{OutputFile, SourceKind, TaskDefinition, TaskId};
