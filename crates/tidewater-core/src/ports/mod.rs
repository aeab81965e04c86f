//! Ports - 抽象化レイヤー
//!
//! 外部システム（Postgres, lake gateway, ファイルシステム, 時刻）への
//! インターフェースを trait として定義します。

pub mod clock;
pub mod id_generator;
pub mod sink;
pub mod source;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::sink::{RecordSink, SaveStatus};
pub use self::source::QuerySource;
