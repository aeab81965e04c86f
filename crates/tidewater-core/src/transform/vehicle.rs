use serde_json::Value;

/// 船舶コードの `V` とゼロ埋めを取り除いて数値化
///
/// `"V000123"` -> `123`。残りが空・数値でない場合は `None`。
pub fn parse_vehicle_id(raw: &str) -> Option<u64> {
    let digits = raw.trim().trim_start_matches(['V', '0']);
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// フィールド値に同じ規則を適用（数値はそのまま）
pub(crate) fn vehicle_id_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => parse_vehicle_id(s),
        Value::Number(n) => n.as_u64().filter(|n| *n > 0),
        _ => None,
    }
}
