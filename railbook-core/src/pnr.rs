use chrono::Utc;
use uuid::Uuid;

/// Fixed width of a generated locator: 6 timestamp digits, a hyphen and
/// 12 random digits, all uppercase hex.
pub const LOCATOR_LEN: usize = 19;

/// Generate a booking locator: the low 6 hex digits of the epoch
/// millisecond clock followed by 48 random bits.
///
/// Time-sortable at millisecond granularity and collision-resistant over
/// the practical lifetime of the system, but not collision-proof by
/// construction. Callers must treat a duplicate-key failure from the
/// store as recoverable and retry with a fresh locator.
pub fn generate() -> String {
    let millis = Utc::now().timestamp_millis();
    let ts_hex = format!("{:06x}", millis);
    let ts_tail = &ts_hex[ts_hex.len() - 6..];
    let random = Uuid::new_v4().simple().to_string();
    format!("{}-{}", ts_tail, &random[..12]).to_uppercase()
}
