//! Id and timestamp helpers.

use chrono::Utc;
use uuid::Uuid;

/// Generates a new random id for a node execution, interrupt or notify key.
#[must_use]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current wall-clock time in epoch milliseconds.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_is_uuid_v4() {
        let id = generate_id();
        let parsed = Uuid::parse_str(&id).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn test_now_millis_is_positive() {
        assert!(now_millis() > 1_600_000_000_000);
    }
}
