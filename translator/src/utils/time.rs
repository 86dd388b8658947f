//! Time utility functions

use chrono::{DateTime, Utc};

/// Convert nanoseconds since Unix epoch to DateTime<Utc>
pub fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    match i64::try_from(nanos) {
        Ok(nanos) => DateTime::from_timestamp_nanos(nanos),
        Err(_) => {
            tracing::warn!(nanos, "Timestamp out of range, using epoch");
            DateTime::UNIX_EPOCH
        }
    }
}
