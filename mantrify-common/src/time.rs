//! Timestamp utilities

use chrono::{DateTime, Utc};

/// Compact `YYYYMMDD_HHMMSS` stamp used in generated file names
pub fn file_stamp(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Calendar-date partition (`YYYYMMDD`) for a timestamp
pub fn date_partition(at: &DateTime<Utc>) -> String {
    at.format("%Y%m%d").to_string()
}
