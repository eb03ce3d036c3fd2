//! Conversion between stored integer timestamps and `chrono` values.
//!
//! Columns hold microseconds since the Unix epoch so that ordering and
//! `MAX(...)` comparisons happen natively in SQLite.

use chrono::{DateTime, Utc};

use crate::types::{DatabaseError, DatabaseResult};

pub fn to_micros(value: DateTime<Utc>) -> i64 {
    value.timestamp_micros()
}

pub fn from_micros(micros: i64) -> DatabaseResult<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(micros).ok_or_else(|| {
        DatabaseError::InternalError(format!("timestamp out of range: {micros}"))
    })
}

pub fn from_optional_micros(micros: Option<i64>) -> DatabaseResult<Option<DateTime<Utc>>> {
    micros.map(from_micros).transpose()
}

pub fn now_micros() -> i64 {
    to_micros(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_microsecond_precision() {
        let value = DateTime::<Utc>::from_timestamp_micros(1_700_000_000_123_456).unwrap();
        assert_eq!(from_micros(to_micros(value)).unwrap(), value);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(from_micros(i64::MAX).is_err());
    }
}
