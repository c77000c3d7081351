//! Timestamp encoding for TEXT columns.

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};

use crate::{DbError, DbResult};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Encode as fixed-width UTC text, e.g. `2025-03-04T10:00:00.000000Z`.
pub fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

pub fn decode_timestamp(raw: &str) -> DbResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|e| DbError::Timestamp(format!("{}: {}", raw, e)))
}

pub fn decode_optional_timestamp(raw: Option<String>) -> DbResult<Option<DateTime<Utc>>> {
    raw.as_deref().map(decode_timestamp).transpose()
}

/// Drop precision the column cannot hold, so values read back compare equal.
pub fn storable(value: DateTime<Utc>) -> DateTime<Utc> {
    value.trunc_subsecs(6)
}

/// Half-open `[00:00, next 00:00)` UTC bounds for a calendar date.
pub fn day_bounds(date: NaiveDate) -> DbResult<(DateTime<Utc>, DateTime<Utc>)> {
    let start = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DbError::Timestamp(format!("invalid date {}", date)))?
        .and_utc();
    let next = date
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| DbError::Timestamp(format!("date {} has no successor", date)))?
        .and_utc();
    Ok((start, next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_encoding_is_fixed_width_and_ordered() {
        let early = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
        let later = early + Duration::microseconds(1);

        let a = encode_timestamp(&early);
        let b = encode_timestamp(&later);

        assert_eq!(a, "2025-01-02T09:00:00.000000Z");
        assert_eq!(a.len(), b.len());
        assert!(a < b);
        assert_eq!(decode_timestamp(&b).unwrap(), later);
    }

    #[test]
    fn test_day_bounds() {
        let date = NaiveDate::from_ymd_opt(2025, 2, 28).unwrap();
        let (start, end) = day_bounds(date).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_bad_timestamp_is_reported() {
        assert!(matches!(decode_timestamp("yesterday"), Err(DbError::Timestamp(_))));
    }
}
