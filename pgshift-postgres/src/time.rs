use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

/// Postgres timestamp format for parsing timestamps with optional fractional seconds.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Timestamp format used when writing values, fixed to the microsecond resolution Postgres
/// stores.
pub const TIMESTAMP_WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Number of fractional second digits Postgres keeps for `timestamp` columns.
const POSTGRES_TIMESTAMP_PRECISION: u16 = 6;

/// Truncates a timestamp to the precision Postgres stores.
///
/// A value written with [`format_timestamp`] reads back equal to the truncated input.
pub fn truncate_to_postgres_precision(timestamp: DateTime<Utc>) -> NaiveDateTime {
    timestamp
        .naive_utc()
        .trunc_subsecs(POSTGRES_TIMESTAMP_PRECISION)
}

/// Formats a UTC instant as a `timestamp without time zone` literal body.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .naive_utc()
        .format(TIMESTAMP_WRITE_FORMAT)
        .to_string()
}

/// Parses the text form of a `timestamp without time zone` value.
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
}
