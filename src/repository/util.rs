//! Repository utilities.

use chrono::{DateTime, FixedOffset, Utc};
use diesel::result::{DatabaseErrorInformation, DatabaseErrorKind};

/// Simple error info wrapper for database errors.
#[derive(Debug)]
pub struct DbErrorInfo(pub String);

impl DatabaseErrorInformation for DbErrorInfo {
    fn message(&self) -> &str {
        &self.0
    }
    fn details(&self) -> Option<&str> {
        None
    }
    fn hint(&self) -> Option<&str> {
        None
    }
    fn table_name(&self) -> Option<&str> {
        None
    }
    fn column_name(&self) -> Option<&str> {
        None
    }
    fn constraint_name(&self) -> Option<&str> {
        None
    }
    fn statement_position(&self) -> Option<i32> {
        None
    }
}

/// Convert any displayable error to a diesel error with proper message.
pub fn to_diesel_error(e: impl std::fmt::Display) -> diesel::result::Error {
    diesel::result::Error::DatabaseError(
        DatabaseErrorKind::Unknown,
        Box::new(DbErrorInfo(e.to_string())),
    )
}

/// Whether an error is a unique-constraint collision.
pub fn is_unique_violation(e: &diesel::result::Error) -> bool {
    matches!(
        e,
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

/// Parse a stored timestamp, defaulting to the Unix epoch.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

pub fn parse_datetime_opt(s: Option<String>) -> Option<DateTime<Utc>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse a stored timestamp keeping its original offset.
pub fn parse_offset_datetime(s: Option<String>) -> Option<DateTime<FixedOffset>> {
    s.and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
}

/// Decode an optional JSON column, dropping undecodable payloads.
pub fn decode_json<T: serde::de::DeserializeOwned>(raw: Option<&str>, column: &str) -> Option<T> {
    let raw = raw?;
    if raw.trim().is_empty() || raw == "null" {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring undecodable {} payload: {}", column, e);
            None
        }
    }
}

/// Encode an optional JSON column.
pub fn encode_json<T: serde::Serialize>(value: Option<&T>) -> Option<String> {
    value.and_then(|v| serde_json::to_string(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_keeps_offset() {
        let dt = parse_offset_datetime(Some("2026-01-15T20:29:57+01:00".into())).unwrap();
        assert_eq!(dt.to_rfc3339(), "2026-01-15T20:29:57+01:00");
        assert_eq!(parse_datetime("garbage"), DateTime::UNIX_EPOCH);
        assert!(parse_datetime_opt(None).is_none());
    }

    #[test]
    fn test_decode_json_tolerates_garbage() {
        let v: Option<Vec<i32>> = decode_json(Some("[1,2]"), "x");
        assert_eq!(v, Some(vec![1, 2]));
        let v: Option<Vec<i32>> = decode_json(Some("{oops"), "x");
        assert_eq!(v, None);
        let v: Option<Vec<i32>> = decode_json(Some("null"), "x");
        assert_eq!(v, None);
    }
}
