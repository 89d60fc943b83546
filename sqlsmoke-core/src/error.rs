/// Structured error types for sqlsmoke-core.
///
/// Uses `thiserror` for better API surface and error composition.
/// The binary crate (sqlsmoke-cli) can still use `anyhow` for convenience,
/// but library consumers get structured, composable errors.
use std::time::Duration;

use thiserror::Error;

/// Main error type for driver operations. Every variant is fatal; failures
/// the driver tolerates never become a `SessionError` (see [`tolerated`]).
#[derive(Error, Debug)]
pub enum SessionError {
    /// A database call failed
    #[error("{op} failed: {source}")]
    Db {
        op: &'static str,
        source: sqlx::Error,
    },

    /// A scoped deadline elapsed before the call returned
    #[error("{op} did not complete within {timeout:?}")]
    Deadline {
        op: &'static str,
        timeout: Duration,
    },

    /// The shared cancellation context fired (interrupt signal)
    #[error("interrupted during {op}")]
    Interrupted { op: &'static str },
}

/// Result type alias for sqlsmoke-core operations
pub type Result<T> = std::result::Result<T, SessionError>;

impl SessionError {
    /// Wrap a driver error with the operation it came from
    pub fn db(op: &'static str, source: sqlx::Error) -> Self {
        Self::Db { op, source }
    }
}

/// The closed set of statement failures the driver tolerates. Anything not
/// classified here is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tolerated {
    /// An inserted value exceeds the range of the target column
    /// (SQLSTATE 22003, numeric_value_out_of_range)
    ValueOutOfRange,
    /// A scalar query returned zero rows
    NoRows,
}

/// SQLSTATE for numeric_value_out_of_range.
const OUT_OF_RANGE: &str = "22003";

/// Classify a statement failure as tolerated or fatal.
///
/// Applied after each statement execution; classification is on the
/// engine's SQLSTATE, never on message text.
pub fn tolerated(err: &sqlx::Error) -> Option<Tolerated> {
    match err {
        sqlx::Error::RowNotFound => Some(Tolerated::NoRows),
        sqlx::Error::Database(db) if db.code().as_deref() == Some(OUT_OF_RANGE) => {
            Some(Tolerated::ValueOutOfRange)
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_is_tolerated() {
        assert_eq!(tolerated(&sqlx::Error::RowNotFound), Some(Tolerated::NoRows));
    }

    #[test]
    fn test_other_errors_are_fatal() {
        assert_eq!(tolerated(&sqlx::Error::PoolTimedOut), None);
        assert_eq!(tolerated(&sqlx::Error::WorkerCrashed), None);

        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));
        assert_eq!(tolerated(&io), None);
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::db("bulk insert", sqlx::Error::PoolTimedOut);
        assert!(err.to_string().starts_with("bulk insert failed"));

        let err = SessionError::Deadline {
            op: "liveness probe",
            timeout: Duration::from_secs(1),
        };
        assert!(err.to_string().contains("liveness probe"));
        assert!(err.to_string().contains("1s"));

        let err = SessionError::Interrupted { op: "row read" };
        assert_eq!(err.to_string(), "interrupted during row read");
    }
}
