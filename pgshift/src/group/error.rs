use pgshift_postgres::QueryError;
use thiserror::Error;

/// Errors returned by [`crate::group::GroupStore`].
#[derive(Debug, Error)]
pub enum GroupError {
    /// The insert violated a table constraint, e.g. a group without a name.
    ///
    /// Holds the server diagnostic verbatim.
    #[error("Adding group entry failed: {0}")]
    ConstraintViolation(String),

    /// The server rejected the insert for another reason.
    #[error("Adding group entry failed: {0}")]
    CreateFailed(String),

    /// The insert succeeded but returned no row.
    #[error("Adding group entry failed: no row returned")]
    NoRowReturned,

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("failed to decode group row: {0}")]
    Decode(#[from] GroupDecodeError),
}

impl GroupError {
    /// Classifies a failure of the insert statement.
    ///
    /// Server side errors carry the prefixed diagnostic, anything else (connection, tls) is
    /// propagated untouched.
    pub(crate) fn from_create_failure(err: QueryError) -> Self {
        let is_constraint_violation = err.is_constraint_violation();
        match err {
            QueryError::Database { message, .. } if is_constraint_violation => {
                GroupError::ConstraintViolation(message)
            }
            QueryError::Database { message, .. } => GroupError::CreateFailed(message),
            err => GroupError::Query(err),
        }
    }
}

/// Errors raised while decoding a text row into a typed value.
#[derive(Debug, Error)]
pub enum GroupDecodeError {
    #[error("column `{0}` is missing from the row")]
    MissingColumn(&'static str),

    #[error("column `{0}` is null")]
    UnexpectedNull(&'static str),

    #[error("column `{column}` holds an invalid integer `{value}`: {source}")]
    InvalidInteger {
        column: &'static str,
        value: String,
        source: std::num::ParseIntError,
    },

    #[error("column `{column}` holds an invalid timestamp `{value}`: {source}")]
    InvalidTimestamp {
        column: &'static str,
        value: String,
        source: chrono::ParseError,
    },

    #[error("column `{column}` holds an invalid boolean `{value}`")]
    InvalidBoolean { column: &'static str, value: String },
}
