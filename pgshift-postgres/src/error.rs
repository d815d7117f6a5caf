use thiserror::Error;
pub use tokio_postgres::error::SqlState;

/// SQLSTATE class of integrity constraint violations (`23xxx`).
const INTEGRITY_CONSTRAINT_VIOLATION_CLASS: &str = "23";

/// Errors returned by a [`crate::QueryExecutor`].
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid connection url: {0}")]
    InvalidConnectionUrl(#[source] tokio_postgres::Error),

    #[error("the connection requires tls but no trusted root certificates were given")]
    MissingTrustedRootCerts,

    #[error("failed to connect to postgres: {0}")]
    Connection(#[source] tokio_postgres::Error),

    /// The server rejected the statement.
    ///
    /// `message` is the server diagnostic as Postgres reports it, e.g.
    /// `ERROR: null value in column "name" of relation "groups" violates not-null constraint`.
    #[error("{message}")]
    Database { code: SqlState, message: String },

    #[error("postgres client error: {0}")]
    Client(#[source] tokio_postgres::Error),

    #[error("invalid tls configuration: {0}")]
    Tls(#[from] rustls::Error),

    #[error("an io error occurred: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Returns the SQLSTATE of a server side error.
    pub fn code(&self) -> Option<&SqlState> {
        match self {
            QueryError::Database { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Returns `true` when the server reported an integrity constraint violation
    /// (not-null, unique, foreign key, check or exclusion).
    pub fn is_constraint_violation(&self) -> bool {
        self.code()
            .is_some_and(|code| code.code().starts_with(INTEGRITY_CONSTRAINT_VIOLATION_CLASS))
    }
}

impl From<tokio_postgres::Error> for QueryError {
    /// Splits server diagnostics from client side failures.
    ///
    /// Server errors keep their SQLSTATE and their rendered diagnostic so callers can match on
    /// the code and still report the message verbatim.
    fn from(err: tokio_postgres::Error) -> Self {
        match err.as_db_error() {
            Some(db_error) => QueryError::Database {
                code: db_error.code().clone(),
                message: db_error.to_string(),
            },
            None => QueryError::Client(err),
        }
    }
}
