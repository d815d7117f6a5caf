use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// The internal schema name is empty.
    #[error("`internal_schema` cannot be empty")]
    EmptyInternalSchema,
    /// The internal schema name does not fit in a Postgres identifier.
    #[error("`internal_schema` is {0} bytes long, Postgres identifiers are limited to {max} bytes", max = super::MAX_IDENTIFIER_LENGTH)]
    InternalSchemaTooLong(usize),
}
