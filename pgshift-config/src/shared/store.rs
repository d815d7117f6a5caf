use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Default name of the internal schema holding the bookkeeping tables.
pub const DEFAULT_INTERNAL_SCHEMA: &str = "pgshift";

/// Maximum length in bytes of a Postgres identifier (`NAMEDATALEN - 1`).
pub const MAX_IDENTIFIER_LENGTH: usize = 63;

/// Configuration of the group store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GroupStoreConfig {
    /// Schema reserved for the tool's own tables, kept apart from user data.
    #[serde(default = "default_internal_schema")]
    pub internal_schema: String,
}

impl GroupStoreConfig {
    pub fn new(internal_schema: impl Into<String>) -> Self {
        Self {
            internal_schema: internal_schema.into(),
        }
    }

    /// Validates that the internal schema name is usable as a Postgres identifier.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.internal_schema.is_empty() {
            return Err(ValidationError::EmptyInternalSchema);
        }

        if self.internal_schema.len() > MAX_IDENTIFIER_LENGTH {
            return Err(ValidationError::InternalSchemaTooLong(
                self.internal_schema.len(),
            ));
        }

        Ok(())
    }
}

impl Default for GroupStoreConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INTERNAL_SCHEMA)
    }
}

fn default_internal_schema() -> String {
    DEFAULT_INTERNAL_SCHEMA.to_owned()
}
