use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{GroupStoreConfig, LogConfig, PgConnectionConfig, ValidationError};

/// Complete configuration of the `pgshift` tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ShiftConfig {
    /// Database holding the internal schema, usually the source of the replication.
    ///
    /// Optional so that a connection url given on the command line can stand in for it.
    #[serde(default)]
    pub source: Option<PgConnectionConfig>,
    /// Group store settings.
    #[serde(default)]
    pub store: GroupStoreConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl ShiftConfig {
    /// Validates the complete configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(source) = &self.source {
            source.validate()?;
        }

        self.store.validate()
    }
}

impl Config for ShiftConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}
