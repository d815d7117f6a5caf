use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Log output of the command line tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LogConfig {
    /// Directory receiving daily rolling log files. Logs go to stderr when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
}
