//! Configuration management for pgshift.
//!
//! Provides environment detection, configuration loading from YAML files and environment
//! variables, secret handling, and the shared configuration types used by the group store
//! and the command line tool.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
