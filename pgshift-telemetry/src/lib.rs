//! Logging bootstrap for the pgshift command line tool and its tests.
//!
//! Events are written to stderr, as JSON in production and pretty-printed in development, or
//! to daily rolling files when a log directory is configured.

mod logging;

pub use logging::{LogFormat, LogGuard, LoggingError, init_logging, init_test_logging};
