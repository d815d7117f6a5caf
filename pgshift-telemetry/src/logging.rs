use pgshift_config::Environment;
use pgshift_config::shared::LogConfig;
use std::backtrace::Backtrace;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Once;
use thiserror::Error;
use tracing::subscriber::{SetGlobalDefaultError, set_global_default};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, InitError, RollingFileAppender};
use tracing_log::LogTracer;
use tracing_log::log_tracer::SetLoggerError;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::{self, TestWriter};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Filter applied when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "info";

/// Number of daily log files kept in the log directory.
const MAX_LOG_FILES: usize = 5;

/// Environment variable turning on log output in tests.
const ENABLE_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to read the environment: {0}")]
    Environment(#[from] std::io::Error),

    #[error("failed to open the log directory: {0}")]
    LogDirectory(#[from] InitError),

    #[error("failed to forward `log` records: {0}")]
    LogTracer(#[from] SetLoggerError),

    #[error("failed to install the global subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Shape of the emitted events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi line, human readable events.
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Production like environments log JSON, development logs pretty events.
    pub fn for_environment(environment: Environment) -> Self {
        if environment.is_prod() {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Keeps the background writer of the log files running.
///
/// Hold it until the process exits, dropping it flushes the buffered events.
#[must_use]
pub struct LogGuard {
    _worker: Option<WorkerGuard>,
}

static INIT_TEST_LOGGING: Once = Once::new();

/// Installs logging for tests when `ENABLE_TRACING` is set, events are captured per test.
///
/// ```bash
/// ENABLE_TRACING=1 cargo test test_name
/// ```
pub fn init_test_logging() {
    INIT_TEST_LOGGING.call_once(|| {
        if std::env::var_os(ENABLE_TRACING_ENV_NAME).is_some() {
            install(LogFormat::Pretty, BoxMakeWriter::new(TestWriter::new()), false)
                .expect("Failed to initialize logging for tests");
        }
    });
}

/// Installs the global subscriber of a command line run.
///
/// Events go to stderr, stdout is left to the command output. When `log_config` names a
/// directory, events are appended to daily rolling `<app_name>.*.log` files there instead.
/// The filter is read from `RUST_LOG` and defaults to `info`.
pub fn init_logging(app_name: &str, log_config: &LogConfig) -> Result<LogGuard, LoggingError> {
    let format = LogFormat::for_environment(Environment::load()?);

    let guard = match &log_config.directory {
        Some(directory) => {
            let (writer, worker) = tracing_appender::non_blocking(daily_file(app_name, directory)?);
            install(format, BoxMakeWriter::new(writer), false)?;

            LogGuard {
                _worker: Some(worker),
            }
        }
        None => {
            let ansi = std::io::stderr().is_terminal();
            install(format, BoxMakeWriter::new(std::io::stderr), ansi)?;

            LogGuard { _worker: None }
        }
    };

    Ok(guard)
}

fn daily_file(app_name: &str, directory: &Path) -> Result<RollingFileAppender, InitError> {
    rolling::Builder::new()
        .filename_prefix(app_name)
        .filename_suffix("log")
        .rotation(rolling::Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .build(directory)
}

fn install(format: LogFormat, writer: BoxMakeWriter, ansi: bool) -> Result<(), LoggingError> {
    LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = Registry::default()
        .with(event_layer(format, writer, ansi))
        .with(filter);
    set_global_default(subscriber)?;

    install_panic_hook();

    Ok(())
}

fn event_layer(
    format: LogFormat,
    writer: BoxMakeWriter,
    ansi: bool,
) -> Box<dyn Layer<Registry> + Send + Sync> {
    match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_ansi(ansi)
            .with_file(false)
            .with_line_number(false)
            .with_writer(writer)
            .boxed(),
    }
}

/// Logs panics as error events, then hands over to the previous hook.
fn install_panic_hook() {
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(
            panic = %info,
            backtrace = %Backtrace::capture(),
            "pgshift panicked"
        );
        previous_hook(info);
    }));
}
