use clap::Parser;
use pgshift_config::shared::ShiftConfig;
use pgshift_telemetry::init_logging;
use tracing::error;

use crate::config::load_shift_config;
use crate::core::{Cli, run_command};

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let shift_config = load_shift_config()?;

    let _log_guard = init_logging(env!("CARGO_BIN_NAME"), &shift_config.log)?;

    // We start the runtime.
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(cli, shift_config))?;

    Ok(())
}

async fn async_main(cli: Cli, shift_config: ShiftConfig) -> anyhow::Result<()> {
    if let Err(err) = run_command(cli, shift_config).await {
        error!("an error occurred in pgshift: {err}");

        return Err(err);
    }

    Ok(())
}
