use pgshift_config::load_config;
use pgshift_config::shared::ShiftConfig;

/// Loads the [`ShiftConfig`] and validates it.
pub fn load_shift_config() -> anyhow::Result<ShiftConfig> {
    let config = load_config::<ShiftConfig>()?;
    config.validate()?;

    Ok(config)
}
