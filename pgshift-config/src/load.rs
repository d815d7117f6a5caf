use serde::de::DeserializeOwned;
use std::path::Path;

use crate::environment::Environment;

/// Directory containing configuration files relative to the working directory.
const CONFIGURATION_DIR: &str = "configuration";

/// Base configuration file loaded for all environments.
const BASE_CONFIG_FILE: &str = "base.yaml";

/// Prefix for environment variable configuration overrides.
const ENV_PREFIX: &str = "APP";

/// Separator between environment variable prefix and key segments.
const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator for nested configuration keys in environment variables.
///
/// Example: `APP_SOURCE__HOST` sets the `source.host` field.
const ENV_SEPARATOR: &str = "__";

/// Separator for list elements in environment variables.
const LIST_SEPARATOR: &str = ",";

/// Trait defining the list of keys that should be parsed as lists in a given [`Config`]
/// implementation.
pub trait Config {
    /// Slice containing all the keys that should be parsed as lists when loading the configuration.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Loads hierarchical configuration from the `configuration` directory of the current
/// working directory.
///
/// See [`load_config_from`] for the layering rules.
pub fn load_config<T>() -> Result<T, config::ConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;

    load_config_from(&base_path.join(CONFIGURATION_DIR))
}

/// Loads hierarchical configuration from YAML files in `configuration_directory` and from
/// environment variables.
///
/// Sources are layered in this order:
/// 1. `base.yaml`
/// 2. `{environment}.yaml`, where the environment comes from `APP_ENVIRONMENT` (optional file)
/// 3. Environment variables prefixed with `APP`
///
/// Nested keys use double underscores: `APP_STORE__INTERNAL_SCHEMA` → `store.internal_schema`.
pub fn load_config_from<T>(configuration_directory: &Path) -> Result<T, config::ConfigError>
where
    T: Config + DeserializeOwned,
{
    let environment =
        Environment::load().map_err(|e| config::ConfigError::Foreign(Box::new(e)))?;
    let environment_filename = format!("{environment}.yaml");

    let mut environment_source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !<T as Config>::LIST_PARSE_KEYS.is_empty() {
        environment_source = environment_source
            .try_parsing(true)
            .list_separator(LIST_SEPARATOR);

        for key in <T as Config>::LIST_PARSE_KEYS {
            environment_source = environment_source.with_list_parse_key(key);
        }
    }

    let settings = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join(BASE_CONFIG_FILE),
        ))
        .add_source(
            config::File::from(configuration_directory.join(environment_filename))
                .required(false),
        )
        .add_source(environment_source)
        .build()?;

    settings.try_deserialize::<T>()
}
