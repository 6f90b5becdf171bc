use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "BOARDBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/boardbox.toml";
const ENV_PREFIX: &str = "BOARDBOX";
const ENV_SEPARATOR: &str = "__";
const TOKEN_ENV_VAR: &str = "BOARDBOX_TOKEN";

/// Load configuration with priority (lowest to highest):
/// struct defaults, TOML file, `.env` file, process environment.
pub fn load() -> Result<Config, ConfigError> {
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    load_secrets(&mut config);

    Ok(config)
}

/// The signing token only ever comes from the environment
fn load_secrets(config: &mut Config) {
    if let Ok(token) = env::var(TOKEN_ENV_VAR) {
        if !token.is_empty() {
            config.server.token = Some(token);
        }
    }
}

/// Load configuration from a specific path plus environment overrides
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // BOARDBOX__CLEANUP__TTL_HOURS -> cleanup.ttl_hours
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
