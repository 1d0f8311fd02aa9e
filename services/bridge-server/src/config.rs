//! Configuration loading
//!
//! Layers, lowest precedence first: builder defaults, the optional config
//! file, then `BRIDGE__*` environment variables
//! (e.g. `BRIDGE__API_PORT=9090`).

use ::config::{Config, ConfigBuilder, Environment, File, FileFormat};
use anyhow::Context;
use binding_core::BridgeConfig;
use std::env;

/// Config file used when neither `--config` nor `BRIDGE_CONFIG` is set
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// Resolve the config file path from `--config <path>`, `--config=<path>`,
/// `BRIDGE_CONFIG`, then the default
pub fn config_path<I>(args: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return path;
            }
        } else if let Some(path) = arg.strip_prefix("--config=") {
            return path.to_string();
        }
    }
    env::var("BRIDGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

fn defaults() -> anyhow::Result<ConfigBuilder<::config::builder::DefaultState>> {
    let defaults = BridgeConfig::default();
    Ok(Config::builder()
        .set_default("api_port", i64::from(defaults.api_port))?
        .set_default("log_level", defaults.log_level)?
        .set_default("log_format", defaults.log_format)?
        .set_default("bootstrap_interval_ms", defaults.bootstrap_interval_ms as i64)?)
}

fn finish(builder: ConfigBuilder<::config::builder::DefaultState>) -> anyhow::Result<BridgeConfig> {
    let config: BridgeConfig = builder
        .add_source(
            Environment::with_prefix("BRIDGE")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()
        .context("failed to build configuration")?
        .try_deserialize()
        .context("failed to deserialize configuration")?;

    config.validate()?;
    Ok(config)
}

/// Load and validate configuration from `path` (missing file is allowed)
pub fn load(path: &str) -> anyhow::Result<BridgeConfig> {
    finish(defaults()?.add_source(File::with_name(path).required(false)))
        .with_context(|| format!("loading {}", path))
}

/// Load and validate configuration from an in-memory TOML document
pub fn from_toml(document: &str) -> anyhow::Result<BridgeConfig> {
    finish(defaults()?.add_source(File::from_str(document, FileFormat::Toml)))
}
