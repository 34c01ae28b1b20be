//! Resolved configuration snapshot.
//!
//! The plugin resolves its configuration exactly once at process start and
//! passes the immutable [`PluginConfig`] by reference to every component
//! that needs it. There is no global singleton; tests that need a fresh
//! snapshot call [`PluginConfig::reload`], which re-reads the environment
//! and returns a new value.

use bon::Builder;
use strum::{Display, EnumString};

/// Verbosity levels understood by the plugin, lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Verbosity {
    Silent,
    Minimal,
    #[default]
    Normal,
    Detailed,
}

impl Verbosity {
    /// Map to the tracing level filter used by the logging sink.
    pub fn level_filter(self) -> tracing::level_filters::LevelFilter {
        use tracing::level_filters::LevelFilter;
        match self {
            Verbosity::Silent => LevelFilter::OFF,
            Verbosity::Minimal => LevelFilter::WARN,
            Verbosity::Normal => LevelFilter::INFO,
            Verbosity::Detailed => LevelFilter::DEBUG,
        }
    }
}

/// Immutable configuration snapshot consumed by the session and pipeline.
///
/// Resolution mechanics (env vars, `.env`) live in [`PluginConfig::from_env`];
/// everything downstream of the process edge only ever sees the resolved
/// values. Secret and code values are carried exactly as supplied, without
/// trimming.
#[derive(Debug, Clone, Default, Builder)]
pub struct PluginConfig {
    /// Force universal fallback: claims are never advertised and credentials
    /// are never produced while set.
    #[builder(default)]
    pub disabled: bool,

    /// Logging verbosity threshold.
    #[builder(default)]
    pub verbosity: Verbosity,

    /// Whether the second-factor gate is active.
    #[builder(default)]
    pub two_factor_enabled: bool,

    /// Base32-encoded shared secret for the second factor.
    pub two_factor_secret: Option<String>,

    /// Externally supplied one-time code for the current request window.
    pub two_factor_code: Option<String>,
}

const ENV_DISABLED: &str = "CREDPROV_DISABLED";
const ENV_VERBOSITY: &str = "CREDPROV_VERBOSITY";
const ENV_2FA_ENABLED: &str = "CREDPROV_2FA_ENABLED";
const ENV_2FA_SECRET: &str = "CREDPROV_2FA_SECRET";
const ENV_2FA_CODE: &str = "CREDPROV_2FA_CODE";

impl PluginConfig {
    /// Resolve a snapshot from the environment (loading `.env` if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        Self {
            disabled: env_flag(ENV_DISABLED),
            verbosity: std::env::var(ENV_VERBOSITY)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
            two_factor_enabled: env_flag(ENV_2FA_ENABLED),
            two_factor_secret: std::env::var(ENV_2FA_SECRET).ok(),
            two_factor_code: std::env::var(ENV_2FA_CODE).ok(),
        }
    }

    /// Re-resolve the environment into a fresh snapshot.
    ///
    /// Pure constructor for tests; the running session keeps whatever
    /// snapshot it was built with.
    pub fn reload() -> Self {
        Self::from_env()
    }
}

fn env_flag(name: &str) -> bool {
    match std::env::var(name) {
        Ok(value) => parse_flag(&value),
        Err(_) => false,
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
