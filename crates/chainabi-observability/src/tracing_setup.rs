//! Logging initialisation helpers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing_subscriber::{
    filter::ParseError, fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError,
    EnvFilter,
};

/// Log level per component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Per-crate overrides, e.g. `chainabi-evm = "debug"`.
    #[serde(default)]
    pub components: BTreeMap<String, String>,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self { level: default_level(), components: BTreeMap::new(), json: false }
    }
}

impl LogConfig {
    /// The `EnvFilter` directive string, e.g. `info,chainabi_evm=debug`.
    pub fn directives(&self) -> String {
        let mut directives = self.level.clone();
        for (component, level) in &self.components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("invalid log directive: {0}")]
    InvalidDirective(#[from] ParseError),

    #[error("global subscriber already set: {0}")]
    AlreadyInitialised(#[from] TryInitError),
}

/// Install the global subscriber, failing on a bad directive or when one
/// is already installed.
pub fn try_init_tracing(config: &LogConfig) -> Result<(), TracingError> {
    let filter = EnvFilter::try_new(config.directives())?;
    if config.json {
        tracing_subscriber::registry().with(filter).with(fmt::layer().json()).try_init()?;
    } else {
        tracing_subscriber::registry().with(filter).with(fmt::layer()).try_init()?;
    }
    Ok(())
}

/// Install the global subscriber at application startup.
///
/// Bad directives fall back to `info`. A subscriber installed earlier is
/// left in place.
pub fn init_tracing(config: &LogConfig) {
    match try_init_tracing(config) {
        Ok(()) => {}
        Err(TracingError::InvalidDirective(_)) => {
            let fallback = LogConfig { json: config.json, ..LogConfig::default() };
            let _ = try_init_tracing(&fallback);
        }
        Err(TracingError::AlreadyInitialised(_)) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_normalise_crate_names() {
        let mut config = LogConfig::default();
        config.components.insert("chainabi-evm".into(), "debug".into());
        config.components.insert("chainabi-core".into(), "warn".into());
        assert_eq!(config.directives(), "info,chainabi_core=warn,chainabi_evm=debug");
    }

    #[test]
    fn config_defaults_from_json() {
        let config: LogConfig = serde_json::from_str(r#"{"json": true}"#).unwrap();
        assert_eq!(config.level, "info");
        assert!(config.json);
        assert!(config.components.is_empty());
    }

    #[test]
    fn bad_directive_is_reported() {
        let config = LogConfig { level: "chainabi=loud".into(), ..LogConfig::default() };
        assert!(matches!(try_init_tracing(&config), Err(TracingError::InvalidDirective(_))));
    }
}
