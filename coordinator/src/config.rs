//! Coordinator configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use fhevote_types::{FeatureId, DEFAULT_ID_PREFIX};

use crate::status::{DEFAULT_ERROR_DISMISS, DEFAULT_SUCCESS_DISMISS};
use crate::{CoordinatorError, LogFormat};

/// Configuration for a coordinator session.
///
/// Can be loaded from a TOML file via [`CoordinatorConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// How long a success notification stays visible, in milliseconds.
    #[serde(default = "default_success_dismiss_ms")]
    pub success_dismiss_ms: u64,

    /// How long an error notification stays visible, in milliseconds.
    #[serde(default = "default_error_dismiss_ms")]
    pub error_dismiss_ms: u64,

    /// Upper bound on any single confirmation wait. Unset waits indefinitely.
    #[serde(default)]
    pub confirmation_timeout_secs: Option<u64>,

    /// Prefix of generated feature ids.
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Longest accepted `id_prefix`. Generated ids append up to 52 characters
/// (`-<millis>-<seq>-<16 hex>`) and must fit in [`FeatureId::MAX_LEN`].
pub const MAX_ID_PREFIX_LEN: usize = FeatureId::MAX_LEN - 60;

// ── Serde default helpers ──────────────────────────────────────────────

fn default_success_dismiss_ms() -> u64 {
    DEFAULT_SUCCESS_DISMISS.as_millis() as u64
}

fn default_error_dismiss_ms() -> u64 {
    DEFAULT_ERROR_DISMISS.as_millis() as u64
}

fn default_id_prefix() -> String {
    DEFAULT_ID_PREFIX.to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl CoordinatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, CoordinatorError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| CoordinatorError::Config(format!("{}: {e}", path.as_ref().display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, CoordinatorError> {
        let config: Self = toml::from_str(s).map_err(|e| CoordinatorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, CoordinatorError> {
        toml::to_string_pretty(self).map_err(|e| CoordinatorError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), CoordinatorError> {
        if self.success_dismiss_ms == 0 || self.error_dismiss_ms == 0 {
            return Err(CoordinatorError::Config(
                "dismiss intervals must be positive".into(),
            ));
        }
        if self.confirmation_timeout_secs == Some(0) {
            return Err(CoordinatorError::Config(
                "confirmation_timeout_secs must be positive when set".into(),
            ));
        }
        if self.id_prefix.is_empty() {
            return Err(CoordinatorError::Config("id_prefix must not be empty".into()));
        }
        if self.id_prefix.len() > MAX_ID_PREFIX_LEN {
            return Err(CoordinatorError::Config(format!(
                "id_prefix is {} bytes, at most {MAX_ID_PREFIX_LEN} allowed",
                self.id_prefix.len()
            )));
        }
        self.log_format()?;
        Ok(())
    }

    pub fn success_dismiss(&self) -> Duration {
        Duration::from_millis(self.success_dismiss_ms)
    }

    pub fn error_dismiss(&self) -> Duration {
        Duration::from_millis(self.error_dismiss_ms)
    }

    pub fn confirmation_timeout(&self) -> Option<Duration> {
        self.confirmation_timeout_secs.map(Duration::from_secs)
    }

    pub fn log_format(&self) -> Result<LogFormat, CoordinatorError> {
        self.log_format.parse()
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            success_dismiss_ms: default_success_dismiss_ms(),
            error_dismiss_ms: default_error_dismiss_ms(),
            confirmation_timeout_secs: None,
            id_prefix: default_id_prefix(),
            log_format: default_log_format(),
            log_level: default_log_level(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = CoordinatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, CoordinatorConfig::default());
        assert_eq!(config.success_dismiss(), Duration::from_secs(2));
        assert_eq!(config.error_dismiss(), Duration::from_secs(3));
        assert_eq!(config.confirmation_timeout(), None);
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = CoordinatorConfig::from_toml_str(
            r#"
            success_dismiss_ms = 500
            confirmation_timeout_secs = 90
            log_format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.success_dismiss(), Duration::from_millis(500));
        assert_eq!(config.error_dismiss(), Duration::from_secs(3));
        assert_eq!(config.confirmation_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.log_format().unwrap(), LogFormat::Json);
    }

    #[test]
    fn rejects_zero_dismiss_interval() {
        assert!(CoordinatorConfig::from_toml_str("error_dismiss_ms = 0").is_err());
    }

    #[test]
    fn rejects_prefix_that_leaves_no_room_for_ids() {
        let longest = "p".repeat(MAX_ID_PREFIX_LEN);
        assert!(CoordinatorConfig::from_toml_str(&format!("id_prefix = \"{longest}\"")).is_ok());

        let too_long = "p".repeat(MAX_ID_PREFIX_LEN + 1);
        let err = CoordinatorConfig::from_toml_str(&format!("id_prefix = \"{too_long}\""))
            .unwrap_err();
        assert!(matches!(err, CoordinatorError::Config(_)));
    }

    #[test]
    fn longest_prefix_still_yields_valid_ids() {
        use fhevote_types::{IdGenerator, RandomIdGenerator, SystemClock};
        use std::sync::Arc;
        let ids = RandomIdGenerator::new("p".repeat(MAX_ID_PREFIX_LEN), Arc::new(SystemClock));
        assert!(ids.next_id().is_ok());
    }

    #[test]
    fn rejects_unknown_log_format() {
        assert!(CoordinatorConfig::from_toml_str("log_format = \"xml\"").is_err());
    }

    #[test]
    fn toml_roundtrip() {
        let config = CoordinatorConfig {
            confirmation_timeout_secs: Some(30),
            ..CoordinatorConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(CoordinatorConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id_prefix = \"vote\"").unwrap();
        let config = CoordinatorConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.id_prefix, "vote");
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = CoordinatorConfig::from_toml_file("/nonexistent/fhevote.toml").unwrap_err();
        assert!(matches!(err, CoordinatorError::Config(_)));
    }
}
