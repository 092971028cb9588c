//! Session configuration
//!
//! Loaded from TOML (every field optional) or built in code with the
//! `with_*` methods.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Reconnect backoff parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// First delay after a failure
    pub initial_ms: u64,
    /// Upper bound for any delay
    pub max_ms: u64,
    /// Growth factor per consecutive failure
    pub multiplier: f64,
    /// Random spread as a fraction of the delay, in `[0, 1]`
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_ms: 500,
            max_ms: 30_000,
            multiplier: 2.0,
            jitter: 0.0,
        }
    }
}

impl BackoffConfig {
    /// Delay before reconnect attempt number `attempt` (0-based), without jitter
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let millis = (self.initial_ms as f64) * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Delay with jitter applied, still capped at `max_ms`
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter <= 0.0 {
            return base;
        }
        let spread = rand::random::<f64>() * 2.0 - 1.0;
        let jittered = base.as_secs_f64() * (1.0 + self.jitter * spread);
        Duration::from_secs_f64(jittered.max(0.0)).min(Duration::from_millis(self.max_ms))
    }
}

/// Editing session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Quiet period before an auto-save fires
    pub autosave_debounce_ms: u64,
    pub backoff: BackoffConfig,
    /// Broadcast the full graph after each (re)connect
    pub resync_on_reconnect: bool,
    /// Column width of the generated-node lane layout
    pub lane_column_width: f64,
    /// Default `tracing` filter (`RUST_LOG` takes precedence)
    pub log_filter: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            autosave_debounce_ms: 10_000,
            backoff: BackoffConfig::default(),
            resync_on_reconnect: true,
            lane_column_width: 220.0,
            log_filter: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    #[must_use]
    pub fn with_autosave_debounce(mut self, debounce: Duration) -> Self {
        self.autosave_debounce_ms = u64::try_from(debounce.as_millis()).unwrap_or(u64::MAX);
        self
    }

    #[inline]
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_resync_on_reconnect(mut self, resync: bool) -> Self {
        self.resync_on_reconnect = resync;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_lane_column_width(mut self, width: f64) -> Self {
        self.lane_column_width = width;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    #[inline]
    #[must_use]
    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }

    /// Parse and validate TOML text
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML
    /// - `ConfigError::Invalid` if a value is out of range
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - see [`SessionConfig::from_toml_str`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// - `ConfigError::Invalid` naming the first offending field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.autosave_debounce_ms == 0 {
            return Err(ConfigError::Invalid(
                "autosave_debounce_ms must be positive".into(),
            ));
        }
        if self.backoff.initial_ms == 0 {
            return Err(ConfigError::Invalid(
                "backoff.initial_ms must be positive".into(),
            ));
        }
        if self.backoff.max_ms < self.backoff.initial_ms {
            return Err(ConfigError::Invalid(
                "backoff.max_ms must be >= backoff.initial_ms".into(),
            ));
        }
        if !self.backoff.multiplier.is_finite() || self.backoff.multiplier < 1.0 {
            return Err(ConfigError::Invalid(
                "backoff.multiplier must be >= 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.backoff.jitter) {
            return Err(ConfigError::Invalid(
                "backoff.jitter must be within [0, 1]".into(),
            ));
        }
        if !self.lane_column_width.is_finite() || self.lane_column_width <= 0.0 {
            return Err(ConfigError::Invalid(
                "lane_column_width must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_values() {
        let config = SessionConfig::default();
        assert_eq!(config.autosave_debounce(), Duration::from_secs(10));
        assert_eq!(config.backoff.initial_ms, 500);
        assert_eq!(config.backoff.max_ms, 30_000);
        assert!(config.resync_on_reconnect);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = BackoffConfig::default();
        let delays: Vec<u64> = (0..9)
            .map(|a| u64::try_from(backoff.delay(a).as_millis()).unwrap())
            .collect();
        assert_eq!(
            delays,
            vec![500, 1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000]
        );
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let backoff = BackoffConfig {
            jitter: 0.5,
            ..BackoffConfig::default()
        };
        for _ in 0..100 {
            let d = backoff.delay(1);
            assert!(d >= Duration::from_millis(500) && d <= Duration::from_millis(1_500));
        }
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = SessionConfig::from_toml_str(
            r#"
            autosave_debounce_ms = 2000

            [backoff]
            max_ms = 5000
            "#,
        )
        .unwrap();
        assert_eq!(config.autosave_debounce_ms, 2_000);
        assert_eq!(config.backoff.max_ms, 5_000);
        assert_eq!(config.backoff.initial_ms, 500);
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            "autosave_debounce_ms = 0",
            "[backoff]\nmultiplier = 0.5",
            "[backoff]\njitter = 2.0",
            "[backoff]\ninitial_ms = 100\nmax_ms = 50",
            "lane_column_width = -1.0",
        ] {
            assert!(
                matches!(SessionConfig::from_toml_str(text), Err(ConfigError::Invalid(_))),
                "accepted: {text}"
            );
        }
        assert!(matches!(
            SessionConfig::from_toml_str("autosave_debounce_ms = \"soon\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "resync_on_reconnect = false\nlog_filter = \"vcg=debug\"").unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert!(!config.resync_on_reconnect);
        assert_eq!(config.log_filter, "vcg=debug");

        assert!(matches!(
            SessionConfig::from_file("/definitely/not/here.toml"),
            Err(ConfigError::Io(_))
        ));
    }
}
