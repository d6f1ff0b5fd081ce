//! Engine configuration.
//!
//! Precedence: defaults < YAML file < `PIPEDECK_*` environment variables.
//! Durations are written in milliseconds (`*_ms`) in YAML and env values.

use std::path::Path;
use std::time::Duration;

use pipedeck_client::RetryPolicy;
use serde::Deserialize;

use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use crate::poller::{DEFAULT_BASE_INTERVAL, DEFAULT_MAX_INTERVAL};

pub const DEFAULT_FLASH_DURATION: Duration = Duration::from_secs(2);
pub const DEFAULT_TRIGGER_REF: &str = "main";
pub const ENV_PREFIX: &str = "PIPEDECK_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {key}")]
    Env { key: String, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub poll_base_interval: Duration,
    pub poll_max_interval: Duration,
    pub retry_attempts: u32,
    pub retry_initial_backoff: Duration,
    pub retry_max_backoff: Duration,
    pub flash_duration: Duration,
    /// Follow logs of running jobs.
    pub log_polling: bool,
    /// Refresh the selected workflow's runs on every tick.
    pub auto_refresh: bool,
    /// Git ref used when dispatching a workflow.
    pub trigger_ref: String,
    /// Page size for run listings; 0 leaves it to the service.
    pub runs_per_page: u32,
    pub logging: LoggingConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            poll_base_interval: DEFAULT_BASE_INTERVAL,
            poll_max_interval: DEFAULT_MAX_INTERVAL,
            retry_attempts: retry.attempts,
            retry_initial_backoff: retry.initial_backoff,
            retry_max_backoff: retry.max_backoff,
            flash_duration: DEFAULT_FLASH_DURATION,
            log_polling: true,
            auto_refresh: true,
            trigger_ref: DEFAULT_TRIGGER_REF.to_string(),
            runs_per_page: 0,
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialConfig {
    #[serde(default)]
    poll_base_interval_ms: Option<u64>,
    #[serde(default)]
    poll_max_interval_ms: Option<u64>,
    #[serde(default)]
    retry_attempts: Option<u32>,
    #[serde(default)]
    retry_initial_backoff_ms: Option<u64>,
    #[serde(default)]
    retry_max_backoff_ms: Option<u64>,
    #[serde(default)]
    flash_duration_ms: Option<u64>,
    #[serde(default)]
    log_polling: Option<bool>,
    #[serde(default)]
    auto_refresh: Option<bool>,
    #[serde(default)]
    trigger_ref: Option<String>,
    #[serde(default)]
    runs_per_page: Option<u32>,
    #[serde(default)]
    logging: PartialLoggingConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct PartialLoggingConfig {
    #[serde(default)]
    level: String,
    #[serde(default)]
    format: String,
}

impl SyncConfig {
    /// Defaults overlaid with the YAML document in `text`. Empty input
    /// yields the defaults.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();
        if !text.trim().is_empty() {
            let partial: PartialConfig = serde_yaml::from_str(text)?;
            cfg.apply_partial(partial);
        }
        cfg.validate().map_err(ConfigError::Invalid)?;
        Ok(cfg)
    }

    /// Load `path`, then apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let mut cfg = Self::from_yaml_str(&text)?;
        cfg.apply_env_overrides()?;
        cfg.validate().map_err(ConfigError::Invalid)?;
        Ok(cfg)
    }

    fn apply_partial(&mut self, partial: PartialConfig) {
        if let Some(ms) = partial.poll_base_interval_ms {
            self.poll_base_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = partial.poll_max_interval_ms {
            self.poll_max_interval = Duration::from_millis(ms);
        }
        if let Some(n) = partial.retry_attempts {
            self.retry_attempts = n;
        }
        if let Some(ms) = partial.retry_initial_backoff_ms {
            self.retry_initial_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = partial.retry_max_backoff_ms {
            self.retry_max_backoff = Duration::from_millis(ms);
        }
        if let Some(ms) = partial.flash_duration_ms {
            self.flash_duration = Duration::from_millis(ms);
        }
        if let Some(on) = partial.log_polling {
            self.log_polling = on;
        }
        if let Some(on) = partial.auto_refresh {
            self.auto_refresh = on;
        }
        if let Some(git_ref) = partial.trigger_ref {
            self.trigger_ref = git_ref.trim().to_string();
        }
        if let Some(n) = partial.runs_per_page {
            self.runs_per_page = n;
        }
        if !partial.logging.level.trim().is_empty() {
            self.logging.level = LogLevel::parse(&partial.logging.level);
        }
        if !partial.logging.format.trim().is_empty() {
            self.logging.format = LogFormat::parse(&partial.logging.format);
        }
    }

    /// Apply `PIPEDECK_*` variables from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_env_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .map(|value| (key, value))
        };

        if let Some((key, value)) = get("POLL_BASE_INTERVAL_MS") {
            self.poll_base_interval = parse_millis(&key, &value)?;
        }
        if let Some((key, value)) = get("POLL_MAX_INTERVAL_MS") {
            self.poll_max_interval = parse_millis(&key, &value)?;
        }
        if let Some((key, value)) = get("RETRY_ATTEMPTS") {
            self.retry_attempts = value
                .parse()
                .map_err(|_| ConfigError::Env { key, value })?;
        }
        if let Some((key, value)) = get("RETRY_INITIAL_BACKOFF_MS") {
            self.retry_initial_backoff = parse_millis(&key, &value)?;
        }
        if let Some((key, value)) = get("RETRY_MAX_BACKOFF_MS") {
            self.retry_max_backoff = parse_millis(&key, &value)?;
        }
        if let Some((key, value)) = get("FLASH_DURATION_MS") {
            self.flash_duration = parse_millis(&key, &value)?;
        }
        if let Some((key, value)) = get("LOG_POLLING") {
            self.log_polling = parse_bool(&key, &value)?;
        }
        if let Some((key, value)) = get("AUTO_REFRESH") {
            self.auto_refresh = parse_bool(&key, &value)?;
        }
        if let Some((_, value)) = get("TRIGGER_REF") {
            self.trigger_ref = value;
        }
        if let Some((key, value)) = get("RUNS_PER_PAGE") {
            self.runs_per_page = value
                .parse()
                .map_err(|_| ConfigError::Env { key, value })?;
        }
        if let Some((_, value)) = get("LOG_LEVEL") {
            self.logging.level = LogLevel::parse(&value);
        }
        if let Some((_, value)) = get("LOG_FORMAT") {
            self.logging.format = LogFormat::parse(&value);
        }
        Ok(())
    }

    /// Validates the configuration, returning an error message on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.poll_base_interval.is_zero() {
            return Err("poll_base_interval_ms must be greater than 0".into());
        }
        if self.poll_max_interval < self.poll_base_interval {
            return Err("poll_max_interval_ms must not be below poll_base_interval_ms".into());
        }
        if self.retry_attempts < 1 {
            return Err("retry_attempts must be at least 1".into());
        }
        if self.retry_max_backoff < self.retry_initial_backoff {
            return Err(
                "retry_max_backoff_ms must not be below retry_initial_backoff_ms".into(),
            );
        }
        if self.flash_duration.is_zero() {
            return Err("flash_duration_ms must be greater than 0".into());
        }
        if self.trigger_ref.trim().is_empty() {
            return Err("trigger_ref is required".into());
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            initial_backoff: self.retry_initial_backoff,
            max_backoff: self.retry_max_backoff,
        }
    }

    /// `(base, max)` intervals for the adaptive poller.
    pub fn adaptive_intervals(&self) -> (Duration, Duration) {
        (self.poll_base_interval, self.poll_max_interval)
    }
}

fn parse_millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| ConfigError::Env {
            key: key.to_string(),
            value: value.to_string(),
        })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Env {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let cfg = SyncConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.retry_policy(), RetryPolicy::default());
        assert_eq!(
            cfg.adaptive_intervals(),
            (Duration::from_secs(2), Duration::from_secs(30))
        );
        assert_eq!(cfg.trigger_ref, "main");
    }

    #[test]
    fn empty_yaml_yields_defaults() {
        assert_eq!(SyncConfig::from_yaml_str("").unwrap(), SyncConfig::default());
        assert_eq!(
            SyncConfig::from_yaml_str("  \n").unwrap(),
            SyncConfig::default()
        );
    }

    #[test]
    fn yaml_overrides_selected_fields() {
        let cfg = SyncConfig::from_yaml_str(
            "poll_base_interval_ms: 1000\n\
             retry_attempts: 5\n\
             auto_refresh: false\n\
             trigger_ref: develop\n\
             logging:\n  level: debug\n  format: json\n",
        )
        .unwrap();
        assert_eq!(cfg.poll_base_interval, Duration::from_secs(1));
        assert_eq!(cfg.poll_max_interval, DEFAULT_MAX_INTERVAL);
        assert_eq!(cfg.retry_policy().attempts, 5);
        assert!(!cfg.auto_refresh);
        assert!(cfg.log_polling);
        assert_eq!(cfg.trigger_ref, "develop");
        assert_eq!(cfg.logging.level, LogLevel::Debug);
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn unknown_yaml_keys_are_rejected() {
        let err = SyncConfig::from_yaml_str("poll_interval: 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn invalid_values_fail_validation() {
        let err = SyncConfig::from_yaml_str("retry_attempts: 0").unwrap_err();
        assert!(err.to_string().contains("retry_attempts"));

        let err = SyncConfig::from_yaml_str(
            "poll_base_interval_ms: 5000\npoll_max_interval_ms: 1000",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut cfg = SyncConfig::from_yaml_str("retry_attempts: 2").unwrap();
        cfg.apply_env_overrides_from(env(&[
            ("PIPEDECK_RETRY_ATTEMPTS", "4"),
            ("PIPEDECK_POLL_MAX_INTERVAL_MS", "60000"),
            ("PIPEDECK_LOG_POLLING", "off"),
            ("PIPEDECK_TRIGGER_REF", " release "),
            ("PIPEDECK_LOG_FORMAT", "json"),
            ("UNRELATED", "x"),
        ]))
        .unwrap();
        assert_eq!(cfg.retry_attempts, 4);
        assert_eq!(cfg.poll_max_interval, Duration::from_secs(60));
        assert!(!cfg.log_polling);
        assert_eq!(cfg.trigger_ref, "release");
        assert_eq!(cfg.logging.format, LogFormat::Json);
    }

    #[test]
    fn blank_env_values_are_ignored() {
        let mut cfg = SyncConfig::default();
        cfg.apply_env_overrides_from(env(&[("PIPEDECK_RETRY_ATTEMPTS", "  ")]))
            .unwrap();
        assert_eq!(cfg.retry_attempts, 3);
    }

    #[test]
    fn malformed_env_values_name_the_variable() {
        let mut cfg = SyncConfig::default();
        let err = cfg
            .apply_env_overrides_from(env(&[("PIPEDECK_AUTO_REFRESH", "maybe")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value \"maybe\" for PIPEDECK_AUTO_REFRESH"
        );
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "flash_duration_ms: 750\nruns_per_page: 25").unwrap();
        let cfg = SyncConfig::load(file.path()).unwrap();
        assert_eq!(cfg.flash_duration, Duration::from_millis(750));
        assert_eq!(cfg.runs_per_page, 25);
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = SyncConfig::load(&dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
