//! Application-level configuration loading: round pacing, timeouts and upstream endpoints.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    facts::{gemini::DEFAULT_GEMINI_BASE_URL, gemini::DEFAULT_GEMINI_MODEL, ninjas::DEFAULT_NINJAS_URL},
    state::controller::{
        AdvancePolicy, ControllerSettings, DEFAULT_ADVANCE_DELAY, DEFAULT_CALL_TIMEOUT,
    },
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "FACT_OR_FICTION_CONFIG_PATH";
const DEFAULT_LEADERBOARD_LIMIT: usize = 20;
const MAX_LEADERBOARD_LIMIT: usize = 100;
const DEFAULT_SESSION_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    advance: AdvancePolicy,
    call_timeout: Duration,
    leaderboard_default_limit: usize,
    falsify_probability: f64,
    session_idle_ttl: Duration,
    ninjas_url: String,
    gemini_base_url: String,
    gemini_model: String,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(
                        path = %path.display(),
                        advance = ?app_config.advance,
                        call_timeout_ms = app_config.call_timeout.as_millis() as u64,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a configuration document; missing keys take their defaults.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }

    /// Round pacing and external call budget for new game sessions.
    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings {
            advance: self.advance,
            call_timeout: self.call_timeout,
        }
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    /// Leaderboard size used when the client does not ask for one.
    pub fn leaderboard_default_limit(&self) -> usize {
        self.leaderboard_default_limit
    }

    /// Chance that a fetched fact is rewritten into fiction.
    pub fn falsify_probability(&self) -> f64 {
        self.falsify_probability
    }

    /// How long a session may go without player activity or an open SSE
    /// stream before it is swept.
    pub fn session_idle_ttl(&self) -> Duration {
        self.session_idle_ttl
    }

    pub fn ninjas_url(&self) -> &str {
        &self.ninjas_url
    }

    pub fn gemini_base_url(&self) -> &str {
        &self.gemini_base_url
    }

    pub fn gemini_model(&self) -> &str {
        &self.gemini_model
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        RawConfig::default().into()
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    /// `null` disables auto-advance.
    advance_delay_ms: Option<u64>,
    external_timeout_ms: u64,
    leaderboard_default_limit: usize,
    falsify_probability: f64,
    session_idle_ttl_secs: u64,
    ninjas_url: String,
    gemini_base_url: String,
    gemini_model: String,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            advance_delay_ms: Some(DEFAULT_ADVANCE_DELAY.as_millis() as u64),
            external_timeout_ms: DEFAULT_CALL_TIMEOUT.as_millis() as u64,
            leaderboard_default_limit: DEFAULT_LEADERBOARD_LIMIT,
            falsify_probability: 0.5,
            session_idle_ttl_secs: DEFAULT_SESSION_IDLE_TTL.as_secs(),
            ninjas_url: DEFAULT_NINJAS_URL.into(),
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.into(),
            gemini_model: DEFAULT_GEMINI_MODEL.into(),
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let advance = match value.advance_delay_ms {
            Some(ms) => AdvancePolicy::After(Duration::from_millis(ms)),
            None => AdvancePolicy::Manual,
        };
        Self {
            advance,
            call_timeout: Duration::from_millis(value.external_timeout_ms.max(1)),
            leaderboard_default_limit: value
                .leaderboard_default_limit
                .clamp(1, MAX_LEADERBOARD_LIMIT),
            falsify_probability: value.falsify_probability,
            session_idle_ttl: Duration::from_secs(value.session_idle_ttl_secs.max(1)),
            ninjas_url: value.ninjas_url,
            gemini_base_url: value.gemini_base_url,
            gemini_model: value.gemini_model,
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_values() {
        let config = AppConfig::default();
        let settings = config.controller_settings();
        assert_eq!(
            settings.advance,
            AdvancePolicy::After(Duration::from_millis(1_500))
        );
        assert_eq!(settings.call_timeout, Duration::from_secs(10));
        assert_eq!(config.leaderboard_default_limit(), 20);
        assert_eq!(config.gemini_model(), "gemini-1.5-flash");
        assert_eq!(config.session_idle_ttl(), Duration::from_secs(1_800));
    }

    #[test]
    fn session_ttl_is_read_in_seconds() {
        let config = AppConfig::from_json(r#"{"session_idle_ttl_secs": 120}"#).unwrap();
        assert_eq!(config.session_idle_ttl(), Duration::from_secs(120));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = AppConfig::from_json(r#"{"external_timeout_ms": 2500}"#).unwrap();
        assert_eq!(config.call_timeout(), Duration::from_millis(2_500));
        assert_eq!(config.falsify_probability(), 0.5);
    }

    #[test]
    fn null_delay_means_manual_advance() {
        let config = AppConfig::from_json(r#"{"advance_delay_ms": null}"#).unwrap();
        assert_eq!(config.controller_settings().advance, AdvancePolicy::Manual);
    }

    #[test]
    fn leaderboard_limit_is_clamped() {
        let config = AppConfig::from_json(r#"{"leaderboard_default_limit": 500}"#).unwrap();
        assert_eq!(config.leaderboard_default_limit(), 100);
    }

    #[test]
    fn malformed_file_is_an_error() {
        assert!(AppConfig::from_json(r#"{"external_timeout_ms": "soon"}"#).is_err());
    }
}
