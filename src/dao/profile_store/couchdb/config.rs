use std::time::Duration;

use super::error::{CouchDaoError, CouchResult};

const DEFAULT_BASE_URL: &str = "http://localhost:5984";
const DEFAULT_DATABASE: &str = "fact_or_fiction_profiles";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the profile database lives and how to talk to it.
#[derive(Debug, Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request budget of the HTTP client.
    pub request_timeout: Duration,
}

impl CouchConfig {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Read `COUCH_BASE_URL`, `COUCH_DB`, `COUCH_TIMEOUT_MS` and the optional
    /// `COUCH_USERNAME`/`COUCH_PASSWORD` pair. Unset values fall back to a
    /// local server and the `fact_or_fiction_profiles` database.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());

        let base_url = get("COUCH_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into());
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(CouchDaoError::InvalidBaseUrl {
                var: "COUCH_BASE_URL",
                value: base_url,
            });
        }
        let database = get("COUCH_DB").unwrap_or_else(|| DEFAULT_DATABASE.into());

        let mut config = Self::new(base_url, database);
        if let Some(raw) = get("COUCH_TIMEOUT_MS") {
            let millis = raw
                .trim()
                .parse::<u64>()
                .map_err(|_| CouchDaoError::InvalidTimeout {
                    var: "COUCH_TIMEOUT_MS",
                    value: raw.clone(),
                })?;
            config.request_timeout = Duration::from_millis(millis.max(1));
        }
        if let (Some(username), Some(password)) = (get("COUCH_USERNAME"), get("COUCH_PASSWORD")) {
            config = config.with_credentials(username, password);
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn empty_environment_targets_the_local_profile_database() {
        let config = CouchConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url, "http://localhost:5984");
        assert_eq!(config.database, "fact_or_fiction_profiles");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.username.is_none());
    }

    #[test]
    fn credentials_need_both_halves() {
        let config =
            CouchConfig::from_lookup(lookup(&[("COUCH_USERNAME", "admin")])).unwrap();
        assert!(config.username.is_none());

        let config = CouchConfig::from_lookup(lookup(&[
            ("COUCH_USERNAME", "admin"),
            ("COUCH_PASSWORD", "secret"),
            ("COUCH_TIMEOUT_MS", "750"),
        ]))
        .unwrap();
        assert_eq!(config.username.as_deref(), Some("admin"));
        assert_eq!(config.request_timeout, Duration::from_millis(750));
    }

    #[test]
    fn rejects_non_http_urls_and_bad_timeouts() {
        assert!(matches!(
            CouchConfig::from_lookup(lookup(&[("COUCH_BASE_URL", "localhost:5984")])),
            Err(CouchDaoError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            CouchConfig::from_lookup(lookup(&[("COUCH_TIMEOUT_MS", "soon")])),
            Err(CouchDaoError::InvalidTimeout { .. })
        ));
    }
}
