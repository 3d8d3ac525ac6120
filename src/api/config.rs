// SPDX-License-Identifier: MIT

//! Runtime configuration from environment variables
//!
//! `.env` files are honoured through `dotenv` by the binary before
//! [`Config::from_env`] runs.

use super::error::{ClassifierError, Result};
use std::env;
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "http://localhost:9000";
pub const DEFAULT_JOB_STATUS_PATH: &str = "/api/vulnerabilities/refresh/status";

#[derive(Debug, Clone)]
pub struct Config {
    /// Backend root, e.g. `https://secman.example.com`
    pub base_url: Url,
    /// Value of the session cookie sent with every request
    pub session_cookie: Option<String>,
    pub poll_interval: Duration,
    pub autosave_delay: Duration,
    pub job_status_path: String,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_URL).expect("default URL is valid"),
            session_cookie: None,
            poll_interval: Duration::from_secs(2),
            autosave_delay: Duration::from_secs(2),
            job_status_path: DEFAULT_JOB_STATUS_PATH.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Build from `CLASSIFY_*` variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(url) = lookup("CLASSIFY_API_URL") {
            config.base_url = parse_base_url(&url)?;
        }
        config.session_cookie = lookup("CLASSIFY_SESSION").filter(|s| !s.is_empty());
        if let Some(ms) = lookup("CLASSIFY_POLL_INTERVAL_MS") {
            config.poll_interval = parse_nonzero_millis("CLASSIFY_POLL_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = lookup("CLASSIFY_AUTOSAVE_DELAY_MS") {
            config.autosave_delay = parse_millis("CLASSIFY_AUTOSAVE_DELAY_MS", &ms)?;
        }
        if let Some(ms) = lookup("CLASSIFY_TIMEOUT_MS") {
            config.request_timeout = parse_nonzero_millis("CLASSIFY_TIMEOUT_MS", &ms)?;
        }
        if let Some(path) = lookup("CLASSIFY_JOB_STATUS_PATH") {
            config.job_status_path = path;
        }

        log::debug!("Loaded config: base_url={}", config.base_url);
        Ok(config)
    }

    pub fn with_base_url(mut self, url: &str) -> Result<Self> {
        self.base_url = parse_base_url(url)?;
        Ok(self)
    }
}

fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim_end_matches('/'))
        .map_err(|e| ClassifierError::config(format!("invalid API URL '{}': {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClassifierError::config(format!(
            "API URL must be http or https, got '{}'",
            url.scheme()
        )));
    }
    Ok(url)
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration> {
    raw.trim()
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|_| {
            ClassifierError::config(format!("{} must be milliseconds, got '{}'", key, raw))
        })
}

/// Intervals and timeouts must be positive
fn parse_nonzero_millis(key: &str, raw: &str) -> Result<Duration> {
    let duration = parse_millis(key, raw)?;
    if duration.is_zero() {
        return Err(ClassifierError::config(format!("{} must be greater than 0", key)));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.base_url.as_str(), "http://localhost:9000/");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.autosave_delay, Duration::from_secs(2));
        assert!(config.session_cookie.is_none());
        assert_eq!(config.job_status_path, DEFAULT_JOB_STATUS_PATH);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("CLASSIFY_API_URL", "https://secman.example.com/"),
            ("CLASSIFY_SESSION", "PLAY_SESSION=abc"),
            ("CLASSIFY_POLL_INTERVAL_MS", "500"),
            ("CLASSIFY_AUTOSAVE_DELAY_MS", "750"),
        ]))
        .unwrap();
        assert_eq!(config.base_url.host_str(), Some("secman.example.com"));
        assert_eq!(config.session_cookie.as_deref(), Some("PLAY_SESSION=abc"));
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.autosave_delay, Duration::from_millis(750));
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("CLASSIFY_API_URL", "not a url")])),
            Err(ClassifierError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("CLASSIFY_API_URL", "ftp://host")])),
            Err(ClassifierError::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("CLASSIFY_POLL_INTERVAL_MS", "2s")])),
            Err(ClassifierError::Config(_))
        ));
    }

    #[test]
    fn test_zero_intervals_rejected() {
        for key in ["CLASSIFY_POLL_INTERVAL_MS", "CLASSIFY_TIMEOUT_MS"] {
            match Config::from_lookup(lookup(&[(key, "0")])) {
                Err(ClassifierError::Config(message)) => assert!(message.contains(key)),
                other => panic!("{} = 0 accepted: {:?}", key, other.map(|c| c.poll_interval)),
            }
        }

        // A zero debounce just saves on the next tick
        let config = Config::from_lookup(lookup(&[("CLASSIFY_AUTOSAVE_DELAY_MS", "0")])).unwrap();
        assert_eq!(config.autosave_delay, Duration::ZERO);
    }
}
