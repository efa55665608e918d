//! Bot settings.
//!
//! Settings come from `MEETG_*` environment variables, with a `.env` file in
//! the working directory honoured. Every setting has a default, so an empty
//! environment yields a usable (test) configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `MEETG_TG_API_TOKEN` | empty |
//! | `MEETG_API_URL` | `https://api.telegram.org` |
//! | `MEETG_API_ATTEMPTS` | `5` |
//! | `MEETG_NETWORK_ERROR_WAIT` | `2` (seconds) |
//! | `MEETG_REQUEST_TIMEOUT` | `60` (seconds) |
//! | `MEETG_POLL_TIMEOUT` | `25` (seconds) |
//! | `MEETG_DB_NAME` / `MEETG_DB_NAME_TEST` | `meetg` / `meetg_test` |
//! | `MEETG_DB_HOST` / `MEETG_DB_PORT` | `localhost` / `27017` |
//! | `MEETG_LOG_PATH` | `log.txt`, empty disables the file |
//! | `MEETG_LOG_LEVEL` | `info` |
//! | `MEETG_STATS_TO` | comma separated chat ids, empty |
//! | `MEETG_IS_TEST` | `false` |
//! | `MEETG_SAVE_UPDATES`, `_MESSAGES`, `_USERS`, `_CHATS` | `true` |

use crate::{retry::RetryConfig, transport::DEFAULT_API_URL, Error, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const PREFIX: &str = "MEETG_";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub tg_api_token: String,
    pub api_url: String,

    /// Attempt budget of one API call.
    pub api_attempts: u32,
    /// Wait after a transient network failure.
    pub network_error_wait: Duration,
    pub request_timeout: Duration,
    /// Long polling timeout of `get_updates`.
    pub poll_timeout: Duration,

    pub db_name: String,
    pub db_name_test: String,
    pub db_host: String,
    pub db_port: u16,

    /// File the log is written to in addition to stderr.
    pub log_path: Option<PathBuf>,
    pub log_level: String,

    /// Chats receiving the daily stats report.
    pub stats_to: Vec<i64>,

    /// Work against the mock transport and the test database.
    pub is_test: bool,

    pub save_updates: bool,
    pub save_messages: bool,
    pub save_users: bool,
    pub save_chats: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tg_api_token: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            api_attempts: 5,
            network_error_wait: Duration::from_secs(2),
            request_timeout: Duration::from_secs(60),
            poll_timeout: Duration::from_secs(25),
            db_name: "meetg".to_string(),
            db_name_test: "meetg_test".to_string(),
            db_host: "localhost".to_string(),
            db_port: 27017,
            log_path: Some(PathBuf::from("log.txt")),
            log_level: "info".to_string(),
            stats_to: Vec::new(),
            is_test: false,
            save_updates: true,
            save_messages: true,
            save_users: true,
            save_chats: true,
        }
    }
}

impl Settings {
    /// Loads settings from the environment, reading `.env` first when present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigurationError`] when a variable holds a malformed value.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings from `lookup`, which maps a full variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{PREFIX}{name}"));
        let mut settings = Self::default();

        if let Some(token) = var("TG_API_TOKEN") {
            settings.tg_api_token = token.trim().to_string();
        }
        if let Some(url) = var("API_URL") {
            settings.api_url = url.trim().to_string();
        }
        if let Some(value) = parsed::<u32>("API_ATTEMPTS", var("API_ATTEMPTS"))? {
            if value == 0 {
                return Err(Error::ConfigurationError(
                    "MEETG_API_ATTEMPTS must be at least 1".to_string(),
                ));
            }
            settings.api_attempts = value;
        }
        if let Some(secs) = parsed::<f64>("NETWORK_ERROR_WAIT", var("NETWORK_ERROR_WAIT"))? {
            settings.network_error_wait = seconds("NETWORK_ERROR_WAIT", secs)?;
        }
        if let Some(secs) = parsed::<f64>("REQUEST_TIMEOUT", var("REQUEST_TIMEOUT"))? {
            settings.request_timeout = seconds("REQUEST_TIMEOUT", secs)?;
        }
        if let Some(secs) = parsed::<u64>("POLL_TIMEOUT", var("POLL_TIMEOUT"))? {
            settings.poll_timeout = Duration::from_secs(secs);
        }
        if let Some(name) = var("DB_NAME") {
            settings.db_name = name;
        }
        if let Some(name) = var("DB_NAME_TEST") {
            settings.db_name_test = name;
        }
        if let Some(host) = var("DB_HOST") {
            settings.db_host = host;
        }
        if let Some(port) = parsed::<u16>("DB_PORT", var("DB_PORT"))? {
            settings.db_port = port;
        }
        if let Some(path) = var("LOG_PATH") {
            let path = path.trim();
            settings.log_path = (!path.is_empty()).then(|| PathBuf::from(path));
        }
        if let Some(level) = var("LOG_LEVEL") {
            settings.log_level = level.trim().to_lowercase();
        }
        if let Some(ids) = var("STATS_TO") {
            settings.stats_to = parse_csv_i64("STATS_TO", &ids)?;
        }
        if let Some(flag) = flag("IS_TEST", var("IS_TEST"))? {
            settings.is_test = flag;
        }
        if let Some(flag) = flag("SAVE_UPDATES", var("SAVE_UPDATES"))? {
            settings.save_updates = flag;
        }
        if let Some(flag) = flag("SAVE_MESSAGES", var("SAVE_MESSAGES"))? {
            settings.save_messages = flag;
        }
        if let Some(flag) = flag("SAVE_USERS", var("SAVE_USERS"))? {
            settings.save_users = flag;
        }
        if let Some(flag) = flag("SAVE_CHATS", var("SAVE_CHATS"))? {
            settings.save_chats = flag;
        }

        Ok(settings)
    }

    /// Settings for tests: mock transport, test database, no log file, no waits.
    pub fn for_tests() -> Self {
        Self {
            is_test: true,
            log_path: None,
            network_error_wait: Duration::ZERO,
            ..Self::default()
        }
    }

    /// Database the models work with.
    pub fn database_name(&self) -> &str {
        if self.is_test {
            &self.db_name_test
        } else {
            &self.db_name
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.api_attempts, self.network_error_wait)
    }
}

fn parsed<T: FromStr>(name: &str, value: Option<String>) -> Result<Option<T>> {
    match value {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| {
            Error::ConfigurationError(format!("{PREFIX}{name} has an invalid value: {raw:?}"))
        }),
    }
}

fn seconds(name: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| {
        Error::ConfigurationError(format!("{PREFIX}{name} must be a non-negative number of seconds"))
    })
}

fn flag(name: &str, value: Option<String>) -> Result<Option<bool>> {
    let Some(raw) = value else {
        return Ok(None);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(Error::ConfigurationError(format!(
            "{PREFIX}{name} must be a boolean, got {raw:?}"
        ))),
    }
}

fn parse_csv_i64(name: &str, value: &str) -> Result<Vec<i64>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>().map_err(|_| {
                Error::ConfigurationError(format!("{PREFIX}{name} has an invalid chat id: {s:?}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = load(&[]).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.api_attempts, 5);
        assert_eq!(settings.network_error_wait, Duration::from_secs(2));
        assert_eq!(settings.db_port, 27017);
        assert_eq!(settings.log_path, Some(PathBuf::from("log.txt")));
        assert_eq!(settings.database_name(), "meetg");
    }

    #[test]
    fn test_overrides() {
        let settings = load(&[
            ("MEETG_TG_API_TOKEN", " 123:abc "),
            ("MEETG_API_ATTEMPTS", "3"),
            ("MEETG_NETWORK_ERROR_WAIT", "0.5"),
            ("MEETG_LOG_PATH", ""),
            ("MEETG_STATS_TO", "1, -100200,"),
            ("MEETG_IS_TEST", "yes"),
            ("MEETG_SAVE_UPDATES", "off"),
        ])
        .unwrap();

        assert_eq!(settings.tg_api_token, "123:abc");
        assert_eq!(settings.api_attempts, 3);
        assert_eq!(settings.network_error_wait, Duration::from_millis(500));
        assert_eq!(settings.log_path, None);
        assert_eq!(settings.stats_to, vec![1, -100200]);
        assert!(settings.is_test);
        assert!(!settings.save_updates);
        assert_eq!(settings.database_name(), "meetg_test");

        let retry = settings.retry_config();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.network_error_wait, Duration::from_millis(500));
    }

    #[test]
    fn test_malformed_values() {
        for vars in [
            [("MEETG_API_ATTEMPTS", "many")],
            [("MEETG_API_ATTEMPTS", "0")],
            [("MEETG_NETWORK_ERROR_WAIT", "-1")],
            [("MEETG_DB_PORT", "70000")],
            [("MEETG_STATS_TO", "1,abc")],
            [("MEETG_IS_TEST", "maybe")],
        ] {
            let err = load(&vars).unwrap_err();
            assert!(matches!(err, Error::ConfigurationError(_)), "{vars:?}: {err}");
        }
    }

    #[test]
    fn test_for_tests() {
        let settings = Settings::for_tests();
        assert!(settings.is_test);
        assert!(settings.log_path.is_none());
        assert!(settings.network_error_wait.is_zero());
    }
}
