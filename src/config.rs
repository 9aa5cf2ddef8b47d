use std::path::PathBuf;
use std::time::Duration;

/// Application-level constants
pub const APP_NAME: &str = "Clinic Companion";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Records requested per page by every list screen.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Backend used when `CLINIC_API_URL` is not set.
pub const DEFAULT_API_URL: &str = "http://localhost:5000";

/// HTTP timeout used when `CLINIC_HTTP_TIMEOUT_SECS` is not set.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Session database file name inside the data directory.
pub const SESSION_DB_FILE: &str = "session.db";

/// Default `tracing` filter when `RUST_LOG` is absent.
pub fn default_log_filter() -> &'static str {
    "clinic_companion_lib=info,clinic_companion=info,warn"
}

/// Get the application data directory.
/// ~/.clinic-companion/ on all platforms, falling back to the working
/// directory when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".clinic-companion")
}

/// Runtime configuration for the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the clinic REST API, without trailing slash.
    pub api_base_url: String,
    /// Directory holding the session database.
    pub data_dir: PathBuf,
    pub page_size: u32,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            data_dir: app_data_dir(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Build a config from `CLINIC_*` environment variables.
    ///
    /// Unparseable numeric values are logged and replaced by defaults
    /// rather than aborting startup.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (testable without
    /// touching the process environment).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = lookup("CLINIC_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_base_url);

        let data_dir = lookup("CLINIC_DATA_DIR")
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let page_size = parse_or("CLINIC_PAGE_SIZE", lookup("CLINIC_PAGE_SIZE"), defaults.page_size)
            .max(1);

        let timeout_secs = parse_or(
            "CLINIC_HTTP_TIMEOUT_SECS",
            lookup("CLINIC_HTTP_TIMEOUT_SECS"),
            DEFAULT_TIMEOUT_SECS,
        );

        Self {
            api_base_url,
            data_dir,
            page_size,
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Path of the SQLite session database.
    pub fn session_db_path(&self) -> PathBuf {
        self.data_dir.join(SESSION_DB_FILE)
    }
}

fn parse_or<T: std::str::FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %value, "Ignoring unparseable config value");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_set() {
        let config = ClientConfig::from_lookup(|_| None);
        assert_eq!(config.api_base_url, DEFAULT_API_URL);
        assert_eq!(config.page_size, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert!(config.data_dir.ends_with(".clinic-companion"));
    }

    #[test]
    fn env_values_override_defaults() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CLINIC_API_URL", "https://api.example-clinic.test/"),
            ("CLINIC_DATA_DIR", "/tmp/companion"),
            ("CLINIC_PAGE_SIZE", "25"),
            ("CLINIC_HTTP_TIMEOUT_SECS", "5"),
        ]));
        assert_eq!(config.api_base_url, "https://api.example-clinic.test");
        assert_eq!(config.data_dir, PathBuf::from("/tmp/companion"));
        assert_eq!(config.page_size, 25);
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert_eq!(
            config.session_db_path(),
            PathBuf::from("/tmp/companion/session.db")
        );
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = ClientConfig::from_lookup(lookup_from(&[
            ("CLINIC_PAGE_SIZE", "lots"),
            ("CLINIC_HTTP_TIMEOUT_SECS", "-3"),
        ]));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn zero_page_size_is_clamped() {
        let config = ClientConfig::from_lookup(lookup_from(&[("CLINIC_PAGE_SIZE", "0")]));
        assert_eq!(config.page_size, 1);
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
