//! Client configuration: backend endpoint, API key, local preference file and
//! live-update tuning. Values come from CLI flags or the environment and are
//! normalized before they override the defaults. The API key is public by
//! design of the backend but is still kept out of logs.

use secrecy::SecretString;
use std::{path::PathBuf, time::Duration};

/// Newest activity entries kept on the dashboard.
pub const DEFAULT_ACTIVITY_LIMIT: usize = 100;
/// Seconds between snapshot polls of the change feed.
pub const DEFAULT_POLL_SECONDS: u64 = 5;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub backend_url: String,
    pub api_key: SecretString,
    pub preferences_path: PathBuf,
    pub poll_interval: Duration,
    pub activity_limit: usize,
}

impl AppConfig {
    pub fn new(backend_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            backend_url: backend_url.into(),
            api_key: SecretString::from(api_key.into()),
            preferences_path: default_preferences_path(),
            poll_interval: Duration::from_secs(DEFAULT_POLL_SECONDS),
            activity_limit: DEFAULT_ACTIVITY_LIMIT,
        }
    }

    /// Applies every present, non-empty override.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        apply_overrides(&mut self, overrides);
        self
    }
}

/// Optional values layered over the defaults.
#[derive(Default)]
pub struct ConfigOverrides {
    pub preferences_path: Option<String>,
    pub poll_seconds: Option<u64>,
    pub activity_limit: Option<usize>,
}

fn apply_overrides(config: &mut AppConfig, overrides: ConfigOverrides) {
    if let Some(value) = overrides
        .preferences_path
        .as_deref()
        .and_then(normalize_value)
    {
        config.preferences_path = PathBuf::from(value);
    }
    if let Some(seconds) = overrides.poll_seconds.filter(|seconds| *seconds > 0) {
        config.poll_interval = Duration::from_secs(seconds);
    }
    if let Some(limit) = overrides.activity_limit.filter(|limit| *limit > 0) {
        config.activity_limit = limit;
    }
}

pub(crate) fn normalize_value(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// `$HOME/.config/onboardly/preferences.json`, or the working directory when
/// no home is set.
#[must_use]
pub fn default_preferences_path() -> PathBuf {
    std::env::var("HOME")
        .ok()
        .and_then(|home| normalize_value(&home))
        .map_or_else(
            || PathBuf::from("onboardly-preferences.json"),
            |home| {
                PathBuf::from(home)
                    .join(".config")
                    .join("onboardly")
                    .join("preferences.json")
            },
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn normalize_value_trims_and_rejects_empty() {
        assert_eq!(normalize_value(""), None);
        assert_eq!(normalize_value("   "), None);
        assert_eq!(
            normalize_value("  /tmp/prefs.json "),
            Some("/tmp/prefs.json".to_string())
        );
    }

    #[test]
    fn new_uses_defaults() {
        let config = AppConfig::new("https://db.example.com", "anon");
        assert_eq!(config.backend_url, "https://db.example.com");
        assert_eq!(config.api_key.expose_secret(), "anon");
        assert_eq!(config.poll_interval, Duration::from_secs(DEFAULT_POLL_SECONDS));
        assert_eq!(config.activity_limit, DEFAULT_ACTIVITY_LIMIT);
    }

    #[test]
    fn overrides_ignore_empty_and_zero_values() {
        temp_env::with_var("HOME", Some("/home/ada"), || {
            let config = AppConfig::new("https://db.example.com", "anon").with_overrides(
                ConfigOverrides {
                    preferences_path: Some("  ".to_string()),
                    poll_seconds: Some(0),
                    activity_limit: Some(0),
                },
            );

            assert_eq!(
                config.preferences_path,
                PathBuf::from("/home/ada/.config/onboardly/preferences.json")
            );
            assert_eq!(config.poll_interval, Duration::from_secs(DEFAULT_POLL_SECONDS));
            assert_eq!(config.activity_limit, DEFAULT_ACTIVITY_LIMIT);
        });
    }

    #[test]
    fn overrides_replace_when_present() {
        let config = AppConfig::new("https://db.example.com", "anon").with_overrides(
            ConfigOverrides {
                preferences_path: Some(" /tmp/prefs.json ".to_string()),
                poll_seconds: Some(30),
                activity_limit: Some(25),
            },
        );

        assert_eq!(config.preferences_path, PathBuf::from("/tmp/prefs.json"));
        assert_eq!(config.poll_interval, Duration::from_secs(30));
        assert_eq!(config.activity_limit, 25);
    }

    #[test]
    fn default_preferences_path_follows_home() {
        temp_env::with_var("HOME", Some("/home/ada"), || {
            assert_eq!(
                default_preferences_path(),
                PathBuf::from("/home/ada/.config/onboardly/preferences.json")
            );
        });
        temp_env::with_var("HOME", None::<&str>, || {
            assert_eq!(
                default_preferences_path(),
                PathBuf::from("onboardly-preferences.json")
            );
        });
    }
}
