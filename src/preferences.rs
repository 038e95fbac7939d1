//! Locally persisted display preference. A small JSON object on disk holds the
//! single `theme` key; it is read at startup and rewritten on every change.
//! Other keys in the file are left alone.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, warn};

const THEME_KEY: &str = "theme";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Theme {
    Dark,
    #[default]
    Light,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Theme::Dark => Theme::Light,
            Theme::Light => Theme::Dark,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

/// File-backed preference store.
#[derive(Clone, Debug)]
pub struct PreferenceStore {
    path: PathBuf,
}

impl PreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored theme; missing file, missing key or unknown value → light.
    #[must_use]
    pub fn theme(&self) -> Theme {
        let entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(err) => {
                warn!("Ignoring unreadable preferences: {}", err);
                return Theme::default();
            }
        };
        entries
            .get(THEME_KEY)
            .and_then(Value::as_str)
            .and_then(|value| value.parse().ok())
            .unwrap_or_default()
    }

    /// Persists `theme`. A file that is not a JSON object is replaced; one
    /// that cannot be read is left untouched.
    ///
    /// # Errors
    /// Returns an error if the preference file cannot be read or written.
    pub fn set_theme(&self, theme: Theme) -> Result<()> {
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(Error::Preference(reason)) => {
                warn!("Replacing preferences: {}", reason);
                Map::new()
            }
            Err(err) => return Err(err),
        };
        entries.insert(THEME_KEY.to_string(), Value::String(theme.as_str().to_string()));

        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(&Value::Object(entries))
            .map_err(|err| Error::Preference(format!("Failed to encode preferences: {err}")))?;
        fs::write(&self.path, body)?;
        debug!("Saved theme {} to {:?}", theme, self.path);
        Ok(())
    }

    /// Flips the stored theme, persists it and returns the new value.
    ///
    /// # Errors
    /// Returns an error if the preference file cannot be written.
    pub fn toggle_theme(&self) -> Result<Theme> {
        let theme = self.theme().toggled();
        self.set_theme(theme)?;
        Ok(theme)
    }

    fn read_entries(&self) -> Result<Map<String, Value>> {
        let body = match fs::read_to_string(&self.path) {
            Ok(body) => body,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str(&body) {
            Ok(Value::Object(entries)) => Ok(entries),
            Ok(_) => Err(Error::Preference(format!(
                "{} is not a JSON object",
                self.path.display()
            ))),
            Err(err) => Err(Error::Preference(format!(
                "{} is not valid JSON: {err}",
                self.path.display()
            ))),
        }
    }
}
