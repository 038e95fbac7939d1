use crate::config::{normalize_value, ConfigOverrides};
use anyhow::{Context, Result};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_URL: &str = "url";
pub const ARG_API_KEY: &str = "api-key";
pub const ARG_EMAIL: &str = "email";
pub const ARG_PASSWORD: &str = "password";
pub const ARG_PREFERENCES: &str = "preferences";
pub const ARG_POLL_SECONDS: &str = "poll-seconds";
pub const ARG_ACTIVITY_LIMIT: &str = "activity-limit";

#[must_use]
pub fn with_args(command: Command) -> Command {
    let command = with_connection_args(command);
    let command = with_credential_args(command);
    with_tuning_args(command)
}

fn with_connection_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_URL)
                .short('u')
                .long(ARG_URL)
                .help("Backend base URL, example: https://project.backend.example")
                .env("ONBOARDLY_URL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_API_KEY)
                .long(ARG_API_KEY)
                .help("Public API key sent with every request")
                .env("ONBOARDLY_API_KEY")
                .hide_env_values(true)
                .global(true),
        )
}

fn with_credential_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_EMAIL)
                .short('e')
                .long(ARG_EMAIL)
                .help("Account email")
                .env("ONBOARDLY_EMAIL")
                .global(true),
        )
        .arg(
            Arg::new(ARG_PASSWORD)
                .long(ARG_PASSWORD)
                .help("Account password")
                .env("ONBOARDLY_PASSWORD")
                .hide_env_values(true)
                .global(true),
        )
}

fn with_tuning_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_PREFERENCES)
                .long(ARG_PREFERENCES)
                .help("Preference file path (default: ~/.config/onboardly/preferences.json)")
                .env("ONBOARDLY_PREFERENCES")
                .global(true),
        )
        .arg(
            Arg::new(ARG_POLL_SECONDS)
                .long(ARG_POLL_SECONDS)
                .help("Seconds between change polls")
                .env("ONBOARDLY_POLL_SECONDS")
                .global(true)
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_ACTIVITY_LIMIT)
                .long(ARG_ACTIVITY_LIMIT)
                .help("Newest activity entries kept on the dashboard")
                .env("ONBOARDLY_ACTIVITY_LIMIT")
                .global(true)
                .value_parser(clap::value_parser!(usize)),
        )
}

/// Connection and credential values as parsed, before validation.
pub struct Options {
    pub url: Option<String>,
    pub api_key: Option<SecretString>,
    pub email: Option<String>,
    pub password: Option<SecretString>,
    pub overrides: ConfigOverrides,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            url: string(matches, ARG_URL),
            api_key: string(matches, ARG_API_KEY).map(SecretString::from),
            email: string(matches, ARG_EMAIL),
            password: matches
                .get_one::<String>(ARG_PASSWORD)
                .filter(|value| !value.is_empty())
                .map(|value| SecretString::from(value.clone())),
            overrides: ConfigOverrides {
                preferences_path: string(matches, ARG_PREFERENCES),
                poll_seconds: matches.get_one::<u64>(ARG_POLL_SECONDS).copied(),
                activity_limit: matches.get_one::<usize>(ARG_ACTIVITY_LIMIT).copied(),
            },
        }
    }

    /// # Errors
    /// Returns an error naming the first missing connection argument.
    pub fn require_connection(&self) -> Result<(String, SecretString)> {
        let url = self
            .url
            .clone()
            .context("missing required argument: --url (or ONBOARDLY_URL)")?;
        let api_key = self
            .api_key
            .clone()
            .context("missing required argument: --api-key (or ONBOARDLY_API_KEY)")?;
        Ok((url, api_key))
    }
}

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches
        .get_one::<String>(id)
        .and_then(|value| normalize_value(value))
}
