//! Maps validated CLI matches to an action. Backend-facing subcommands need a
//! URL and API key; `theme` only touches the local preference file.

use crate::{
    cli::{
        actions::{export, theme, Action},
        commands::{backend, ARG_OUTPUT, ARG_TABLE, ARG_THEME_MODE},
        globals::GlobalArgs,
    },
    config::default_preferences_path,
    model::Table,
};
use anyhow::{anyhow, bail, Context, Result};
use clap::ArgMatches;
use std::path::PathBuf;

/// Map validated CLI matches to an action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &ArgMatches) -> Result<Action> {
    let Some((name, sub)) = matches.subcommand() else {
        bail!("missing subcommand");
    };

    match name {
        "summary" => Ok(Action::Summary(globals(sub)?)),
        "watch" => Ok(Action::Watch(globals(sub)?)),
        "signup" => {
            let globals = globals(sub)?;
            if globals.email.is_none() || globals.password.is_none() {
                bail!("signup requires --email and --password");
            }
            Ok(Action::Signup(globals))
        }
        "export" => {
            let table = sub
                .get_one::<Table>(ARG_TABLE)
                .copied()
                .context("missing required argument: --table")?;
            Ok(Action::Export(export::Args {
                globals: globals(sub)?,
                table,
                output: sub.get_one::<String>(ARG_OUTPUT).map(PathBuf::from),
            }))
        }
        "theme" => {
            let mode = sub
                .get_one::<String>(ARG_THEME_MODE)
                .map_or("show", String::as_str)
                .parse::<theme::Mode>()
                .map_err(|err| anyhow!(err))?;
            let preferences = backend::Options::parse(sub)
                .overrides
                .preferences_path
                .map_or_else(default_preferences_path, PathBuf::from);
            Ok(Action::Theme(theme::Args { preferences, mode }))
        }
        other => Err(anyhow!("unknown subcommand: {other}")),
    }
}

fn globals(matches: &ArgMatches) -> Result<GlobalArgs> {
    let options = backend::Options::parse(matches);
    let (url, api_key) = options.require_connection()?;
    let mut globals = GlobalArgs::new(url, api_key, options.overrides);
    globals.set_credentials(options.email, options.password);
    Ok(globals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::Theme;
    use secrecy::ExposeSecret;

    fn dispatch(args: Vec<&str>) -> Result<Action> {
        let matches = crate::cli::commands::new().get_matches_from(args);
        handler(&matches)
    }

    #[test]
    fn summary_requires_url() {
        temp_env::with_vars(
            [
                ("ONBOARDLY_URL", None::<&str>),
                ("ONBOARDLY_API_KEY", Some("anon")),
            ],
            || {
                let result = dispatch(vec!["onboardly", "summary"]);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("missing required argument: --url"));
                }
            },
        );
    }

    #[test]
    fn summary_collects_connection_and_credentials() {
        temp_env::with_vars(
            [
                ("ONBOARDLY_URL", Some("https://db.example.com")),
                ("ONBOARDLY_API_KEY", Some("anon")),
                ("ONBOARDLY_EMAIL", Some("ada@example.com")),
                ("ONBOARDLY_PASSWORD", Some("hunter2")),
                ("ONBOARDLY_ACTIVITY_LIMIT", Some("25")),
            ],
            || {
                let Ok(Action::Summary(globals)) = dispatch(vec!["onboardly", "summary"]) else {
                    panic!("expected summary action");
                };
                assert_eq!(globals.config.backend_url, "https://db.example.com");
                assert_eq!(globals.config.api_key.expose_secret(), "anon");
                assert_eq!(globals.config.activity_limit, 25);
                assert_eq!(globals.email.as_deref(), Some("ada@example.com"));
                assert_eq!(
                    globals.password.as_ref().map(|p| p.expose_secret().to_string()),
                    Some("hunter2".to_string())
                );
            },
        );
    }

    #[test]
    fn signup_requires_credentials() {
        temp_env::with_vars(
            [
                ("ONBOARDLY_URL", Some("https://db.example.com")),
                ("ONBOARDLY_API_KEY", Some("anon")),
                ("ONBOARDLY_EMAIL", None::<&str>),
                ("ONBOARDLY_PASSWORD", None::<&str>),
            ],
            || {
                assert!(dispatch(vec!["onboardly", "signup"]).is_err());
            },
        );
    }

    #[test]
    fn export_carries_table_and_output() {
        temp_env::with_vars(
            [
                ("ONBOARDLY_URL", Some("https://db.example.com")),
                ("ONBOARDLY_API_KEY", Some("anon")),
            ],
            || {
                let Ok(Action::Export(args)) = dispatch(vec![
                    "onboardly",
                    "export",
                    "--table",
                    "apps",
                    "--output",
                    "/tmp/apps.csv",
                ]) else {
                    panic!("expected export action");
                };
                assert_eq!(args.table, Table::Apps);
                assert_eq!(args.output, Some(PathBuf::from("/tmp/apps.csv")));
            },
        );
    }

    #[test]
    fn theme_needs_no_backend() {
        temp_env::with_vars(
            [
                ("ONBOARDLY_URL", None::<&str>),
                ("ONBOARDLY_API_KEY", None::<&str>),
                ("ONBOARDLY_PREFERENCES", Some("/tmp/onboardly-prefs.json")),
            ],
            || {
                let Ok(Action::Theme(args)) = dispatch(vec!["onboardly", "theme", "dark"]) else {
                    panic!("expected theme action");
                };
                assert_eq!(args.preferences, PathBuf::from("/tmp/onboardly-prefs.json"));
                assert_eq!(args.mode, theme::Mode::Set(Theme::Dark));
            },
        );
    }
}
