use crate::preferences::{PreferenceStore, Theme};
use anyhow::{Context, Result};
use std::{path::PathBuf, str::FromStr};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Show,
    Set(Theme),
    Toggle,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "show" => Ok(Self::Show),
            "toggle" => Ok(Self::Toggle),
            other => other.parse().map(Self::Set),
        }
    }
}

#[derive(Debug)]
pub struct Args {
    pub preferences: PathBuf,
    pub mode: Mode,
}

/// Show, set or toggle the persisted theme and print the result.
///
/// # Errors
/// Returns an error if the preference file cannot be written.
pub fn execute(args: &Args) -> Result<()> {
    println!("{}", apply(args)?);
    Ok(())
}

fn apply(args: &Args) -> Result<Theme> {
    let store = PreferenceStore::new(&args.preferences);
    let theme = match args.mode {
        Mode::Show => store.theme(),
        Mode::Set(theme) => {
            store
                .set_theme(theme)
                .with_context(|| format!("Failed to save {}", store.path().display()))?;
            theme
        }
        Mode::Toggle => store
            .toggle_theme()
            .with_context(|| format!("Failed to save {}", store.path().display()))?,
    };
    Ok(theme)
}
