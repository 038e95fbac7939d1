pub mod export;
pub mod render;
pub mod session;
pub mod signup;
pub mod summary;
pub mod theme;
pub mod watch;

use crate::cli::globals::GlobalArgs;
use anyhow::Result;

pub enum Action {
    Summary(GlobalArgs),
    Watch(GlobalArgs),
    Export(export::Args),
    Signup(GlobalArgs),
    Theme(theme::Args),
}

impl Action {
    /// Execute the action.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be reached, sign-in is refused,
    /// the dashboard fails to load, or local output cannot be written.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Summary(globals) => summary::execute(globals).await,
            Self::Watch(globals) => watch::execute(globals).await,
            Self::Export(args) => export::execute(args).await,
            Self::Signup(globals) => signup::execute(globals).await,
            Self::Theme(args) => theme::execute(&args),
        }
    }
}
