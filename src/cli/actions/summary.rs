use crate::{
    cli::{
        actions::{render::render, session},
        globals::GlobalArgs,
    },
    dashboard::LoadStatus,
    preferences::PreferenceStore,
};
use anyhow::{bail, Result};
use chrono::Local;

/// Load the dashboard once, print it, then unmount and sign out.
///
/// # Errors
/// Returns an error if sign-in fails or the dashboard data cannot be loaded.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let theme = PreferenceStore::new(&globals.config.preferences_path).theme();
    let dashboard = session::open(&globals, false).await?;

    let view = dashboard.view(Local::now().date_naive());
    print!("{}", render(&view, theme));

    dashboard.sign_out().await;

    if let LoadStatus::Failed(message) = view.status {
        bail!(message);
    }
    Ok(())
}
