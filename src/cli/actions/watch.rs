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
use tracing::{debug, info};

const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";

/// Keep the dashboard mounted and re-render on every revision until Ctrl-C.
///
/// # Errors
/// Returns an error if sign-in fails or the initial load fails.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let theme = PreferenceStore::new(&globals.config.preferences_path).theme();
    let dashboard = session::open(&globals, true).await?;

    if let LoadStatus::Failed(message) = dashboard.status() {
        print!("{}", render(&dashboard.view(Local::now().date_naive()), theme));
        dashboard.sign_out().await;
        bail!(message);
    }

    let mut revisions = dashboard.revisions();
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        print!(
            "{CLEAR_SCREEN}{}",
            render(&dashboard.view(Local::now().date_naive()), theme)
        );

        tokio::select! {
            changed = revisions.changed() => {
                if changed.is_err() {
                    debug!("Revision channel closed");
                    break;
                }
            }
            _ = &mut shutdown => {
                info!("Interrupted, closing subscriptions");
                break;
            }
        }
    }

    dashboard.sign_out().await;
    Ok(())
}
