//! Wiring shared by the backend-facing actions: one HTTP client for identity
//! and queries, a polling change feed, the session gate and the mounted
//! dashboard.

use crate::{
    backend::{BackendClient, HttpIdentity, HttpQuery, IdentityService, PollingFeed, QueryService},
    cli::globals::GlobalArgs,
    dashboard::{Dashboard, Mount},
    session::SessionGate,
    store::LiveStore,
};
use anyhow::{anyhow, bail, Context, Result};
use secrecy::SecretString;
use std::sync::Arc;
use tracing::debug;

/// Builds the session gate over a fresh backend client.
///
/// # Errors
/// Returns an error if the backend URL is invalid.
pub fn gate(globals: &GlobalArgs) -> Result<(Arc<SessionGate>, Arc<dyn QueryService>)> {
    let client = Arc::new(
        BackendClient::new(&globals.config).context("Failed to create backend client")?,
    );
    let identity: Arc<dyn IdentityService> = Arc::new(HttpIdentity::new(Arc::clone(&client)));
    let query: Arc<dyn QueryService> = Arc::new(HttpQuery::new(client));
    Ok((Arc::new(SessionGate::new(identity)), query))
}

/// Signs in with the configured credentials, if any, and mounts the
/// dashboard. With `live` unset the tables are read once and no polling
/// starts.
///
/// # Errors
/// Returns an error if sign-in is refused or there is no session.
pub async fn open(globals: &GlobalArgs, live: bool) -> Result<Dashboard> {
    let (gate, query) = gate(globals)?;

    if let Some(email) = &globals.email {
        let password = globals.password.clone().unwrap_or_else(SecretString::default);
        gate.sign_in(email, &password)
            .await
            .map_err(|err| anyhow!("Sign-in failed: {err}"))?;
    }

    let feed = Arc::new(PollingFeed::new(
        Arc::clone(&query),
        globals.config.poll_interval,
        globals.config.activity_limit,
    ));
    let store = LiveStore::new(query, feed, globals.config.activity_limit);

    let mounted = if live {
        Dashboard::mount(gate, store).await
    } else {
        Dashboard::mount_once(gate, store).await
    };
    match mounted {
        Mount::Ready(dashboard) => {
            debug!("Dashboard mounted");
            Ok(dashboard)
        }
        Mount::Redirect(route) => {
            bail!("Not signed in (redirected to {route}); pass --email and --password")
        }
    }
}
