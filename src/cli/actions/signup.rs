use crate::{
    cli::{actions::session, globals::GlobalArgs},
    session::Route,
};
use anyhow::{anyhow, Context, Result};

/// Create an account. When the backend opens a session right away it is
/// closed again before returning.
///
/// # Errors
/// Returns an error if the credentials are missing or the sign-up is refused.
pub async fn execute(globals: GlobalArgs) -> Result<()> {
    let email = globals.email.clone().context("missing required argument: --email")?;
    let password = globals
        .password
        .clone()
        .context("missing required argument: --password")?;
    let (gate, _) = session::gate(&globals)?;

    let route = gate
        .sign_up(&email, &password)
        .await
        .map_err(|err| anyhow!("Sign-up failed: {err}"))?;

    match route {
        Route::Dashboard => {
            println!("Account created, signed in as {email}.");
            gate.sign_out().await;
        }
        Route::Login => println!("Account created. Confirm {email} before signing in."),
    }
    Ok(())
}
