//! Session gate and navigation. The gate asks the identity service for the
//! current user once per activation and routes to the login view when there is
//! none. Only non-sensitive identity metadata is kept in memory; the access
//! token stays inside the backend client.

use crate::{
    backend::identity::{Identity, IdentityService},
    error::AuthError,
};
use regex::Regex;
use secrecy::{ExposeSecret, SecretString};
use std::{
    fmt,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};
use tracing::{debug, info, warn};

static EMAIL_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

/// The two views of the application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Login,
    Dashboard,
}

impl Route {
    /// Resolves a navigation path. Unknown paths land on the login view.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        match path.trim().trim_end_matches('/') {
            "/dashboard" => Route::Dashboard,
            _ => Route::Login,
        }
    }

    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Route::Login => "/login",
            Route::Dashboard => "/dashboard",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.path())
    }
}

pub struct SessionGate {
    identity: Arc<dyn IdentityService>,
    current: RwLock<Option<Identity>>,
}

impl SessionGate {
    #[must_use]
    pub fn new(identity: Arc<dyn IdentityService>) -> Self {
        Self {
            identity,
            current: RwLock::new(None),
        }
    }

    /// Queries the identity service and decides where to go. A failed query
    /// counts as no session; there is no retry.
    pub async fn check(&self) -> Route {
        let found = match self.identity.current_user().await {
            Ok(found) => found,
            Err(err) => {
                warn!("Session lookup failed, treating as signed out: {}", err);
                None
            }
        };

        let route = if found.is_some() {
            Route::Dashboard
        } else {
            Route::Login
        };
        self.store(found);
        debug!("Session gate resolved to {}", route);
        route
    }

    /// Resolves `path` against the stored session without calling the
    /// backend. The dashboard requires a session.
    #[must_use]
    pub fn navigate(&self, path: &str) -> Route {
        match Route::from_path(path) {
            Route::Dashboard if self.is_authenticated() => Route::Dashboard,
            _ => Route::Login,
        }
    }

    #[must_use]
    pub fn current(&self) -> Option<Identity> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Submits the login form.
    ///
    /// # Errors
    /// Returns an [`AuthError`] for invalid input or when the backend refuses
    /// the credentials. The stored session is left untouched.
    pub async fn sign_in(&self, email: &str, password: &SecretString) -> Result<Route, AuthError> {
        let email = validate_credentials(email, password)?;
        let identity = self.identity.sign_in(&email, password).await?;
        info!("Signed in as {}", identity.id);
        self.store(Some(identity));
        Ok(Route::Dashboard)
    }

    /// Submits the sign-up form. Returns the dashboard route when the backend
    /// opened a session right away, the login route when the account awaits
    /// confirmation.
    ///
    /// # Errors
    /// Returns an [`AuthError`] for invalid input or a refused sign-up.
    pub async fn sign_up(&self, email: &str, password: &SecretString) -> Result<Route, AuthError> {
        let email = validate_credentials(email, password)?;
        match self.identity.sign_up(&email, password).await? {
            Some(identity) => {
                info!("Signed up and signed in as {}", identity.id);
                self.store(Some(identity));
                Ok(Route::Dashboard)
            }
            None => {
                info!("Sign-up accepted, awaiting email confirmation");
                Ok(Route::Login)
            }
        }
    }

    /// Ends the session. Always lands on the login view.
    pub async fn sign_out(&self) -> Route {
        if let Err(err) = self.identity.sign_out().await {
            warn!("Sign-out request failed: {}", err);
        }
        self.store(None);
        Route::Login
    }

    fn store(&self, identity: Option<Identity>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = identity;
    }
}

/// Trims and lowercases the email and checks both form fields.
fn validate_credentials(email: &str, password: &SecretString) -> Result<String, AuthError> {
    let email = email.trim().to_lowercase();
    if !valid_email(&email) {
        return Err(AuthError::InvalidEmail);
    }
    if password.expose_secret().is_empty() {
        return Err(AuthError::MissingPassword);
    }
    Ok(email)
}

pub(crate) fn valid_email(email: &str) -> bool {
    EMAIL_PATTERN
        .get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok())
        .as_ref()
        .is_some_and(|regex| regex.is_match(email))
}
