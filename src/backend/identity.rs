//! Identity service contract and its REST client. Credentials and access
//! tokens flow through here and must never be logged.

use crate::{
    backend::http::BackendClient,
    error::{AuthError, Error, Result},
    model::RecordId,
};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info_span, Instrument};

/// The signed-in user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: RecordId,
    #[serde(default)]
    pub email: Option<String>,
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait IdentityService: Send + Sync {
    /// Returns the current identity, or `None` when nobody is signed in.
    async fn current_user(&self) -> Result<Option<Identity>>;

    async fn sign_in(&self, email: &str, password: &SecretString) -> std::result::Result<Identity, AuthError>;

    /// Creates an account. Returns the identity when the backend also opens
    /// a session, `None` when it waits for email confirmation.
    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> std::result::Result<Option<Identity>, AuthError>;

    async fn sign_out(&self) -> Result<()>;
}

#[derive(Deserialize)]
struct SessionResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    user: Option<Identity>,
}

/// Identity client for the backend's auth endpoints.
pub struct HttpIdentity {
    client: Arc<BackendClient>,
}

impl HttpIdentity {
    #[must_use]
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }

    fn open_session(&self, session: SessionResponse) -> Option<Identity> {
        let token = session.access_token.filter(|token| !token.is_empty())?;
        self.client.set_access_token(Some(SecretString::from(token)));
        session.user
    }
}

#[async_trait]
impl IdentityService for HttpIdentity {
    async fn current_user(&self) -> Result<Option<Identity>> {
        let span = info_span!("auth.current_user", http.method = "GET");
        self.client
            .get_optional_json::<Identity>("/auth/v1/user")
            .instrument(span)
            .await
    }

    async fn sign_in(&self, email: &str, password: &SecretString) -> std::result::Result<Identity, AuthError> {
        let span = info_span!("auth.sign_in", http.method = "POST");
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
        });
        let session: SessionResponse = self
            .client
            .post_json(
                "/auth/v1/token",
                &[("grant_type", "password".to_string())],
                &body,
            )
            .instrument(span)
            .await
            .map_err(rejected)?;

        self.open_session(session)
            .ok_or_else(|| AuthError::Rejected("Sign-in response did not include a session.".to_string()))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &SecretString,
    ) -> std::result::Result<Option<Identity>, AuthError> {
        let span = info_span!("auth.sign_up", http.method = "POST");
        let body = json!({
            "email": email,
            "password": password.expose_secret(),
        });
        let session: SessionResponse = self
            .client
            .post_json("/auth/v1/signup", &[], &body)
            .instrument(span)
            .await
            .map_err(rejected)?;

        Ok(self.open_session(session))
    }

    async fn sign_out(&self) -> Result<()> {
        let span = info_span!("auth.sign_out", http.method = "POST");
        let result = if self.client.has_session() {
            self.client.post_empty("/auth/v1/logout").instrument(span).await
        } else {
            Ok(())
        };
        // The local session ends even when the server call fails.
        self.client.set_access_token(None);
        result
    }
}

/// Client errors (4xx) mean the backend refused the credentials; anything
/// else is a transport problem.
fn rejected(err: Error) -> AuthError {
    match err {
        Error::Http { status, message } if (400..500).contains(&status) => {
            AuthError::Rejected(message)
        }
        other => AuthError::Backend(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use std::net::TcpListener;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    fn identity_for(server: &MockServer) -> (HttpIdentity, Arc<BackendClient>) {
        let config = AppConfig::new(server.uri(), "anon-key");
        let client = Arc::new(BackendClient::new(&config).unwrap());
        (HttpIdentity::new(Arc::clone(&client)), client)
    }

    #[tokio::test]
    async fn sign_in_stores_token_and_returns_identity() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon-key"))
            .and(body_json(json!({"email": "ada@example.com", "password": "hunter2"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "user-token",
                "user": {"id": "u1", "email": "ada@example.com"}
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer user-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "u1", "email": "ada@example.com"})),
            )
            .mount(&server)
            .await;

        let (identity, client) = identity_for(&server);
        let user = identity
            .sign_in("ada@example.com", &SecretString::from("hunter2"))
            .await
            .unwrap();

        assert_eq!(user.id, RecordId::from("u1"));
        assert!(client.has_session());
        assert_eq!(identity.current_user().await.unwrap(), Some(user));
    }

    #[tokio::test]
    async fn sign_in_rejection_carries_backend_message() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let (identity, client) = identity_for(&server);
        let err = identity
            .sign_in("ada@example.com", &SecretString::from("wrong"))
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::Rejected(ref msg) if msg == "Invalid login credentials"));
        assert!(!client.has_session());
    }

    #[tokio::test]
    async fn server_errors_are_not_rejections() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let (identity, _) = identity_for(&server);
        let err = identity
            .sign_up("ada@example.com", &SecretString::from("hunter2"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AuthError::Backend(Error::Http { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn sign_up_without_session_waits_for_confirmation() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/signup"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": "u2", "email": "new@example.com"})),
            )
            .mount(&server)
            .await;

        let (identity, client) = identity_for(&server);
        let result = identity
            .sign_up("new@example.com", &SecretString::from("hunter2"))
            .await
            .unwrap();

        assert_eq!(result, None);
        assert!(!client.has_session());
    }

    #[tokio::test]
    async fn current_user_is_none_without_token_or_on_401() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let (identity, client) = identity_for(&server);
        assert_eq!(identity.current_user().await.unwrap(), None);

        client.set_access_token(Some(SecretString::from("expired")));
        assert_eq!(identity.current_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn sign_out_clears_token_even_on_failure() {
        if !can_bind_localhost() {
            return;
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/logout"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let (identity, client) = identity_for(&server);
        client.set_access_token(Some(SecretString::from("user-token")));

        assert!(identity.sign_out().await.is_err());
        assert!(!client.has_session());
    }
}
