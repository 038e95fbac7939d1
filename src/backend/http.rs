//! HTTP helpers for the backend REST endpoints with a consistent timeout and
//! error handling. The identity and query adapters share one client so the
//! bearer token set at sign-in applies to every later read. Error bodies are
//! trimmed and truncated before they reach the UI.

use crate::{
    config::AppConfig,
    error::{Error, Result},
    APP_USER_AGENT,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::{
    sync::{PoisonError, RwLock},
    time::Duration,
};
use tracing::debug;

/// Default request timeout (milliseconds) applied to every call.
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
/// Maximum number of error body characters surfaced to the UI.
const MAX_ERROR_CHARS: usize = 200;

pub struct BackendClient {
    http: Client,
    base_url: String,
    api_key: SecretString,
    access_token: RwLock<Option<SecretString>>,
}

impl BackendClient {
    /// # Errors
    /// Returns an error if the base URL is not an absolute http(s) URL or the
    /// HTTP client cannot be built.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let parsed = url::Url::parse(config.backend_url.trim())
            .map_err(|err| Error::Config(format!("Invalid backend URL: {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Unsupported backend URL scheme: {}",
                parsed.scheme()
            )));
        }

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(Duration::from_millis(DEFAULT_TIMEOUT_MS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.backend_url.clone(),
            api_key: config.api_key.clone(),
            access_token: RwLock::new(None),
        })
    }

    /// Stores or clears the signed-in user's access token.
    pub fn set_access_token(&self, token: Option<SecretString>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token;
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        build_url_with_base(&self.base_url, path)
    }

    /// Fetches JSON and fails on any non-success status.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-success status or an
    /// undecodable body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.authorize(self.http.get(&url).query(query)).send().await?;
        handle_json_response(response).await
    }

    /// Fetches JSON and returns `None` on 204 or 401, or when no user is
    /// signed in.
    ///
    /// # Errors
    /// Returns an error on transport failure or any other non-success status.
    pub async fn get_optional_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        if !self.has_session() {
            return Ok(None);
        }
        let url = self.url(path);
        debug!("GET {}", url);
        let response = self.authorize(self.http.get(&url)).send().await?;
        handle_optional_json_response(response).await
    }

    /// Posts JSON and parses a JSON response.
    ///
    /// # Errors
    /// Returns an error on transport failure, non-success status or an
    /// undecodable body.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        debug!("POST {}", url);
        let payload = serde_json::to_vec(body)
            .map_err(|err| Error::Serialization(format!("Failed to encode request: {err}")))?;
        let response = self
            .authorize(self.http.post(&url).query(query))
            .header("Content-Type", "application/json")
            .body(payload)
            .send()
            .await?;
        handle_json_response(response).await
    }

    /// Posts an empty body and expects no response content.
    ///
    /// # Errors
    /// Returns an error on transport failure or non-success status.
    pub async fn post_empty(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        debug!("POST {}", url);
        let response = self.authorize(self.http.post(&url)).send().await?;
        handle_empty_response(response).await
    }

    /// Attaches the API key and the user token, falling back to the API key
    /// as bearer when nobody is signed in.
    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let token = self
            .access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|token| token.expose_secret().to_string())
            .unwrap_or_else(|| self.api_key.expose_secret().to_string());

        builder
            .header("apikey", self.api_key.expose_secret())
            .bearer_auth(token)
    }
}

/// Builds a URL from an explicit base URL and the provided path.
pub(crate) fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

async fn handle_json_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| Error::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(http_error(response).await)
    }
}

async fn handle_empty_response(response: Response) -> Result<()> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(http_error(response).await)
    }
}

async fn handle_optional_json_response<T: DeserializeOwned>(
    response: Response,
) -> Result<Option<T>> {
    let status = response.status();
    if status == StatusCode::NO_CONTENT || status == StatusCode::UNAUTHORIZED {
        return Ok(None);
    }
    if status.is_success() {
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|err| Error::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(http_error(response).await)
    }
}

async fn http_error(response: Response) -> Error {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    Error::Http {
        status,
        message: error_message(&body),
    }
}

/// Picks the human-readable message out of a JSON error body, or falls back
/// to the sanitized raw body.
pub(crate) fn error_message(body: &str) -> String {
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(body) {
        for key in ["error_description", "msg", "message", "error"] {
            if let Some(text) = fields.get(key).and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    return sanitize_body(text);
                }
            }
        }
    }
    sanitize_body(body)
}

/// Sanitizes HTTP error bodies for user-facing messages by trimming and truncating.
pub(crate) fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}
