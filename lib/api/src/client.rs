//! Catalog backend client for the two credential calls.

use allerdex_core::Email;
use allerdex_session::{Credential, RefreshClient, RefreshFailure};
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Method, RequestBuilder, StatusCode};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::ApiConfig;
use crate::error::NetworkError;

/// Body of an authenticate request.
#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Credential-bearing response: a bare string or `{ "token": "..." }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CredentialResponse {
    Bare(String),
    Wrapped { token: String },
}

/// Error body carrying a human-readable message.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// HTTP client for the catalog backend.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
}

impl ApiClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: ApiConfig) -> Result<Self, Report<NetworkError>> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| NetworkError::Request {
                reason: format!("HTTP client error: {}", e),
            })?;
        Ok(Self { http, config })
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Starts a request to `path`, attaching `credential` as a bearer header.
    pub fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let builder = self.http.request(method, self.config.url(path));
        match credential {
            Some(credential) => builder.header(AUTHORIZATION, credential.bearer()),
            None => builder,
        }
    }

    /// Exchanges an email and password for a credential.
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`] whose [`user_message`](NetworkError::user_message)
    /// is suitable for the login form.
    #[instrument(skip(self, password))]
    pub async fn authenticate(
        &self,
        email: &Email,
        password: &str,
    ) -> Result<Credential, Report<NetworkError>> {
        let request = self
            .request(Method::POST, &self.config.authenticate_path, None)
            .json(&LoginRequest {
                email: email.as_str(),
                password,
            });
        let body = self.execute(request).await?;
        let credential = parse_credential(&body)?;
        debug!("authentication succeeded");
        Ok(credential)
    }

    /// Requests a renewed credential, authorized by `current`.
    #[instrument(skip_all, fields(has_credential = current.is_some()))]
    async fn renew(&self, current: Option<&Credential>) -> Result<Credential, NetworkError> {
        let request = self.request(Method::GET, &self.config.refresh_path, current);
        let body = self.execute(request).await?;
        parse_credential(&body)
    }

    /// Sends `request` and returns the body of a successful response.
    ///
    /// A 401 is logged and returned as [`NetworkError::Unauthorized`]; it
    /// does not trigger a refresh.
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<String, NetworkError> {
        let response = request.send().await.map_err(|e| NetworkError::Request {
            reason: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| NetworkError::Request {
            reason: e.to_string(),
        })?;
        check_status(status, body)
    }
}

#[async_trait]
impl RefreshClient for ApiClient {
    async fn refresh(&self, current: Option<&Credential>) -> Result<Credential, RefreshFailure> {
        self.renew(current).await.map_err(RefreshFailure::from)
    }
}

/// Classifies a response by status, returning the body on success.
pub(crate) fn check_status(status: StatusCode, body: String) -> Result<String, NetworkError> {
    if status.is_success() {
        return Ok(body);
    }

    let message = serde_json::from_str::<ErrorBody>(&body)
        .ok()
        .and_then(|b| b.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });

    if status == StatusCode::UNAUTHORIZED {
        warn!(%message, "backend rejected credential");
        return Err(NetworkError::Unauthorized { message });
    }

    Err(NetworkError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Extracts a credential from a response body.
///
/// Accepts a JSON string, a `{ "token": ... }` object, or plain text.
pub(crate) fn parse_credential(body: &str) -> Result<Credential, NetworkError> {
    let trimmed = body.trim();
    let raw = match serde_json::from_str::<CredentialResponse>(trimmed) {
        Ok(CredentialResponse::Bare(token) | CredentialResponse::Wrapped { token }) => token,
        Err(_) if !trimmed.starts_with(['{', '[', '"']) => trimmed.to_string(),
        Err(e) => {
            return Err(NetworkError::InvalidResponse {
                reason: e.to_string(),
            });
        }
    };

    if raw.is_empty() {
        return Err(NetworkError::InvalidResponse {
            reason: "empty credential".to_string(),
        });
    }
    Ok(Credential::new(raw))
}
