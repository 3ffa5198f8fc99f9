//! Calls made on behalf of the current session.

use allerdex_session::SessionStore;
use reqwest::{Method, RequestBuilder};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::client::ApiClient;
use crate::error::NetworkError;

/// Attaches the session store's current credential to every request.
#[derive(Clone)]
pub struct AuthorizedApi {
    client: ApiClient,
    store: SessionStore,
}

impl AuthorizedApi {
    /// Wraps `client` so each request reads the credential from `store`.
    #[must_use]
    pub fn new(client: ApiClient, store: SessionStore) -> Self {
        Self { client, store }
    }

    /// Starts a request carrying the current credential, if any.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let state = self.store.snapshot();
        self.client.request(method, path, state.credential())
    }

    /// Fetches and deserializes a JSON resource.
    ///
    /// # Errors
    ///
    /// Returns a [`NetworkError`]. A 401 is returned as
    /// [`NetworkError::Unauthorized`] without touching the session.
    #[instrument(skip(self))]
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, Report<NetworkError>> {
        let body = self.client.execute(self.request(Method::GET, path)).await?;
        let value = serde_json::from_str(&body).map_err(|e| NetworkError::InvalidResponse {
            reason: e.to_string(),
        })?;
        debug!("resource fetched");
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ApiConfig;
    use allerdex_session::codec::{ClaimSet, encode_unsigned};
    use allerdex_session::refresh::UnavailableRefreshClient;
    use allerdex_session::{MemoryStorage, Role};
    use reqwest::header::AUTHORIZATION;
    use std::sync::Arc;
    use std::time::{Duration, SystemTime};

    fn api() -> (AuthorizedApi, SessionStore) {
        let store = SessionStore::builder(
            Arc::new(MemoryStorage::new()),
            Arc::new(UnavailableRefreshClient),
        )
        .build();
        let client = ApiClient::new(ApiConfig::default()).expect("client");
        (AuthorizedApi::new(client, store.clone()), store)
    }

    fn authorization(api: &AuthorizedApi) -> Option<String> {
        let request = api
            .request(Method::GET, "/allergens")
            .build()
            .expect("request");
        request
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[test]
    fn follows_the_session_credential() {
        let (api, store) = api();
        assert_eq!(authorization(&api), None);

        let expiry = SystemTime::now() + Duration::from_secs(3600);
        let claims = ClaimSet::new(
            "7",
            "alice@example.com",
            vec![Role::user()],
            expiry.into(),
        );
        let credential = encode_unsigned(&claims);
        store.login(credential.clone()).expect("login");
        assert_eq!(authorization(&api), Some(credential.bearer()));

        store.logout();
        assert_eq!(authorization(&api), None);
    }
}
