//! HTTP implementations of the session RPCs.
//!
//! Endpoints, relative to the configured API base URL:
//! - `POST auth/refresh` with `{ "refreshToken" }` returns `{ "accessToken", "refreshToken" }`
//! - `GET users/me` returns `{ "user": Profile }`
//! - `GET resources` returns `{ "resources": [Resource] }`
//!
//! Error bodies are `{ "code", "message" }` or `{ "error": { "code", "message" } }`.

use crate::rpc::{IssuedTokens, ListResourcesRpc, Profile, ProfileRpc, RefreshRpc, Resource};
use crate::token_manager::TokenLifecycleManager;
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use url::Url;

const REFRESH_PATH: &str = "auth/refresh";
const PROFILE_PATH: &str = "users/me";
const RESOURCES_PATH: &str = "resources";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

#[derive(Debug, Default, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Nested { error: ErrorDetail },
    Flat(ErrorDetail),
}

/// Classify a non-success response from its status and body.
fn error_from_response(status: u16, body: &str) -> AuthError {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::Nested { error }) => error,
        Ok(ErrorBody::Flat(detail)) => detail,
        Err(_) => ErrorDetail::default(),
    };
    let message = detail
        .message
        .unwrap_or_else(|| format!("request failed ({})", summarize_response_body(body)));
    AuthError::from_api_failure(Some(status), detail.code.as_deref(), &message)
}

/// Base URL with a trailing slash so relative joins keep its path.
fn normalize_base(mut base_url: Url) -> Url {
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }
    base_url
}

fn endpoint(base_url: &Url, path: &str) -> AuthResult<Url> {
    base_url
        .join(path)
        .map_err(|e| AuthError::Protocol(format!("Invalid endpoint {}: {}", path, e)))
}

async fn send_json<T: DeserializeOwned>(
    request: reqwest::RequestBuilder,
    operation: &str,
) -> AuthResult<T> {
    let response = request
        .timeout(REQUEST_TIMEOUT)
        .header("Accept", "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(
            operation,
            status = %status,
            body_summary = %summarize_response_body(&body),
            "API request failed"
        );
        return Err(error_from_response(status.as_u16(), &body));
    }

    Ok(response.json().await?)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Deserialize)]
struct ProfileEnvelope {
    user: Profile,
}

#[derive(Deserialize)]
struct ResourcesEnvelope {
    resources: Vec<Resource>,
}

/// Refresh endpoint client.
#[derive(Clone)]
pub struct HttpRefreshClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl HttpRefreshClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: normalize_base(base_url),
        }
    }
}

#[async_trait]
impl RefreshRpc for HttpRefreshClient {
    async fn refresh(&self, refresh_token: &str) -> AuthResult<IssuedTokens> {
        let url = endpoint(&self.base_url, REFRESH_PATH)?;
        tracing::debug!(url = %url, "Requesting token refresh");
        let request = self
            .http_client
            .post(url)
            .json(&RefreshRequest { refresh_token });
        send_json(request, "refresh").await
    }
}

/// Authenticated API client.
///
/// The trait impls send the in-memory access token as a bearer token; it never
/// refreshes on its own. Wrap calls in [`crate::AuthorizedCaller`] for refresh
/// and retry, passing its token to [`HttpApiClient::list_resources_with`].
#[derive(Clone)]
pub struct HttpApiClient {
    http_client: reqwest::Client,
    base_url: Url,
    tokens: TokenLifecycleManager,
}

impl HttpApiClient {
    pub fn new(base_url: Url, tokens: TokenLifecycleManager) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            base_url: normalize_base(base_url),
            tokens,
        }
    }

    /// List resources with an explicit bearer token.
    pub async fn list_resources_with(&self, access_token: &str) -> AuthResult<Vec<Resource>> {
        let envelope: ResourcesEnvelope =
            send_json(self.bearer_get(RESOURCES_PATH, access_token)?, "list_resources").await?;
        tracing::debug!(count = envelope.resources.len(), "Listed resources");
        Ok(envelope.resources)
    }

    fn current_access_token(&self) -> AuthResult<String> {
        self.tokens.get_access_token().ok_or_else(|| {
            AuthError::from_api_failure(None, Some("UNAUTHORIZED"), "No access token in memory")
        })
    }

    fn bearer_get(&self, path: &str, access_token: &str) -> AuthResult<reqwest::RequestBuilder> {
        let url = endpoint(&self.base_url, path)?;
        Ok(self
            .http_client
            .get(url)
            .header("Authorization", format!("Bearer {}", access_token)))
    }
}

#[async_trait]
impl ProfileRpc for HttpApiClient {
    async fn fetch_profile(&self) -> AuthResult<Profile> {
        let access_token = self.current_access_token()?;
        let envelope: ProfileEnvelope =
            send_json(self.bearer_get(PROFILE_PATH, &access_token)?, "fetch_profile").await?;
        Ok(envelope.user)
    }
}

#[async_trait]
impl ListResourcesRpc for HttpApiClient {
    async fn list_resources(&self) -> AuthResult<Vec<Resource>> {
        let access_token = self.current_access_token()?;
        self.list_resources_with(&access_token).await
    }
}
