//! Fetch-with-auth gateway.
//!
//! Every backend call goes through `ApiClient::send`, which:
//! 1. attaches `Authorization: Bearer <token>` when a token is stored,
//! 2. on a 401 runs the refresh flow once and retries the request once,
//! 3. normalizes the JSON body (`pagination` → whole body, `data` →
//!    unwrapped, otherwise raw).
//!
//! A failed refresh clears the session and surfaces `ClientError::Auth`;
//! other non-2xx statuses become an opaque `ClientError::Network`.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use super::auth::TokenGrant;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::session::SessionStore;

const REFRESH_PATH: &str = "/api/auth/refresh";

// ═══════════════════════════════════════════════════════════
// ApiRequest
// ═══════════════════════════════════════════════════════════

/// A backend call, kept around so it can be replayed after a refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Value>,
    authenticated: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            authenticated: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Send without credentials and without the refresh-and-retry step.
    /// Used by the login endpoints, where a 401 means "wrong code".
    pub fn anonymous(mut self) -> Self {
        self.authenticated = false;
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

// ═══════════════════════════════════════════════════════════
// ApiClient
// ═══════════════════════════════════════════════════════════

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<SessionStore>,
    /// Serializes refreshes so concurrent 401s trigger one token exchange.
    refresh_lock: tokio::sync::Mutex<()>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session: Arc<SessionStore>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to create HTTP client");
                ClientError::Network
            })?;

        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session,
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and decode the normalized body into `T`.
    pub async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T, ClientError> {
        let body = self.send(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Send a request, refreshing and retrying once on 401.
    pub async fn send(&self, request: ApiRequest) -> Result<Value, ClientError> {
        if !request.authenticated {
            let response = self.dispatch(&request, None).await?;
            return read_body(response, &request).await;
        }

        let token = self.session.token()?;
        let response = self.dispatch(&request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_body(response, &request).await;
        }

        tracing::info!(path = %request.path, "Access token rejected, refreshing");
        let fresh = self.refresh_access_token(token.as_deref()).await?;

        let retried = self.dispatch(&request, Some(&fresh)).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!(path = %request.path, "Request rejected again after token refresh");
            return Err(ClientError::Auth("credentials rejected after refresh".into()));
        }
        read_body(retried, &request).await
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        tracing::debug!(
            method = %request.method,
            path = %request.path,
            status = response.status().as_u16(),
            "API response"
        );
        Ok(response)
    }

    /// Obtain a usable access token after `stale` was rejected.
    ///
    /// If another request already rotated the token while we waited for
    /// the lock, that token is reused instead of refreshing again.
    async fn refresh_access_token(&self, stale: Option<&str>) -> Result<String, ClientError> {
        let _guard = self.refresh_lock.lock().await;

        if let Some(current) = self.session.token()? {
            if Some(current.as_str()) != stale {
                return Ok(current);
            }
        }

        let Some(refresh_token) = self.session.refresh_token()? else {
            return self.fail_refresh("no refresh token stored");
        };

        let grant = match self.exchange_refresh_token(&refresh_token).await {
            Ok(grant) => grant,
            Err(reason) => return self.fail_refresh(&reason),
        };

        self.session.save_token(&grant.token)?;
        if let Some(rotated) = &grant.refresh_token {
            self.session.save_refresh_token(rotated)?;
        }
        tracing::info!("Access token refreshed");
        Ok(grant.token.clone())
    }

    async fn exchange_refresh_token(&self, refresh_token: &str) -> Result<TokenGrant, String> {
        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let response = self
            .http
            .post(url)
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await
            .map_err(|e| format!("refresh request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("refresh rejected with status {}", status.as_u16()));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("refresh response unreadable: {e}"))?;
        serde_json::from_value(normalize_body(body))
            .map_err(|e| format!("refresh response missing token: {e}"))
    }

    fn fail_refresh(&self, reason: &str) -> Result<String, ClientError> {
        tracing::warn!(reason, "Token refresh failed, clearing session");
        self.session.logout()?;
        Err(ClientError::Auth(reason.to_string()))
    }
}

// ═══════════════════════════════════════════════════════════
// Body handling
// ═══════════════════════════════════════════════════════════

async fn read_body(response: reqwest::Response, request: &ApiRequest) -> Result<Value, ClientError> {
    let status = response.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Auth(format!("{} requires authentication", request.path)));
    }
    if !status.is_success() {
        tracing::warn!(
            method = %request.method,
            path = %request.path,
            status = status.as_u16(),
            "API request failed"
        );
        return Err(ClientError::Network);
    }

    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    let body: Value = serde_json::from_str(&text)?;
    Ok(normalize_body(body))
}

/// Keep paginated bodies whole, unwrap `data` envelopes, pass anything
/// else through.
pub fn normalize_body(body: Value) -> Value {
    match body {
        Value::Object(mut map) if !map.contains_key("pagination") && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
