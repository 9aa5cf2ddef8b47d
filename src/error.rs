//! Client error taxonomy shared by the gateway, the session store and
//! the endpoint wrappers.

use crate::models::ProfileId;
use crate::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Missing, invalid or expired credentials. Callers route this to
    /// the login flow.
    #[error("Authentication required: {0}")]
    Auth(String),

    /// Non-2xx (other than 401) or transport failure. Deliberately
    /// opaque: the status is logged, never carried.
    #[error("Network request failed")]
    Network,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unexpected response body: {0}")]
    Decode(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Profile {0} is not linked to this account")]
    UnknownProfile(ProfileId),
}

impl ClientError {
    /// Whether the caller should send the user back to login.
    pub fn requires_login(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        tracing::debug!(error = %err, timeout = err.is_timeout(), connect = err.is_connect(), "HTTP transport error");
        Self::Network
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
