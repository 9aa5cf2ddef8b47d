//! Login and profile-listing endpoints.
//!
//! - `POST /api/auth/request-otp` `{mobile}`
//! - `POST /api/auth/verify-otp` `{mobile, otp}` → `{token, refreshToken?, user?}`
//! - `GET /api/auth/patient-profiles` → `{profiles, defaultProfileId}`

use serde::Deserialize;
use serde_json::json;

use super::gateway::{ApiClient, ApiRequest};
use crate::error::ClientError;
use crate::models::{ProfileListing, User};
use crate::session::ProfileDirectory;

/// Digits in a one-time password.
pub const OTP_LENGTH: usize = 4;

/// Digits in a mobile number, country code excluded.
pub const MOBILE_LENGTH: usize = 10;

/// Credentials issued by OTP verification or refresh.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TokenGrant {
    #[serde(alias = "accessToken")]
    pub token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

/// Strip separators and check the number has exactly ten digits.
pub fn normalize_mobile(raw: &str) -> Result<String, ClientError> {
    let digits: String = raw
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect();
    if digits.len() == MOBILE_LENGTH && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(digits)
    } else {
        Err(ClientError::InvalidInput(format!(
            "mobile number must have {MOBILE_LENGTH} digits"
        )))
    }
}

pub fn validate_otp(otp: &str) -> Result<(), ClientError> {
    if otp.len() == OTP_LENGTH && otp.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ClientError::InvalidInput(format!("OTP must have {OTP_LENGTH} digits")))
    }
}

impl ApiClient {
    /// Ask the backend to text a one-time password to `mobile`.
    pub async fn request_otp(&self, mobile: &str) -> Result<(), ClientError> {
        let mobile = normalize_mobile(mobile)?;
        self.send(ApiRequest::post("/api/auth/request-otp", json!({ "mobile": mobile })).anonymous())
            .await?;
        tracing::info!("OTP requested");
        Ok(())
    }

    /// Exchange an OTP for credentials and persist them with the user
    /// record. A wrong code surfaces as `ClientError::Auth`.
    pub async fn verify_otp(&self, mobile: &str, otp: &str) -> Result<Option<User>, ClientError> {
        let mobile = normalize_mobile(mobile)?;
        validate_otp(otp)?;

        let grant: TokenGrant = self
            .fetch(
                ApiRequest::post("/api/auth/verify-otp", json!({ "mobile": mobile, "otp": otp }))
                    .anonymous(),
            )
            .await?;

        let session = self.session();
        session.save_token(&grant.token)?;
        if let Some(refresh) = &grant.refresh_token {
            session.save_refresh_token(refresh)?;
        }
        if let Some(user) = &grant.user {
            session.save_user(user)?;
        }
        tracing::info!(has_refresh_token = grant.refresh_token.is_some(), "OTP verified, session started");
        Ok(grant.user)
    }

    /// `GET /api/auth/patient-profiles`.
    pub async fn fetch_patient_profiles(&self) -> Result<ProfileListing, ClientError> {
        self.fetch(ApiRequest::get("/api/auth/patient-profiles")).await
    }

    /// Drop local credentials. The backend keeps no session to revoke.
    pub fn logout(&self) -> Result<(), ClientError> {
        self.session().logout()?;
        Ok(())
    }
}

impl ProfileDirectory for ApiClient {
    async fn fetch_patient_profiles(&self) -> Result<ProfileListing, ClientError> {
        ApiClient::fetch_patient_profiles(self).await
    }
}
