//! `GET /api/prescriptions/:id`

use super::gateway::{ApiClient, ApiRequest};
use crate::error::ClientError;
use crate::models::Prescription;

impl ApiClient {
    pub async fn prescription(&self, id: &str) -> Result<Prescription, ClientError> {
        self.fetch(ApiRequest::get(format!("/api/prescriptions/{id}")))
            .await
    }
}
