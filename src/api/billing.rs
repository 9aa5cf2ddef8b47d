//! `GET /api/billing/:id`

use super::gateway::{ApiClient, ApiRequest};
use crate::error::ClientError;
use crate::models::Bill;

impl ApiClient {
    pub async fn bill(&self, id: &str) -> Result<Bill, ClientError> {
        self.fetch(ApiRequest::get(format!("/api/billing/{id}"))).await
    }
}
