//! Profile-scoped paginated list endpoints.
//!
//! `GET /api/{appointments,billing,prescriptions}?patientId=&page=&limit=`

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;

use super::gateway::{ApiClient, ApiRequest};
use crate::error::ClientError;
use crate::loader::PageSource;
use crate::models::{Appointment, Bill, Page, Prescription, ProfileId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Appointments,
    Bills,
    Prescriptions,
}

impl ResourceKind {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Appointments => "/api/appointments",
            Self::Bills => "/api/billing",
            Self::Prescriptions => "/api/prescriptions",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appointments => "appointments",
            Self::Bills => "bills",
            Self::Prescriptions => "prescriptions",
        }
    }
}

impl ApiClient {
    /// Fetch one page of `kind` for `patient_id`.
    pub async fn fetch_page<T: DeserializeOwned>(
        &self,
        kind: ResourceKind,
        patient_id: &ProfileId,
        page: u32,
        limit: u32,
    ) -> Result<Page<T>, ClientError> {
        let body = self
            .send(
                ApiRequest::get(kind.path())
                    .query("patientId", patient_id)
                    .query("page", page)
                    .query("limit", limit),
            )
            .await?;
        Ok(Page::from_body(body, page, limit)?)
    }
}

/// A `PageSource` backed by one list endpoint.
pub struct ResourceFeed<T> {
    client: Arc<ApiClient>,
    kind: ResourceKind,
    _item: PhantomData<fn() -> T>,
}

impl<T> ResourceFeed<T> {
    pub fn new(client: Arc<ApiClient>, kind: ResourceKind) -> Self {
        Self {
            client,
            kind,
            _item: PhantomData,
        }
    }
}

impl ResourceFeed<Appointment> {
    pub fn appointments(client: Arc<ApiClient>) -> Self {
        Self::new(client, ResourceKind::Appointments)
    }
}

impl ResourceFeed<Bill> {
    pub fn bills(client: Arc<ApiClient>) -> Self {
        Self::new(client, ResourceKind::Bills)
    }
}

impl ResourceFeed<Prescription> {
    pub fn prescriptions(client: Arc<ApiClient>) -> Self {
        Self::new(client, ResourceKind::Prescriptions)
    }
}

impl<T> PageSource for ResourceFeed<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    type Item = T;

    fn kind(&self) -> ResourceKind {
        self.kind
    }

    async fn fetch_page(
        &self,
        patient_id: &ProfileId,
        page: u32,
        limit: u32,
    ) -> Result<Page<T>, ClientError> {
        self.client.fetch_page(self.kind, patient_id, page, limit).await
    }
}
