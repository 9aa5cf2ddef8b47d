//! Appointment endpoints beyond the paginated list.
//!
//! - `GET /api/appointments/:id`
//! - `PUT /api/appointments/:id/status` `{status}`
//! - `GET /api/appointments/doctors`
//! - `POST /api/appointments`

use serde_json::Value;

use super::gateway::{ApiClient, ApiRequest};
use crate::error::ClientError;
use crate::models::{Appointment, AppointmentStatus, BookAppointment, Doctor, StatusUpdate};

impl ApiClient {
    pub async fn appointment(&self, id: &str) -> Result<Appointment, ClientError> {
        self.fetch(ApiRequest::get(format!("/api/appointments/{id}"))).await
    }

    /// Set an appointment's status. The response body is not interpreted.
    pub async fn update_appointment_status(
        &self,
        id: &str,
        status: AppointmentStatus,
    ) -> Result<(), ClientError> {
        let body = serde_json::to_value(StatusUpdate { status: status.clone() })?;
        self.send(ApiRequest::put(format!("/api/appointments/{id}/status"), body))
            .await?;
        tracing::info!(appointment = id, status = status.as_str(), "Appointment status updated");
        Ok(())
    }

    pub async fn cancel_appointment(&self, id: &str) -> Result<(), ClientError> {
        self.update_appointment_status(id, AppointmentStatus::Cancelled)
            .await
    }

    pub async fn doctors(&self) -> Result<Vec<Doctor>, ClientError> {
        let body = self.send(ApiRequest::get("/api/appointments/doctors")).await?;
        // Some tenants answer `{ doctors: [...] }` instead of a bare list.
        let list = match body {
            Value::Object(mut map) if map.contains_key("doctors") => {
                map.remove("doctors").unwrap_or(Value::Null)
            }
            other => other,
        };
        Ok(serde_json::from_value(list)?)
    }

    pub async fn book_appointment(&self, request: &BookAppointment) -> Result<Appointment, ClientError> {
        if request.time_slot.trim().is_empty() {
            return Err(ClientError::InvalidInput("a time slot is required".into()));
        }
        let body = serde_json::to_value(request)?;
        let appointment: Appointment = self
            .fetch(ApiRequest::post("/api/appointments", body))
            .await?;
        tracing::info!(appointment = %appointment.id, "Appointment booked");
        Ok(appointment)
    }
}
