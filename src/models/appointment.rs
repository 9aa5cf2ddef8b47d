use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::enums::{AppointmentStatus, AppointmentType};
use super::profile::ProfileId;
use super::wire;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(alias = "_id")]
    pub id: ProfileId,
    #[serde(default)]
    pub patient_id: Option<ProfileId>,
    #[serde(default)]
    pub doctor_id: Option<ProfileId>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(with = "wire::flexible_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub time_slot: Option<String>,
    #[serde(rename = "type", default)]
    pub appointment_type: Option<AppointmentType>,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub symptoms: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(alias = "_id")]
    pub id: ProfileId,
    pub name: String,
    #[serde(default, alias = "specialty")]
    pub specialization: Option<String>,
}

/// Body of `POST /api/appointments`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointment {
    pub patient_id: ProfileId,
    pub doctor_id: ProfileId,
    #[serde(with = "wire::flexible_date")]
    pub date: NaiveDate,
    pub time_slot: String,
    #[serde(rename = "type")]
    pub appointment_type: AppointmentType,
    pub symptoms: String,
}

/// Body of `PUT /api/appointments/:id/status`.
#[derive(Debug, Serialize)]
pub(crate) struct StatusUpdate {
    pub status: AppointmentStatus,
}
