use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::profile::ProfileId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    #[serde(alias = "_id")]
    pub id: ProfileId,
    #[serde(default)]
    pub patient_id: Option<ProfileId>,
    #[serde(default)]
    pub doctor_name: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "medicines")]
    pub items: Vec<PrescribedItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescribedItem {
    #[serde(alias = "medicineName")]
    pub name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
}
