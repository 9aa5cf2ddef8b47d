use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::BillStatus;
use super::profile::ProfileId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    #[serde(alias = "_id")]
    pub id: ProfileId,
    #[serde(default)]
    pub bill_number: Option<String>,
    #[serde(default)]
    pub patient_id: Option<ProfileId>,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default)]
    pub paid_amount: f64,
    pub status: BillStatus,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub items: Vec<BillItem>,
}

impl Bill {
    /// Amount still owed, never negative.
    pub fn balance_due(&self) -> f64 {
        (self.total_amount - self.paid_amount).max(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillItem {
    pub description: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub amount: f64,
}

fn one() -> u32 {
    1
}
