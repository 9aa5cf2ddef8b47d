use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Server-assigned identifier of a patient profile.
///
/// The backend emits numeric ids for some tenants and string ids for
/// others; both deserialize into the same canonical string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProfileId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for ProfileId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(serde_json::Number),
}

impl<'de> Deserialize<'de> for ProfileId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Number(n) => Self(n.to_string()),
        })
    }
}

/// One patient identity reachable by the logged-in account.
///
/// A guardian login may see several of these, possibly across clinics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "ProfileWire")]
pub struct PatientProfile {
    pub id: ProfileId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub clinic_id: Option<ProfileId>,
    #[serde(default)]
    pub clinic_name: Option<String>,
    #[serde(default, alias = "patientDisplayId")]
    pub display_id: Option<String>,
}

/// Wire shape of a profile. Patient records often carry `id` next to
/// `_id` or `patientId`, so each is read separately and `id` wins.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileWire {
    #[serde(default)]
    id: Option<ProfileId>,
    #[serde(default, rename = "_id")]
    object_id: Option<ProfileId>,
    #[serde(default)]
    patient_id: Option<ProfileId>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    clinic_id: Option<ProfileId>,
    #[serde(default)]
    clinic_name: Option<String>,
    #[serde(default)]
    display_id: Option<String>,
    #[serde(default)]
    patient_display_id: Option<String>,
}

impl TryFrom<ProfileWire> for PatientProfile {
    type Error = &'static str;

    fn try_from(wire: ProfileWire) -> Result<Self, Self::Error> {
        let id = wire
            .id
            .or(wire.object_id)
            .or(wire.patient_id)
            .ok_or("profile has no id")?;
        Ok(Self {
            id,
            name: wire.name,
            clinic_id: wire.clinic_id,
            clinic_name: wire.clinic_name,
            display_id: wire.display_id.or(wire.patient_display_id),
        })
    }
}

/// Account record returned by OTP verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: ProfileId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// Body of `GET /api/auth/patient-profiles` after `data` unwrapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileListing {
    #[serde(default)]
    pub profiles: Vec<PatientProfile>,
    #[serde(default)]
    pub default_profile_id: Option<ProfileId>,
}

impl ProfileListing {
    /// Server-declared default when it names a returned profile,
    /// else the first profile in server order.
    pub fn default_profile(&self) -> Option<&PatientProfile> {
        self.default_profile_id
            .as_ref()
            .and_then(|id| self.profiles.iter().find(|p| &p.id == id))
            .or_else(|| self.profiles.first())
    }
}
