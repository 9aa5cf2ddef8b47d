use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A wire string that does not name any variant of the target enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid value for {field}: {value}")]
pub struct InvalidEnum {
    pub field: &'static str,
    pub value: String,
}

/// Macro to generate enum with as_str + std::str::FromStr pattern.
///
/// Parsing is case-insensitive and treats `-` and spaces as `_`, since the
/// backend is not consistent between `CANCELLED`, `cancelled` and
/// `follow-up`. Serialization always emits the canonical snake_case form.
///
/// `FromStr` is strict. Deserialization is not: a value the backend added
/// later lands in `Other` with its raw text, so one unfamiliar record does
/// not fail the whole list it arrived in.
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            /// Wire value with no known variant, kept verbatim.
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $s,)+
                    Self::Other(raw) => raw.as_str(),
                }
            }

            pub fn is_known(&self) -> bool {
                !matches!(self, Self::Other(_))
            }
        }

        impl std::str::FromStr for $name {
            type Err = InvalidEnum;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
                match normalized.as_str() {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(InvalidEnum {
                        field: stringify!($name),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Ok(raw.parse().unwrap_or_else(|e: InvalidEnum| {
                    tracing::warn!(field = e.field, value = %e.value, "Unrecognized enum value");
                    Self::Other(e.value)
                }))
            }
        }
    };
}

str_enum!(AppointmentStatus {
    Scheduled => "scheduled",
    Confirmed => "confirmed",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
    NoShow => "no_show",
});

str_enum!(AppointmentType {
    Consultation => "consultation",
    FollowUp => "follow_up",
    Emergency => "emergency",
    RoutineCheckup => "routine_checkup",
});

str_enum!(BillStatus {
    Pending => "pending",
    Partial => "partial",
    Paid => "paid",
    Cancelled => "cancelled",
});

impl AppointmentStatus {
    /// Whether the patient may still cancel an appointment in this status.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, Self::Scheduled | Self::Confirmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn appointment_status_round_trip() {
        for (variant, s) in [
            (AppointmentStatus::Scheduled, "scheduled"),
            (AppointmentStatus::Confirmed, "confirmed"),
            (AppointmentStatus::InProgress, "in_progress"),
            (AppointmentStatus::Completed, "completed"),
            (AppointmentStatus::Cancelled, "cancelled"),
            (AppointmentStatus::NoShow, "no_show"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(AppointmentStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn parsing_tolerates_backend_casing() {
        assert_eq!(
            AppointmentStatus::from_str("CANCELLED").unwrap(),
            AppointmentStatus::Cancelled
        );
        assert_eq!(
            AppointmentType::from_str("follow-up").unwrap(),
            AppointmentType::FollowUp
        );
        assert_eq!(
            AppointmentStatus::from_str("In Progress").unwrap(),
            AppointmentStatus::InProgress
        );
    }

    #[test]
    fn unknown_value_is_rejected() {
        let err = BillStatus::from_str("refunded").unwrap_err();
        assert_eq!(err.field, "BillStatus");
        assert_eq!(err.value, "refunded");
    }

    #[test]
    fn serde_uses_canonical_form() {
        let json = serde_json::to_string(&AppointmentType::RoutineCheckup).unwrap();
        assert_eq!(json, "\"routine_checkup\"");
        let parsed: BillStatus = serde_json::from_str("\"PAID\"").unwrap();
        assert_eq!(parsed, BillStatus::Paid);
    }

    #[test]
    fn unrecognized_wire_value_is_kept_verbatim() {
        let parsed: AppointmentStatus = serde_json::from_str("\"RESCHEDULED\"").unwrap();
        assert_eq!(parsed, AppointmentStatus::Other("RESCHEDULED".into()));
        assert!(!parsed.is_known());
        assert!(!parsed.is_cancellable());
        assert_eq!(serde_json::to_string(&parsed).unwrap(), "\"RESCHEDULED\"");
    }

    #[test]
    fn only_open_appointments_are_cancellable() {
        assert!(AppointmentStatus::Scheduled.is_cancellable());
        assert!(AppointmentStatus::Confirmed.is_cancellable());
        assert!(!AppointmentStatus::Completed.is_cancellable());
        assert!(!AppointmentStatus::Cancelled.is_cancellable());
    }
}
