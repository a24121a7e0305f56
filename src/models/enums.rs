use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
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
    };
}

str_enum!(EntityType {
    Organization => "organization",
    Vehicle => "vehicle",
    Horse => "horse",
});

str_enum!(ProcessingStatus {
    None => "none",
    Pending => "pending",
    Processing => "processing",
    Retrying => "retrying",
    Completed => "completed",
    Failed => "failed",
});

str_enum!(RequirementCategory {
    Base => "base",
    Distance => "distance",
    Border => "border",
    Country => "country",
});

str_enum!(WarningLevel {
    Info => "info",
    Warning => "warning",
});

impl ProcessingStatus {
    /// States from which an extraction attempt may start.
    pub fn can_start_attempt(&self) -> bool {
        matches!(self, Self::None | Self::Pending | Self::Retrying)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn processing_status_round_trip() {
        for (variant, s) in [
            (ProcessingStatus::None, "none"),
            (ProcessingStatus::Pending, "pending"),
            (ProcessingStatus::Processing, "processing"),
            (ProcessingStatus::Retrying, "retrying"),
            (ProcessingStatus::Completed, "completed"),
            (ProcessingStatus::Failed, "failed"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(ProcessingStatus::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn entity_type_round_trip() {
        for (variant, s) in [
            (EntityType::Organization, "organization"),
            (EntityType::Vehicle, "vehicle"),
            (EntityType::Horse, "horse"),
        ] {
            assert_eq!(variant.as_str(), s);
            assert_eq!(EntityType::from_str(s).unwrap(), variant);
        }
    }

    #[test]
    fn invalid_enum_value_is_rejected() {
        let err = ProcessingStatus::from_str("queued").unwrap_err();
        assert!(err.to_string().contains("ProcessingStatus"));
        assert!(err.to_string().contains("queued"));
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&RequirementCategory::Border).unwrap();
        assert_eq!(json, "\"border\"");
        let level: WarningLevel = serde_json::from_str("\"warning\"").unwrap();
        assert_eq!(level, WarningLevel::Warning);
    }

    #[test]
    fn only_idle_states_can_start_an_attempt() {
        assert!(ProcessingStatus::None.can_start_attempt());
        assert!(ProcessingStatus::Pending.can_start_attempt());
        assert!(ProcessingStatus::Retrying.can_start_attempt());
        assert!(!ProcessingStatus::Processing.can_start_attempt());
        assert!(!ProcessingStatus::Completed.can_start_attempt());
        assert!(!ProcessingStatus::Failed.can_start_attempt());
    }
}
