use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern.
/// Variants are declared lowest to highest so `Ord` follows severity.
macro_rules! str_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
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

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(
    /// Three-tier risk band derived from the 0–100 score.
    RiskLevel {
        Green => "green",
        Amber => "amber",
        Red => "red",
    }
);

str_enum!(Gender {
    Male => "male",
    Female => "female",
    Unknown => "unknown",
});

impl Default for Gender {
    fn default() -> Self {
        Self::Unknown
    }
}

impl Gender {
    /// Lenient parse for user-supplied values ("M", "Female", "").
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "male" | "m" => Self::Male,
            "female" | "f" => Self::Female,
            _ => Self::Unknown,
        }
    }
}

str_enum!(
    /// Tier of a physical facility in the rural care network.
    FacilityTier {
        Asha => "ASHA",
        Phc => "PHC",
        Chc => "CHC",
        DistrictHospital => "DISTRICT_HOSPITAL",
    }
);

str_enum!(
    /// Care level a patient is routed to. `Emergency` is served by the
    /// ambulance line and the nearest CHC.
    RoutingLevel {
        Asha => "ASHA",
        Phc => "PHC",
        Chc => "CHC",
        Emergency => "EMERGENCY",
    }
);

str_enum!(TriageCategory {
    NonUrgent => "non_urgent",
    SemiUrgent => "semi_urgent",
    Urgent => "urgent",
    Emergency => "emergency",
});

str_enum!(UrgencyLevel {
    Routine => "routine",
    Urgent => "urgent",
    Emergency => "emergency",
    Critical => "critical",
});

str_enum!(Transport {
    Walking => "walking",
    SelfTransport => "self",
    PrivateVehicle => "private_vehicle",
    Ambulance => "ambulance",
});

str_enum!(DiseaseUrgency {
    Routine => "routine",
    Urgent => "urgent",
    Critical => "critical",
});

str_enum!(NotificationTier {
    Routine => "routine",
    Urgent => "urgent",
    Critical => "critical",
});

str_enum!(
    /// Languages with a symptom alias map. Unknown codes fall back to English.
    Language {
        En => "en",
        Hi => "hi",
        Ta => "ta",
        Te => "te",
        Bn => "bn",
        Gu => "gu",
        Mr => "mr",
    }
);

impl Default for Language {
    fn default() -> Self {
        Self::En
    }
}

impl Language {
    pub fn from_code(code: &str) -> Self {
        code.trim().to_lowercase().parse().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn risk_level_round_trips_through_str() {
        for level in [RiskLevel::Green, RiskLevel::Amber, RiskLevel::Red] {
            assert_eq!(RiskLevel::from_str(level.as_str()).unwrap(), level);
        }
    }

    #[test]
    fn invalid_enum_reports_field() {
        match RoutingLevel::from_str("HOSPITAL").unwrap_err() {
            ModelError::InvalidEnum { field, value } => {
                assert_eq!(field, "RoutingLevel");
                assert_eq!(value, "HOSPITAL");
            }
        }
    }

    #[test]
    fn ordering_follows_severity() {
        assert!(RiskLevel::Red > RiskLevel::Amber);
        assert!(TriageCategory::Emergency > TriageCategory::Urgent);
        assert!(UrgencyLevel::Critical > UrgencyLevel::Emergency);
        assert!(RoutingLevel::Emergency > RoutingLevel::Chc);
    }

    #[test]
    fn serde_uses_wire_names() {
        let json = serde_json::to_string(&Transport::SelfTransport).unwrap();
        assert_eq!(json, "\"self\"");
        let level: RoutingLevel = serde_json::from_str("\"EMERGENCY\"").unwrap();
        assert_eq!(level, RoutingLevel::Emergency);
    }

    #[test]
    fn gender_parse_is_lenient() {
        assert_eq!(Gender::parse_lenient(" Female "), Gender::Female);
        assert_eq!(Gender::parse_lenient("M"), Gender::Male);
        assert_eq!(Gender::parse_lenient("other"), Gender::Unknown);
    }

    #[test]
    fn unknown_language_falls_back_to_english() {
        assert_eq!(Language::from_code("HI"), Language::Hi);
        assert_eq!(Language::from_code("fr"), Language::En);
    }
}
