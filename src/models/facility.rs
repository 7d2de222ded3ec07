use serde::{Deserialize, Serialize};

use super::enums::FacilityTier;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacilityLocation {
    pub village: String,
    pub district: String,
    pub state: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub emergency: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthcareFacility {
    pub id: String,
    pub name: String,
    #[serde(rename = "level")]
    pub tier: FacilityTier,
    pub location: FacilityLocation,
    #[serde(default)]
    pub services: Vec<String>,
    pub capacity: u32,
    pub current_load: u32,
    #[serde(default)]
    pub contact: ContactInfo,
    #[serde(default)]
    pub available_medicines: Vec<String>,
    #[serde(default)]
    pub specialist_doctors: Vec<String>,
}

impl HealthcareFacility {
    /// Fraction of capacity in use, 0 when capacity is unknown.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.0;
        }
        f64::from(self.current_load) / f64::from(self.capacity)
    }

    /// Numbers a patient can call, emergency line first.
    pub fn contact_numbers(&self) -> Vec<String> {
        [&self.contact.emergency, &self.contact.phone, &self.contact.whatsapp]
            .into_iter()
            .flatten()
            .fold(Vec::new(), |mut acc, n| {
                if !acc.contains(n) {
                    acc.push(n.clone());
                }
                acc
            })
    }
}
