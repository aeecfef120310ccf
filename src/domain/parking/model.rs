//! Parking location domain entity

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::shared::DomainError;

/// Classification of a parking spot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SpotCategory {
    Regular,
    #[serde(alias = "ev")]
    ElectricVehicle,
    #[serde(alias = "disabled")]
    Accessible,
    Rideshare,
    Motorcycle,
    Delivery,
    #[serde(alias = "reserved")]
    ReservedInUse,
}

impl SpotCategory {
    pub const ALL: [SpotCategory; 7] = [
        SpotCategory::Regular,
        SpotCategory::ElectricVehicle,
        SpotCategory::Accessible,
        SpotCategory::Rideshare,
        SpotCategory::Motorcycle,
        SpotCategory::Delivery,
        SpotCategory::ReservedInUse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::ElectricVehicle => "electric-vehicle",
            Self::Accessible => "accessible",
            Self::Rideshare => "rideshare",
            Self::Motorcycle => "motorcycle",
            Self::Delivery => "delivery",
            Self::ReservedInUse => "reserved-in-use",
        }
    }

    /// Whether a user may ask for this category. `ReservedInUse` only
    /// describes spots that are already taken.
    pub fn is_reservable(&self) -> bool {
        !matches!(self, Self::ReservedInUse)
    }

    /// Human readable label shown next to the spot count
    pub fn label(&self) -> &'static str {
        match self {
            Self::Regular => "Regular",
            Self::ElectricVehicle => "Electric Vehicle",
            Self::Accessible => "Accessible",
            Self::Rideshare => "Rideshare",
            Self::Motorcycle => "Motorcycle",
            Self::Delivery => "Delivery Zone",
            Self::ReservedInUse => "Reserved (In Use)",
        }
    }
}

impl fmt::Display for SpotCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpotCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "electric-vehicle" | "ev" => Ok(Self::ElectricVehicle),
            "accessible" | "disabled" => Ok(Self::Accessible),
            "rideshare" => Ok(Self::Rideshare),
            "motorcycle" => Ok(Self::Motorcycle),
            "delivery" => Ok(Self::Delivery),
            "reserved-in-use" | "reserved" => Ok(Self::ReservedInUse),
            other => Err(DomainError::Validation(format!(
                "Unknown spot category: {}",
                other
            ))),
        }
    }
}

/// Geographic position, used for display only
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

/// A place with a fixed capacity and a live available-spot counter.
///
/// Seeded externally; only the allocator's commits change `available`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParkingLocation {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub coordinates: Coordinates,
    pub photo_url: Option<String>,
    pub capacity: i32,
    pub available: i32,
    #[serde(default)]
    pub category_counts: BTreeMap<SpotCategory, i32>,
    /// Change counter, bumped on every committed reserve or release
    #[serde(default)]
    pub version: i64,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ParkingLocation {
    /// New location with every spot free.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        coordinates: Coordinates,
        capacity: i32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            address: None,
            coordinates,
            photo_url: None,
            capacity,
            available: capacity,
            category_counts: BTreeMap::new(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_category(mut self, category: SpotCategory, count: i32) -> Self {
        self.category_counts.insert(category, count);
        self
    }

    /// A location matches a category filter when it has at least one spot of it
    pub fn offers(&self, category: SpotCategory) -> bool {
        self.category_counts
            .get(&category)
            .is_some_and(|count| *count > 0)
    }

    /// A location without a category breakdown takes any reservable
    /// category; otherwise the category must be offered.
    pub fn accepts(&self, category: SpotCategory) -> bool {
        category.is_reservable() && (self.category_counts.is_empty() || self.offers(category))
    }

    pub fn has_capacity(&self) -> bool {
        self.available > 0
    }

    /// Checks `0 <= available <= capacity` and non-negative category counts.
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.id.trim().is_empty() {
            return Err(DomainError::Validation("location id must not be empty".into()));
        }
        if self.capacity < 0 {
            return Err(DomainError::Validation(format!(
                "location {}: capacity must be >= 0",
                self.id
            )));
        }
        if self.available < 0 || self.available > self.capacity {
            return Err(DomainError::Validation(format!(
                "location {}: available {} outside [0, {}]",
                self.id, self.available, self.capacity
            )));
        }
        if let Some((category, count)) = self.category_counts.iter().find(|(_, c)| **c < 0) {
            return Err(DomainError::Validation(format!(
                "location {}: negative count {} for {}",
                self.id, count, category
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sarajevo() -> Coordinates {
        Coordinates {
            latitude: 43.8563,
            longitude: 18.4131,
        }
    }

    #[test]
    fn new_location_is_fully_available() {
        let loc = ParkingLocation::new("P1", "Marijin Dvor", sarajevo(), 3);
        assert_eq!(loc.available, 3);
        assert!(loc.has_capacity());
        assert!(loc.validate().is_ok());
    }

    #[test]
    fn accepts_follows_category_breakdown() {
        let open = ParkingLocation::new("P1", "Skenderija", sarajevo(), 10);
        assert!(open.accepts(SpotCategory::Accessible));
        assert!(!open.accepts(SpotCategory::ReservedInUse));

        let listed = ParkingLocation::new("P2", "Ferhadija", sarajevo(), 10)
            .with_category(SpotCategory::Regular, 8)
            .with_category(SpotCategory::ReservedInUse, 2);
        assert!(listed.accepts(SpotCategory::Regular));
        assert!(!listed.accepts(SpotCategory::ElectricVehicle));
        assert!(!listed.accepts(SpotCategory::ReservedInUse));
    }

    #[test]
    fn offers_requires_positive_count() {
        let loc = ParkingLocation::new("P1", "Skenderija", sarajevo(), 10)
            .with_category(SpotCategory::ElectricVehicle, 2)
            .with_category(SpotCategory::Motorcycle, 0);
        assert!(loc.offers(SpotCategory::ElectricVehicle));
        assert!(!loc.offers(SpotCategory::Motorcycle));
        assert!(!loc.offers(SpotCategory::Accessible));
    }

    #[test]
    fn validate_rejects_available_above_capacity() {
        let mut loc = ParkingLocation::new("P1", "Bascarsija", sarajevo(), 2);
        loc.available = 3;
        assert!(matches!(loc.validate(), Err(DomainError::Validation(_))));
        loc.available = -1;
        assert!(loc.validate().is_err());
    }

    #[test]
    fn category_parses_wire_and_legacy_names() {
        assert_eq!("electric-vehicle".parse::<SpotCategory>().unwrap(), SpotCategory::ElectricVehicle);
        assert_eq!("ev".parse::<SpotCategory>().unwrap(), SpotCategory::ElectricVehicle);
        assert_eq!("disabled".parse::<SpotCategory>().unwrap(), SpotCategory::Accessible);
        assert_eq!("Reserved".parse::<SpotCategory>().unwrap(), SpotCategory::ReservedInUse);
        assert!("helipad".parse::<SpotCategory>().is_err());
    }

    #[test]
    fn category_serde_uses_kebab_case() {
        let json = serde_json::to_string(&SpotCategory::ReservedInUse).unwrap();
        assert_eq!(json, "\"reserved-in-use\"");
        let parsed: SpotCategory = serde_json::from_str("\"ev\"").unwrap();
        assert_eq!(parsed, SpotCategory::ElectricVehicle);
        for category in SpotCategory::ALL {
            assert_eq!(category.as_str().parse::<SpotCategory>().unwrap(), category);
        }
    }

    #[test]
    fn labels_match_display_names() {
        assert_eq!(SpotCategory::Delivery.label(), "Delivery Zone");
        assert_eq!(SpotCategory::ReservedInUse.label(), "Reserved (In Use)");
    }
}
