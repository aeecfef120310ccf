//! Seeding parking locations from a JSON file
//!
//! Locations are owned by whoever operates the lots; the service only
//! inserts the ones it does not know yet.
//!
//! ```json
//! [
//!   {
//!     "id": "marijin-dvor",
//!     "name": "Marijin Dvor",
//!     "latitude": 43.8563,
//!     "longitude": 18.4131,
//!     "capacity": 40,
//!     "categories": { "regular": 34, "ev": 4, "accessible": 2 }
//!   }
//! ]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::domain::{Coordinates, DomainResult, ParkingLocation, ReservationStore, SpotCategory};
use crate::shared::InfraError;

#[derive(Debug, Clone, Deserialize)]
pub struct SeedLocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub photo_url: Option<String>,
    pub capacity: i32,
    /// Defaults to `capacity`
    #[serde(default)]
    pub available: Option<i32>,
    #[serde(default)]
    pub categories: BTreeMap<SpotCategory, i32>,
}

impl From<SeedLocation> for ParkingLocation {
    fn from(seed: SeedLocation) -> Self {
        let mut location = ParkingLocation::new(
            seed.id,
            seed.name,
            Coordinates {
                latitude: seed.latitude,
                longitude: seed.longitude,
            },
            seed.capacity,
        );
        location.address = seed.address;
        location.photo_url = seed.photo_url;
        location.available = seed.available.unwrap_or(seed.capacity);
        location.category_counts = seed.categories;
        location
    }
}

pub fn parse_seed(json: &str) -> Result<Vec<ParkingLocation>, InfraError> {
    let seeds: Vec<SeedLocation> = serde_json::from_str(json)?;
    Ok(seeds.into_iter().map(ParkingLocation::from).collect())
}

pub fn load_seed_file(path: &Path) -> Result<Vec<ParkingLocation>, InfraError> {
    let content = std::fs::read_to_string(path)?;
    parse_seed(&content)
}

/// Inserts every unknown location; returns how many were new.
pub async fn seed_locations(
    store: &dyn ReservationStore,
    locations: Vec<ParkingLocation>,
) -> DomainResult<usize> {
    let total = locations.len();
    let mut inserted = 0;
    for location in locations {
        if store.seed_location(location).await? {
            inserted += 1;
        }
    }
    info!(inserted, total, "Parking locations seeded");
    Ok(inserted)
}
