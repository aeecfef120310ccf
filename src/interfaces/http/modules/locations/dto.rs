//! Location DTOs

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::ParkingLocation;

/// Spot count for one category at a location
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryCountDto {
    /// Wire name, e.g. `electric-vehicle`
    pub category: String,
    /// Display label, e.g. `Electric Vehicle`
    pub label: String,
    pub count: i32,
}

/// Parking location as rendered on the map and list views
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LocationDto {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub photo_url: Option<String>,
    pub capacity: i32,
    /// Free spots right now
    pub available: i32,
    pub categories: Vec<CategoryCountDto>,
    pub updated_at: String,
}

impl From<ParkingLocation> for LocationDto {
    fn from(l: ParkingLocation) -> Self {
        Self {
            categories: l
                .category_counts
                .iter()
                .map(|(category, count)| CategoryCountDto {
                    category: category.as_str().to_string(),
                    label: category.label().to_string(),
                    count: *count,
                })
                .collect(),
            id: l.id,
            name: l.name,
            address: l.address,
            latitude: l.coordinates.latitude,
            longitude: l.coordinates.longitude,
            photo_url: l.photo_url,
            capacity: l.capacity,
            available: l.available,
            updated_at: l.updated_at.to_rfc3339(),
        }
    }
}

/// Query parameters for the location list
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LocationQuery {
    /// Only locations offering this spot category (`ev`, `accessible`, ...)
    pub category: Option<String>,
}
