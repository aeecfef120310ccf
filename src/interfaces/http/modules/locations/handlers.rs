//! Location HTTP handlers

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::application::ParkingQueries;
use crate::domain::SpotCategory;
use crate::interfaces::http::common::{ApiResponse, ApiResult};

use super::dto::*;

#[derive(Clone)]
pub struct LocationState {
    pub queries: Arc<ParkingQueries>,
}

#[utoipa::path(
    get,
    path = "/api/v1/locations",
    tag = "Locations",
    params(LocationQuery),
    responses(
        (status = 200, description = "Locations sorted by name", body = ApiResponse<Vec<LocationDto>>),
        (status = 400, description = "Unknown category")
    )
)]
pub async fn list_locations(
    State(state): State<LocationState>,
    Query(query): Query<LocationQuery>,
) -> ApiResult<Vec<LocationDto>> {
    let category = query
        .category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(str::parse::<SpotCategory>)
        .transpose()?;

    let locations = state.queries.list_locations(category).await?;
    Ok(Json(ApiResponse::success(
        locations.into_iter().map(LocationDto::from).collect(),
    )))
}

#[utoipa::path(
    get,
    path = "/api/v1/locations/{location_id}",
    tag = "Locations",
    params(("location_id" = String, Path, description = "Parking location ID")),
    responses(
        (status = 200, description = "Location details", body = ApiResponse<LocationDto>),
        (status = 404, description = "Location not found")
    )
)]
pub async fn get_location(
    State(state): State<LocationState>,
    Path(location_id): Path<String>,
) -> ApiResult<LocationDto> {
    let location = state.queries.get_location(&location_id).await?;
    Ok(Json(ApiResponse::success(location.into())))
}
