//! API router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use super::modules::health::{self, HealthState};
use super::modules::locations::{self, LocationState};
use super::modules::metrics::{http_metrics_middleware, prometheus_metrics, MetricsState};
use super::modules::request_id::request_id_middleware;
use super::modules::reservations::{self, ReservationState};
use crate::application::{ParkingQueries, ReservationAllocator};
use crate::interfaces::ws::{ws_events_handler, NotificationState};
use crate::notifications::SharedEventBus;

/// Everything the handlers need; each handler extracts its own slice via `FromRef`.
#[derive(Clone)]
pub struct ApiState {
    pub allocator: Arc<ReservationAllocator>,
    pub queries: Arc<ParkingQueries>,
    pub event_bus: SharedEventBus,
    pub default_duration: chrono::Duration,
    pub started_at: Arc<Instant>,
}

impl FromRef<ApiState> for LocationState {
    fn from_ref(s: &ApiState) -> Self {
        LocationState {
            queries: Arc::clone(&s.queries),
        }
    }
}

impl FromRef<ApiState> for ReservationState {
    fn from_ref(s: &ApiState) -> Self {
        ReservationState {
            allocator: Arc::clone(&s.allocator),
            queries: Arc::clone(&s.queries),
            default_duration: s.default_duration,
        }
    }
}

impl FromRef<ApiState> for HealthState {
    fn from_ref(s: &ApiState) -> Self {
        HealthState {
            queries: Arc::clone(&s.queries),
            started_at: Arc::clone(&s.started_at),
        }
    }
}

impl FromRef<ApiState> for NotificationState {
    fn from_ref(s: &ApiState) -> Self {
        NotificationState {
            event_bus: s.event_bus.clone(),
        }
    }
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "user_id",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "X-User-Id",
                    "Authenticated user id forwarded by the identity gateway",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        locations::list_locations,
        locations::get_location,
        reservations::create_reservation,
        reservations::get_active_reservation,
        reservations::get_reservation,
        reservations::cancel_reservation,
    ),
    components(
        schemas(
            health::HealthResponse,
            health::ComponentHealth,
            locations::LocationDto,
            locations::CategoryCountDto,
            reservations::CreateReservationRequest,
            reservations::ReservationDto,
            reservations::ActiveReservationDto,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and storage reachability"),
        (name = "Locations", description = "Parking locations with live free-spot counts. Filter by spot category with `?category=` (`regular`, `electric-vehicle`, `accessible`, `rideshare`, `motorcycle`, `delivery`, `reserved-in-use`; `ev`, `disabled` and `reserved` are accepted too)."),
        (name = "Reservations", description = "Claim, inspect and cancel a spot. A user holds at most one active reservation; it is released when cancelled or when `expires_at` passes. Live changes are pushed on `ws://host:port/ws/events`, filterable by `location_id` and `event_types`."),
    ),
    info(
        title = "Parkiraj Reservation API",
        version = "1.0.0",
        description = "Parking spot reservations with an exact per-location capacity counter.

All responses use the envelope `{\"success\": bool, \"data\": ..., \"error\": \"...\"}`.
Callers are identified by the `X-User-Id` header set by the identity gateway."
    )
)]
pub struct ApiDoc;

/// Build the HTTP router. `/metrics` is mounted only when a Prometheus handle is given.
pub fn create_api_router(state: ApiState, metrics: Option<PrometheusHandle>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/locations", get(locations::list_locations))
        .route("/api/v1/locations/{location_id}", get(locations::get_location))
        .route("/api/v1/reservations", post(reservations::create_reservation))
        .route(
            "/api/v1/reservations/active",
            get(reservations::get_active_reservation),
        )
        .route(
            "/api/v1/reservations/{reservation_id}",
            get(reservations::get_reservation).delete(reservations::cancel_reservation),
        )
        .route("/ws/events", get(ws_events_handler))
        .with_state(state);

    let mut router = Router::new()
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_routes);

    if let Some(handle) = metrics {
        router = router.merge(
            Router::new()
                .route("/metrics", get(prometheus_metrics))
                .with_state(MetricsState { handle }),
        );
    }

    router
        .layer(middleware::from_fn(http_metrics_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ParkingQueries;
    use crate::domain::{Coordinates, ParkingLocation, ReservationStore, SpotCategory};
    use crate::infrastructure::InMemoryReservationStore;
    use crate::interfaces::http::common::USER_ID_HEADER;
    use crate::notifications::create_event_bus;
    use crate::shared::ManualClock;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use chrono::Utc;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn app() -> Router {
        let store = Arc::new(InMemoryReservationStore::new());
        let coords = Coordinates {
            latitude: 43.8563,
            longitude: 18.4131,
        };
        store
            .seed_location(
                ParkingLocation::new("P2", "Skenderija", coords, 2)
                    .with_category(SpotCategory::Regular, 1)
                    .with_category(SpotCategory::ElectricVehicle, 1),
            )
            .await
            .unwrap();
        store
            .seed_location(
                ParkingLocation::new("P1", "Ferhadija", coords, 1)
                    .with_category(SpotCategory::Regular, 1),
            )
            .await
            .unwrap();

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let event_bus = create_event_bus();
        let allocator = Arc::new(
            ReservationAllocator::new(store.clone(), clock.clone()).with_event_bus(event_bus.clone()),
        );
        let queries = Arc::new(ParkingQueries::new(store, clock));

        create_api_router(
            ApiState {
                allocator,
                queries,
                event_bus,
                default_duration: chrono::Duration::minutes(10),
                started_at: Arc::new(Instant::now()),
            },
            None,
        )
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        user: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user) = user {
            builder = builder.header(USER_ID_HEADER, user);
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["storage"]["locations"], 2);
    }

    #[tokio::test]
    async fn locations_sorted_and_filtered() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/api/v1/locations", None, None).await;
        assert_eq!(status, StatusCode::OK);
        let names: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["Ferhadija", "Skenderija"]);

        let (_, body) = send(&app, "GET", "/api/v1/locations?category=ev", None, None).await;
        let ids: Vec<_> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| l["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["P2"]);

        let (status, _) = send(&app, "GET", "/api/v1/locations?category=yacht", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_location_is_404() {
        let app = app().await;
        let (status, body) = send(&app, "GET", "/api/v1/locations/P9", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn reserving_requires_identity() {
        let app = app().await;
        let body = json!({"location_id": "P1", "spot_category": "regular"});
        let (status, _) = send(&app, "POST", "/api/v1/reservations", None, Some(body)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn reserve_view_and_conflicts() {
        let app = app().await;
        let body = json!({"location_id": "P1", "spot_category": "regular"});

        let (status, created) =
            send(&app, "POST", "/api/v1/reservations", Some("amra"), Some(body.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["status"], "active");
        assert_eq!(created["data"]["location_id"], "P1");

        let (_, loc) = send(&app, "GET", "/api/v1/locations/P1", None, None).await;
        assert_eq!(loc["data"]["available"], 0);

        let (status, active) =
            send(&app, "GET", "/api/v1/reservations/active", Some("amra"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(active["data"]["countdown"], "10m 0s");
        assert_eq!(active["data"]["location_name"], "Ferhadija");

        // same user, second reservation
        let other = json!({"location_id": "P2", "spot_category": "ev"});
        let (status, _) = send(&app, "POST", "/api/v1/reservations", Some("amra"), Some(other)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        // location full
        let (status, body) =
            send(&app, "POST", "/api/v1/reservations", Some("haris"), Some(body)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(body["error"].as_str().unwrap().contains("No capacity"));
    }

    #[tokio::test]
    async fn only_owner_can_cancel_and_cancel_is_idempotent() {
        let app = app().await;
        let body = json!({"location_id": "P1", "spot_category": "regular", "duration_minutes": 30});
        let (_, created) = send(&app, "POST", "/api/v1/reservations", Some("amra"), Some(body)).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/reservations/{}", id);

        let (status, _) = send(&app, "DELETE", &uri, Some("haris"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, cancelled) = send(&app, "DELETE", &uri, Some("amra"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cancelled["data"]["status"], "released");
        assert_eq!(cancelled["data"]["release_reason"], "cancelled");

        let (status, _) = send(&app, "DELETE", &uri, Some("amra"), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, loc) = send(&app, "GET", "/api/v1/locations/P1", None, None).await;
        assert_eq!(loc["data"]["available"], 1);

        let (_, active) = send(&app, "GET", "/api/v1/reservations/active", Some("amra"), None).await;
        assert!(active["data"].is_null());

        let (status, _) =
            send(&app, "DELETE", "/api/v1/reservations/missing", Some("amra"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unreservable_categories_are_rejected() {
        let app = app().await;

        let in_use = json!({"location_id": "P2", "spot_category": "reserved"});
        let (status, body) = send(&app, "POST", "/api/v1/reservations", Some("amra"), Some(in_use)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let not_offered = json!({"location_id": "P1", "spot_category": "ev"});
        let (status, _) =
            send(&app, "POST", "/api/v1/reservations", Some("amra"), Some(not_offered)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (_, loc) = send(&app, "GET", "/api/v1/locations/P1", None, None).await;
        assert_eq!(loc["data"]["available"], 1);
        let (_, active) = send(&app, "GET", "/api/v1/reservations/active", Some("amra"), None).await;
        assert!(active["data"].is_null());
    }

    #[tokio::test]
    async fn reservation_lookup_is_owner_only() {
        let app = app().await;
        let body = json!({"location_id": "P1", "spot_category": "regular"});
        let (_, created) = send(&app, "POST", "/api/v1/reservations", Some("amra"), Some(body)).await;
        let id = created["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/reservations/{}", id);

        let (status, fetched) = send(&app, "GET", &uri, Some("amra"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["data"]["id"], id.as_str());

        let (status, _) = send(&app, "GET", &uri, Some("haris"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, "GET", "/api/v1/reservations/missing", Some("amra"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn bad_reservation_bodies_are_rejected() {
        let app = app().await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/reservations",
            Some("amra"),
            Some(json!({"location_id": "", "spot_category": "regular"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/reservations",
            Some("amra"),
            Some(json!({"location_id": "P1", "spot_category": "hovercraft"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/reservations",
            Some("amra"),
            Some(json!({
                "location_id": "P1",
                "spot_category": "regular",
                "duration_minutes": 5,
                "expires_at": "2030-01-01T00:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/reservations",
            Some("amra"),
            Some(json!({
                "location_id": "P1",
                "spot_category": "regular",
                "expires_at": "2000-01-01T00:00:00Z"
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn request_id_is_echoed() {
        let app = app().await;
        let response = app
            .oneshot(
                Request::get("/health")
                    .header("x-request-id", "abc-123")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()["x-request-id"], "abc-123");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let app = app().await;
        let (status, doc) = send(&app, "GET", "/api-docs/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(doc["paths"]["/api/v1/reservations"].is_object());
    }
}
