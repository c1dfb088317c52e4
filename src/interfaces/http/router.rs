//! API Router with Swagger UI

use axum::{
    extract::FromRef,
    middleware,
    routing::{get, patch, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::ParkingCore;
use crate::infrastructure::crypto::JwtConfig;
use crate::interfaces::http::common::{ApiResponse, EmptyData};
use crate::interfaces::http::middleware::{auth_middleware, AuthState};
use crate::interfaces::http::modules::{health, metrics, parkings, reservations, spaces};

/// State shared by the `/api/v1` routes. Handlers pick their part via `FromRef`.
#[derive(Clone)]
pub struct ApiState {
    pub core: ParkingCore,
    pub auth: AuthState,
}

impl FromRef<ApiState> for ParkingCore {
    fn from_ref(s: &ApiState) -> Self {
        s.core.clone()
    }
}

impl FromRef<ApiState> for AuthState {
    fn from_ref(s: &ApiState) -> Self {
        s.auth.clone()
    }
}

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token carrying `sub` and `role`"))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        // Parkings
        parkings::register_parking,
        parkings::search_parkings,
        parkings::list_my_parkings,
        parkings::get_parking,
        parkings::update_parking,
        parkings::delete_parking,
        parkings::deactivate_parking,
        parkings::reactivate_parking,
        // Spaces
        spaces::suggest_distribution,
        spaces::configure_spaces,
        spaces::list_spaces,
        spaces::set_maintenance,
        // Reservations
        reservations::create_reservation,
        reservations::list_my_reservations,
        reservations::list_parking_reservations,
        reservations::get_reservation,
        reservations::transition_reservation,
    ),
    components(
        schemas(
            // Common
            ApiResponse<String>,
            EmptyData,
            health::HealthResponse,
            health::ComponentHealth,
            // Parkings
            parkings::RegisterParkingRequest,
            parkings::UpdateParkingRequest,
            parkings::ParkingLotDto,
            parkings::SearchHitDto,
            // Spaces
            spaces::SpaceDto,
            spaces::AllocationDto,
            spaces::ConfigureSpacesRequest,
            spaces::SpaceConfigurationDto,
            spaces::OccupancyDto,
            spaces::SpaceListDto,
            spaces::MaintenanceRequest,
            // Reservations
            reservations::CreateReservationRequest,
            reservations::ReservationDto,
            reservations::ReservationAction,
            reservations::ReservationActionRequest,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Server health check endpoints"),
        (name = "Parkings", description = "Parking lot registration, lifecycle and availability search"),
        (name = "Spaces", description = "Space layout of a lot and maintenance toggles"),
        (name = "Reservations", description = "Reserving spaces: create, confirm, release, cancel"),
    ),
    info(
        title = "ParkeoYa Parking API",
        version = "1.0.0",
        description = "REST API for parking lot owners and drivers",
        license(name = "MIT")
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes
pub fn create_api_router(
    core: ParkingCore,
    jwt_config: JwtConfig,
    health_state: health::HealthState,
    metrics_handle: Option<PrometheusHandle>,
) -> Router {
    let auth = AuthState { jwt_config };
    let state = ApiState {
        core,
        auth: auth.clone(),
    };

    // Every route resolves an optional bearer token; handlers that need a
    // caller take the `Authenticated` extractor.
    let api_routes = Router::new()
        .route(
            "/parkings",
            post(parkings::register_parking).get(parkings::search_parkings),
        )
        .route("/parkings/mine", get(parkings::list_my_parkings))
        .route(
            "/parkings/{parking_id}",
            get(parkings::get_parking)
                .patch(parkings::update_parking)
                .delete(parkings::delete_parking),
        )
        .route(
            "/parkings/{parking_id}/deactivate",
            post(parkings::deactivate_parking),
        )
        .route(
            "/parkings/{parking_id}/reactivate",
            post(parkings::reactivate_parking),
        )
        .route("/parkings/{parking_id}/spaces", get(spaces::list_spaces))
        .route(
            "/parkings/{parking_id}/spaces/suggestion",
            get(spaces::suggest_distribution),
        )
        .route(
            "/parkings/{parking_id}/spaces/config",
            post(spaces::configure_spaces),
        )
        .route(
            "/parkings/{parking_id}/reservations",
            get(reservations::list_parking_reservations),
        )
        .route(
            "/spaces/{space_id}/maintenance",
            patch(spaces::set_maintenance),
        )
        .route(
            "/spaces/{space_id}/reservations",
            post(reservations::create_reservation),
        )
        .route(
            "/reservations/mine",
            get(reservations::list_my_reservations),
        )
        .route(
            "/reservations/{reservation_id}",
            get(reservations::get_reservation).patch(reservations::transition_reservation),
        )
        .layer(middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health_state);

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        // Swagger UI
        .merge(swagger_routes)
        // Health
        .merge(health_routes)
        // API
        .nest("/api/v1", api_routes);

    if let Some(handle) = metrics_handle {
        router = router.merge(
            Router::new()
                .route("/metrics", get(metrics::prometheus_metrics))
                .with_state(metrics::MetricsState { handle }),
        );
    }

    router
        // Middleware
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::application::{CoreSettings, SpaceTypeRegistry};
    use crate::domain::Role;
    use crate::infrastructure::crypto::create_token;
    use crate::infrastructure::storage::InMemoryRepositoryProvider;

    fn app() -> (Router, JwtConfig) {
        let core = ParkingCore::new(
            Arc::new(InMemoryRepositoryProvider::new()),
            SpaceTypeRegistry::default(),
            CoreSettings::default(),
        );
        let jwt = JwtConfig::new("router-test-secret", "parkeoya");
        let health = health::HealthState {
            db: None,
            started_at: Arc::new(Instant::now()),
        };
        (create_api_router(core, jwt.clone(), health, None), jwt)
    }

    fn bearer(jwt: &JwtConfig, subject: &str, role: Role) -> String {
        format!("Bearer {}", create_token(subject, role, jwt).unwrap())
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        auth: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn lot_body(address: &str, capacity: u32) -> Value {
        json!({
            "name": "Estacionamiento Central",
            "address": address,
            "province": "Lima",
            "district": "Miraflores",
            "total_capacity": capacity,
            "hourly_rate": {"kind": "flat", "cents": 500}
        })
    }

    #[tokio::test]
    async fn health_reports_memory_backend() {
        let (app, _) = app();
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["database"]["backend"], "memory");
    }

    #[tokio::test]
    async fn openapi_document_is_served() {
        let (app, _) = app();
        let (status, body) = send(&app, "GET", "/api-doc/openapi.json", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["paths"]["/api/v1/parkings"].is_object());
    }

    #[tokio::test]
    async fn register_requires_an_owner_token() {
        let (app, jwt) = app();

        let (status, _) = send(&app, "POST", "/api/v1/parkings", None, Some(lot_body("Av. Larco 123", 4))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let driver = bearer(&jwt, "driver-1", Role::Driver);
        let (status, _) = send(
            &app,
            "POST",
            "/api/v1/parkings",
            Some(&driver),
            Some(lot_body("Av. Larco 123", 4)),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "GET",
            "/api/v1/parkings",
            Some("Bearer not-a-jwt"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn duplicate_address_conflicts() {
        let (app, jwt) = app();
        let owner = bearer(&jwt, "owner-1", Role::Owner);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/parkings",
            Some(&owner),
            Some(lot_body("Av. Larco 123", 4)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "Draft");

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/parkings",
            Some(&owner),
            Some(lot_body("  av. larco 123 ", 4)),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn only_the_owner_can_update() {
        let (app, jwt) = app();
        let owner = bearer(&jwt, "owner-1", Role::Owner);
        let other = bearer(&jwt, "owner-2", Role::Owner);

        let (_, body) = send(
            &app,
            "POST",
            "/api/v1/parkings",
            Some(&owner),
            Some(lot_body("Av. Larco 123", 4)),
        )
        .await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let uri = format!("/api/v1/parkings/{id}");

        let (status, _) = send(&app, "PATCH", &uri, Some(&other), Some(json!({"name": "Mio"}))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "PATCH", &uri, Some(&owner), Some(json!({"name": "Nuevo"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["name"], "Nuevo");

        let (status, _) = send(&app, "GET", "/api/v1/parkings/not-a-uuid", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn owner_configures_and_driver_reserves() {
        let (app, jwt) = app();
        let owner = bearer(&jwt, "owner-1", Role::Owner);
        let driver = bearer(&jwt, "driver-1", Role::Driver);
        let rival = bearer(&jwt, "driver-2", Role::Driver);

        let (_, body) = send(
            &app,
            "POST",
            "/api/v1/parkings",
            Some(&owner),
            Some(lot_body("Av. Larco 123", 2)),
        )
        .await;
        let lot_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/parkings/{lot_id}/spaces/config"),
            Some(&owner),
            Some(json!({"counts": {"regular": 2}})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["parking"]["status"], "Active");
        let space_id = body["data"]["spaces"][0]["id"].as_str().unwrap().to_string();

        // anyone can look at the layout and search
        let (status, body) = send(&app, "GET", &format!("/api/v1/parkings/{lot_id}/spaces"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["occupancy"]["available"], 2);
        let (_, body) = send(&app, "GET", "/api/v1/parkings?province=lima", None, None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let reserve_uri = format!("/api/v1/spaces/{space_id}/reservations");
        let (status, body) = send(&app, "POST", &reserve_uri, Some(&driver), Some(json!({}))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["status"], "Pending");
        let reservation_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "POST", &reserve_uri, Some(&rival), Some(json!({}))).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, body) = send(&app, "GET", "/api/v1/reservations/mine", Some(&driver), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let uri = format!("/api/v1/reservations/{reservation_id}");
        let (status, _) = send(&app, "GET", &uri, Some(&rival), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "PATCH", &uri, Some(&owner), Some(json!({"action": "confirm"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "Active");

        let (status, _) = send(&app, "PATCH", &uri, Some(&driver), Some(json!({"action": "confirm"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "PATCH", &uri, Some(&driver), Some(json!({"action": "release"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "Completed");

        let (_, body) = send(&app, "GET", &format!("/api/v1/parkings/{lot_id}/spaces"), None, None).await;
        assert_eq!(body["data"]["occupancy"]["available"], 2);

        let (status, body) =
            send(&app, "GET", "/api/v1/reservations/mine?status=completed", Some(&driver), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        let (_, body) = send(&app, "GET", "/api/v1/reservations/mine?status=Pending", Some(&driver), None).await;
        assert!(body["data"].as_array().unwrap().is_empty());
        let (status, _) = send(&app, "GET", "/api/v1/reservations/mine?status=expired", Some(&driver), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn configuration_must_match_capacity() {
        let (app, jwt) = app();
        let owner = bearer(&jwt, "owner-1", Role::Owner);
        let (_, body) = send(
            &app,
            "POST",
            "/api/v1/parkings",
            Some(&owner),
            Some(lot_body("Av. Larco 123", 10)),
        )
        .await;
        let lot_id = body["data"]["id"].as_str().unwrap().to_string();

        let (status, body) = send(
            &app,
            "GET",
            &format!("/api/v1/parkings/{lot_id}/spaces/suggestion"),
            Some(&owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 10);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/parkings/{lot_id}/spaces/config"),
            Some(&owner),
            Some(json!({"counts": {"regular": 7}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/v1/parkings/{lot_id}/spaces/config"),
            Some(&owner),
            Some(json!({"counts": {"regular": u32::MAX, "compact": 11}})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "GET", &format!("/api/v1/parkings/{lot_id}/spaces"), None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["occupancy"]["total"], 0);
    }
}
