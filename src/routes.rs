use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{self, AppState};
use crate::openapi::ApiDoc;
use crate::webhook_handler;

/// Largest accepted request body (1 MiB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Every `/api` route. `main` adds rate limiting on top; tests drive the
/// router without it.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/test", get(handlers::server_test))
        .route("/api/events/discover", get(handlers::discover_events))
        // Vendor bookings
        .route(
            "/api/v1/vendor/bookings",
            get(handlers::list_bookings).post(handlers::create_booking),
        )
        .route("/api/v1/vendor/bookings/:id", get(handlers::get_booking))
        .route(
            "/api/v1/vendor/bookings/:id/payments",
            post(handlers::create_payment),
        )
        .route(
            "/api/v1/vendor/bookings/:id/reschedule",
            post(handlers::reschedule_booking),
        )
        .route(
            "/api/v1/vendor/bookings/:id/cancel",
            post(handlers::cancel_booking),
        )
        .route(
            "/api/v1/vendor/bookings/:id/cancellation-estimate",
            get(handlers::cancellation_estimate),
        )
        .route(
            "/api/v1/vendors/:vendor_id/availability",
            get(handlers::vendor_availability),
        )
        // Onboarding portal
        .route(
            "/api/v1/vendor/onboarding-portal",
            get(handlers::list_onboarding_portals).post(handlers::create_onboarding_portal),
        )
        .route(
            "/api/v1/vendor/onboarding-portal/:id",
            get(handlers::get_onboarding_portal).put(handlers::update_onboarding_portal),
        )
        // Payment provider webhook
        .route(
            "/api/v1/webhooks/payments",
            post(webhook_handler::payment_webhook),
        )
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
}

/// Final app: health check and docs (outside `api`'s layers), the API
/// routes, tracing and CORS.
pub fn build_router(state: Arc<AppState>, api: Router<Arc<AppState>>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
