use crate::catalog::{self, DiscoverEvent, DiscoverQuery};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use crate::onboarding::{OnboardingPortal, OnboardingPortalInput};
use crate::pagination::{PageQuery, PageRequest, ResponseList};
use crate::request_guard::InFlightGuard;
use crate::services::BookingService;
use crate::validation::parse_date;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use utoipa::IntoParams;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Booking flows over the configured repositories and payment gateway.
    pub service: BookingService,
    /// Rejects concurrent mutations of the same booking.
    pub guard: InFlightGuard,
}

/// Days shown by the availability endpoint when `date_to` is omitted.
const DEFAULT_AVAILABILITY_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookingListQuery {
    /// Vendor whose bookings to list. Falls back to the `X-User-Id` header.
    pub vendor_id: Option<i64>,
    /// `pending`, `confirmed` or `cancelled`
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct OnboardingListQuery {
    pub vendor_id: Option<i64>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AvailabilityQuery {
    /// `YYYY-MM-DD`, defaults to today.
    pub date_from: Option<String>,
    /// `YYYY-MM-DD`, defaults to 30 days after `date_from`.
    pub date_to: Option<String>,
}

/// Health check endpoint.
///
/// Returns the service status and version.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "vendor-bookings-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/test
#[utoipa::path(get, path = "/api/test", tag = "system",
    responses((status = 200, description = "Server is up")))]
pub async fn server_test() -> Json<serde_json::Value> {
    Json(json!({ "message": "Server running" }))
}

/// Resolves the vendor whose bookings are listed: the query parameter, else
/// the authenticated user from `X-User-Id`.
fn vendor_scope(query_vendor: Option<i64>, headers: &HeaderMap) -> Result<i64, AppError> {
    if let Some(vendor_id) = query_vendor {
        return Ok(vendor_id);
    }

    let raw = headers
        .get("X-User-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| {
            AppError::Unauthorized("vendor_id or X-User-Id header is required".to_string())
        })?;

    raw.parse()
        .map_err(|_| AppError::Unauthorized(format!("Invalid X-User-Id header '{}'", raw)))
}

/// GET /api/v1/vendor/bookings
///
/// Paginated bookings of one vendor, newest first. Each item carries the
/// actions the client may offer and its formatted amount.
#[utoipa::path(
    get,
    path = "/api/v1/vendor/bookings",
    tag = "bookings",
    params(
        BookingListQuery,
        ("X-User-Id" = Option<i64>, Header, description = "Authenticated vendor, used when vendor_id is absent")
    ),
    responses(
        (status = 200, description = "Page of bookings", body = BookingList),
        (status = 400, description = "Unknown status filter", body = ErrorMessage),
        (status = 401, description = "No vendor to scope the list to", body = ErrorMessage)
    )
)]
pub async fn list_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<BookingListQuery>,
) -> Result<Json<ResponseList<BookingView>>, AppError> {
    tracing::info!("GET /vendor/bookings - params: {:?}", params);

    let vendor_id = vendor_scope(params.vendor_id, &headers)?;
    let status = params
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<BookingStatus>().map_err(AppError::BadRequest))
        .transpose()?;

    let page = PageRequest::from_query(
        PageQuery {
            page: params.page,
            limit: params.limit,
        },
        state.config.default_page_limit,
    );
    let filter = BookingFilter {
        vendor_id: Some(vendor_id),
        status,
    };

    let list = state
        .service
        .list_bookings(&filter, page)
        .await
        .context("Failed to fetch bookings")?;

    Ok(Json(list))
}

/// GET /api/v1/vendor/bookings/:id
#[utoipa::path(
    get,
    path = "/api/v1/vendor/bookings/{id}",
    tag = "bookings",
    params(("id" = i64, Path, description = "Vendor booking id")),
    responses(
        (status = 200, description = "The booking", body = BookingView),
        (status = 404, description = "No such booking", body = ErrorMessage)
    )
)]
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<BookingView>, AppError> {
    tracing::info!("GET /vendor/bookings/{}", id);

    let booking = state.service.get_booking(id).await?;
    Ok(Json(BookingView::from(booking)))
}

/// POST /api/v1/vendor/bookings
///
/// Creates a `pending` booking once the schedule is valid and the vendor is
/// free for it.
#[utoipa::path(
    post,
    path = "/api/v1/vendor/bookings",
    tag = "bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Booking created", body = BookingView),
        (status = 400, description = "Invalid schedule or amount", body = ErrorMessage),
        (status = 409, description = "Vendor already booked for the slot", body = ErrorMessage)
    )
)]
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingView>), AppError> {
    tracing::info!(
        "POST /vendor/bookings - vendor {} on {}",
        request.vendor_id,
        request.date_start
    );

    let booking = state
        .service
        .create_booking(request)
        .await
        .context("Failed to create booking")?;

    Ok((StatusCode::CREATED, Json(BookingView::from(booking))))
}

/// POST /api/v1/vendor/bookings/:id/payments
///
/// Charges a pending booking, or with `billing_details: "RescheduleBooking"`
/// the reschedule fee of a confirmed one.
#[utoipa::path(
    post,
    path = "/api/v1/vendor/bookings/{id}/payments",
    tag = "bookings",
    params(("id" = i64, Path, description = "Vendor booking id")),
    request_body = CreatePaymentRequest,
    responses(
        (status = 200, description = "Payment created", body = PaymentResponse),
        (status = 400, description = "Missing vendor, bad method or amount", body = ErrorMessage),
        (status = 404, description = "No such booking", body = ErrorMessage),
        (status = 409, description = "Booking not payable in its status", body = ErrorMessage),
        (status = 502, description = "Payment provider failed", body = ErrorMessage)
    )
)]
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    tracing::info!(
        "POST /vendor/bookings/{}/payments - method {}, billing {:?}",
        id,
        request.payment_method_id,
        request.billing_details
    );

    let response = state
        .guard
        .run(id, state.service.pay(id, request))
        .await
        .context("Failed to process payment")?;

    Ok(Json(response))
}

/// POST /api/v1/vendor/bookings/:id/reschedule
#[utoipa::path(
    post,
    path = "/api/v1/vendor/bookings/{id}/reschedule",
    tag = "bookings",
    params(("id" = i64, Path, description = "Vendor booking id")),
    request_body = RescheduleRequest,
    responses(
        (status = 200, description = "Booking moved", body = RescheduleResponse),
        (status = 400, description = "Invalid schedule", body = ErrorMessage),
        (status = 402, description = "Reschedule fee not paid", body = ErrorMessage),
        (status = 404, description = "No such booking", body = ErrorMessage),
        (status = 409, description = "Not confirmed, or slot taken", body = ErrorMessage)
    )
)]
pub async fn reschedule_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<RescheduleResponse>, AppError> {
    tracing::info!(
        "POST /vendor/bookings/{}/reschedule - to {} {}-{}",
        id,
        request.date_start,
        request.start_time,
        request.end_time
    );

    let response = state
        .guard
        .run(id, state.service.reschedule(id, request))
        .await
        .context("Failed to reschedule booking")?;

    Ok(Json(response))
}

/// POST /api/v1/vendor/bookings/:id/cancel
#[utoipa::path(
    post,
    path = "/api/v1/vendor/bookings/{id}/cancel",
    tag = "bookings",
    params(("id" = i64, Path, description = "Vendor booking id")),
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = CancellationResponse),
        (status = 404, description = "No such booking", body = ErrorMessage),
        (status = 409, description = "Booking not confirmed", body = ErrorMessage)
    )
)]
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<CancellationResponse>, AppError> {
    tracing::info!(
        "POST /vendor/bookings/{}/cancel - refund: {}",
        id,
        request.process_refund
    );

    let response = state
        .guard
        .run(id, state.service.cancel(id, request))
        .await
        .context("Failed to cancel booking")?;

    Ok(Json(response))
}

/// GET /api/v1/vendor/bookings/:id/cancellation-estimate
///
/// Informational only; the cancel endpoint recomputes the refund.
#[utoipa::path(
    get,
    path = "/api/v1/vendor/bookings/{id}/cancellation-estimate",
    tag = "bookings",
    params(("id" = i64, Path, description = "Vendor booking id")),
    responses(
        (status = 200, description = "Fee and refund breakdown", body = CancellationEstimate),
        (status = 404, description = "No such booking", body = ErrorMessage)
    )
)]
pub async fn cancellation_estimate(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CancellationEstimate>, AppError> {
    let estimate = state.service.cancellation_estimate(id).await?;
    Ok(Json(estimate))
}

/// GET /api/v1/vendors/:vendor_id/availability
#[utoipa::path(
    get,
    path = "/api/v1/vendors/{vendor_id}/availability",
    tag = "bookings",
    params(("vendor_id" = i64, Path, description = "Vendor id"), AvailabilityQuery),
    responses(
        (status = 200, description = "Booked slots in the range", body = VendorAvailability),
        (status = 400, description = "Invalid date range", body = ErrorMessage)
    )
)]
pub async fn vendor_availability(
    State(state): State<Arc<AppState>>,
    Path(vendor_id): Path<i64>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<Json<VendorAvailability>, AppError> {
    tracing::info!("GET /vendors/{}/availability - {:?}", vendor_id, params);

    let date_from = match params.date_from.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => Utc::now().date_naive(),
    };
    let date_to = match params.date_to.as_deref() {
        Some(raw) => parse_date(raw)?,
        None => date_from + Duration::days(DEFAULT_AVAILABILITY_DAYS),
    };

    let booked_slots = state
        .service
        .availability(vendor_id, date_from, date_to)
        .await?;

    Ok(Json(VendorAvailability {
        vendor_id,
        date_from,
        date_to,
        booked_slots,
    }))
}

/// GET /api/v1/vendor/onboarding-portal
#[utoipa::path(
    get,
    path = "/api/v1/vendor/onboarding-portal",
    tag = "onboarding",
    params(OnboardingListQuery),
    responses((status = 200, description = "Page of onboarding portals", body = OnboardingPortalList))
)]
pub async fn list_onboarding_portals(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OnboardingListQuery>,
) -> Result<Json<ResponseList<OnboardingPortal>>, AppError> {
    let page = PageRequest::from_query(
        PageQuery {
            page: params.page,
            limit: params.limit,
        },
        state.config.default_page_limit,
    );

    let (portals, total) = state
        .service
        .storage()
        .onboarding
        .list(params.vendor_id, page)
        .await
        .context("Failed to fetch onboarding portals")?;

    Ok(Json(ResponseList::new(portals, page, total)))
}

/// GET /api/v1/vendor/onboarding-portal/:id
#[utoipa::path(
    get,
    path = "/api/v1/vendor/onboarding-portal/{id}",
    tag = "onboarding",
    params(("id" = i64, Path, description = "Onboarding portal id")),
    responses(
        (status = 200, description = "The portal", body = OnboardingPortal),
        (status = 404, description = "No such portal", body = ErrorMessage)
    )
)]
pub async fn get_onboarding_portal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OnboardingPortal>, AppError> {
    let portal = state
        .service
        .storage()
        .onboarding
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Onboarding portal {} not found", id)))?;

    Ok(Json(portal))
}

/// POST /api/v1/vendor/onboarding-portal
///
/// Accepts the nested layout or the legacy flat one.
#[utoipa::path(
    post,
    path = "/api/v1/vendor/onboarding-portal",
    tag = "onboarding",
    request_body = OnboardingPortalInput,
    responses(
        (status = 201, description = "Portal created", body = OnboardingPortal),
        (status = 400, description = "Invalid contact, payout or fee data", body = ErrorMessage)
    )
)]
pub async fn create_onboarding_portal(
    State(state): State<Arc<AppState>>,
    Json(input): Json<OnboardingPortalInput>,
) -> Result<(StatusCode, Json<OnboardingPortal>), AppError> {
    let portal = input
        .into_draft()
        .validate()
        .and_then(|draft| draft.into_portal())
        .context("Failed to create onboarding portal")?;

    let portal = state
        .service
        .storage()
        .onboarding
        .insert(portal)
        .await
        .context("Failed to create onboarding portal")?;

    tracing::info!(
        "Created onboarding portal {} for vendor {}",
        portal.vendor_onboarding_portal_id,
        portal.vendor_id
    );

    Ok((StatusCode::CREATED, Json(portal)))
}

/// PUT /api/v1/vendor/onboarding-portal/:id
///
/// Partial update: fields absent from the body keep their stored values.
#[utoipa::path(
    put,
    path = "/api/v1/vendor/onboarding-portal/{id}",
    tag = "onboarding",
    params(("id" = i64, Path, description = "Onboarding portal id")),
    request_body = OnboardingPortalInput,
    responses(
        (status = 200, description = "Portal updated", body = OnboardingPortal),
        (status = 400, description = "Invalid contact, payout or fee data", body = ErrorMessage),
        (status = 404, description = "No such portal", body = ErrorMessage)
    )
)]
pub async fn update_onboarding_portal(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(input): Json<OnboardingPortalInput>,
) -> Result<Json<OnboardingPortal>, AppError> {
    let repo = &state.service.storage().onboarding;
    let not_found = || AppError::NotFound(format!("Onboarding portal {} not found", id));

    let existing = repo.get(id).await?.ok_or_else(not_found)?;
    let updated = input
        .into_draft()
        .validate()
        .and_then(|draft| draft.apply_to(existing))
        .context("Failed to update onboarding portal")?;

    let portal = repo.update(updated).await?.ok_or_else(not_found)?;
    tracing::info!("Updated onboarding portal {}", id);

    Ok(Json(portal))
}

/// GET /api/events/discover
#[utoipa::path(
    get,
    path = "/api/events/discover",
    tag = "events",
    params(DiscoverQuery),
    responses((status = 200, description = "Catalog events", body = [DiscoverEvent]))
)]
pub async fn discover_events(
    Query(params): Query<DiscoverQuery>,
) -> Result<Json<Vec<DiscoverEvent>>, AppError> {
    let events =
        catalog::discover(params.category.as_deref()).context("Failed to fetch events")?;
    Ok(Json(events))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_vendor_scope_prefers_query() {
        let mut headers = HeaderMap::new();
        headers.insert("X-User-Id", HeaderValue::from_static("9"));

        assert_eq!(vendor_scope(Some(4), &headers).unwrap(), 4);
        assert_eq!(vendor_scope(None, &headers).unwrap(), 9);
    }

    #[test]
    fn test_vendor_scope_requires_identity() {
        let err = vendor_scope(None, &HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let mut headers = HeaderMap::new();
        headers.insert("X-User-Id", HeaderValue::from_static("abc"));
        assert!(matches!(
            vendor_scope(None, &headers),
            Err(AppError::Unauthorized(_))
        ));
    }
}
