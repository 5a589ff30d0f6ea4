use utoipa::OpenApi;

use crate::catalog::{DiscoverEvent, PriceRange};
use crate::errors::ErrorMessage;
use crate::handlers;
use crate::lifecycle::BookingAction;
use crate::models::*;
use crate::onboarding::{
    BankBranchInput, BankDetails, BusinessInformation, BusinessInformationInput, KycDetails,
    OnboardingPortal, OnboardingPortalInput, ServiceAreas, ServiceCategory,
};
use crate::pagination::{BookingList, OnboardingPortalList, Pagination};
use crate::webhook_handler;
use crate::webhook_models::{PaymentWebhookEvent, WebhookResponse};

/// OpenAPI document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(title = "Vendor Bookings API", description = "Vendor booking lifecycle, onboarding and event discovery"),
    paths(
        handlers::server_test,
        handlers::list_bookings,
        handlers::get_booking,
        handlers::create_booking,
        handlers::create_payment,
        handlers::reschedule_booking,
        handlers::cancel_booking,
        handlers::cancellation_estimate,
        handlers::vendor_availability,
        handlers::list_onboarding_portals,
        handlers::get_onboarding_portal,
        handlers::create_onboarding_portal,
        handlers::update_onboarding_portal,
        handlers::discover_events,
        webhook_handler::payment_webhook,
    ),
    components(schemas(
        ErrorMessage,
        BookingStatus,
        BookingAction,
        BookingSchedule,
        EventDetails,
        VendorCategory,
        BookedBy,
        VendorBooking,
        BookingView,
        BookingList,
        Pagination,
        CreateBookingRequest,
        CreatePaymentRequest,
        RescheduleRequest,
        CancelRequest,
        PaymentPurpose,
        PaymentStatus,
        PaymentRecord,
        TransactionDetails,
        PaymentResponse,
        RescheduleResponse,
        RefundOutcome,
        CancellationResponse,
        CancellationEstimate,
        BookedSlot,
        VendorAvailability,
        BusinessInformation,
        ServiceAreas,
        KycDetails,
        BankDetails,
        ServiceCategory,
        OnboardingPortal,
        OnboardingPortalList,
        BusinessInformationInput,
        BankBranchInput,
        OnboardingPortalInput,
        DiscoverEvent,
        PriceRange,
        PaymentWebhookEvent,
        WebhookResponse,
    )),
    tags(
        (name = "bookings", description = "Vendor booking lifecycle"),
        (name = "onboarding", description = "Vendor onboarding portal"),
        (name = "events", description = "Event discovery catalog"),
        (name = "webhooks", description = "Payment provider callbacks"),
        (name = "system", description = "Liveness")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_booking_routes() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;
        assert!(paths.contains_key("/api/v1/vendor/bookings/{id}/cancel"));
        assert!(paths.contains_key("/api/v1/webhooks/payments"));
        assert!(doc
            .components
            .as_ref()
            .is_some_and(|c| c.schemas.contains_key("BookingList")));
    }
}
