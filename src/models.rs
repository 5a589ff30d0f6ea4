use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::lifecycle::BookingAction;

// ============ Booking ============

/// Status of a vendor booking. A booking holds exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    /// Case-insensitive; accepts the `canceled` spelling some payloads use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" | "canceled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("Unknown booking status '{}'", other)),
        }
    }
}

/// Date range and daily time window of a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BookingSchedule {
    pub date_start: NaiveDate,
    pub end_date: NaiveDate,
    /// `HH:MM`
    pub start_time: String,
    /// `HH:MM`
    pub end_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventDetails {
    pub name_title: Option<String>,
    pub venue_name: Option<String>,
    pub max_capacity: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VendorCategory {
    pub category_id: i64,
    pub category_name: String,
    #[serde(default, alias = "emozi")]
    pub emoji: Option<String>,
}

/// The user who created the booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BookedBy {
    pub user_id: i64,
    pub name: String,
    pub email: Option<String>,
}

/// A reservation of a vendor's services for an event.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VendorBooking {
    pub vendor_booking_id: i64,
    pub vendor_id: Option<i64>,
    pub status: BookingStatus,
    #[schema(value_type = Option<String>, example = "100.00")]
    pub amount: Option<BigDecimal>,
    /// Booking-level cancellation fee as a percentage of the amount.
    #[schema(value_type = Option<String>, example = "20")]
    pub cancellation_charges_percentage: Option<BigDecimal>,
    /// Booking-level flat cancellation fee.
    #[schema(value_type = Option<String>)]
    pub cancellation_fee: Option<BigDecimal>,
    #[serde(flatten)]
    pub schedule: BookingSchedule,
    pub event_details: Option<EventDetails>,
    #[serde(default)]
    pub categories: Vec<VendorCategory>,
    pub created_by: Option<BookedBy>,
    /// Payment intent that confirmed the booking.
    pub transaction_id: Option<String>,
    pub cancellation_reason: Option<String>,
    #[schema(value_type = Option<String>)]
    pub refund_amount: Option<BigDecimal>,
    pub reschedule_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Booking data before an id is assigned.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub vendor_id: Option<i64>,
    pub status: BookingStatus,
    pub amount: Option<BigDecimal>,
    pub cancellation_charges_percentage: Option<BigDecimal>,
    pub cancellation_fee: Option<BigDecimal>,
    pub schedule: BookingSchedule,
    pub event_details: Option<EventDetails>,
    pub categories: Vec<VendorCategory>,
    pub created_by: Option<BookedBy>,
    pub transaction_id: Option<String>,
}

/// Booking as returned to clients: the record plus what can be done with it.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingView {
    #[serde(flatten)]
    pub booking: VendorBooking,
    pub actions: Vec<BookingAction>,
    /// Amount formatted for display, `-` when unknown.
    pub amount_display: String,
}

impl From<VendorBooking> for BookingView {
    fn from(booking: VendorBooking) -> Self {
        let actions = crate::lifecycle::available_actions(booking.status);
        let amount_display = crate::money::format_money(booking.amount.as_ref());
        Self {
            booking,
            actions,
            amount_display,
        }
    }
}

/// Filters for listing bookings.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub vendor_id: Option<i64>,
    pub status: Option<BookingStatus>,
}

// ============ Requests ============

/// Body of `POST /api/v1/vendor/bookings`.
///
/// Field aliases accept the naming used by older clients.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    #[serde(alias = "Vendor_id", alias = "vendorId")]
    pub vendor_id: i64,
    #[serde(default, alias = "vendor_price")]
    #[schema(value_type = Option<String>, example = "100.00")]
    pub amount: Option<BigDecimal>,
    #[serde(alias = "Date_start", alias = "dateFrom")]
    pub date_start: String,
    #[serde(default, alias = "End_date", alias = "dateTo")]
    pub end_date: Option<String>,
    #[serde(alias = "Start_time", alias = "timeFrom")]
    pub start_time: String,
    #[serde(alias = "End_time", alias = "timeTo")]
    pub end_time: String,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub cancellation_charges_percentage: Option<BigDecimal>,
    #[serde(default)]
    #[schema(value_type = Option<String>)]
    pub cancellation_fee: Option<BigDecimal>,
    #[serde(default)]
    pub event_details: Option<EventDetails>,
    #[serde(default, alias = "vendor_category_details")]
    pub categories: Vec<VendorCategory>,
    #[serde(default, alias = "created_by_details")]
    pub created_by: Option<BookedBy>,
}

/// Body of `POST /api/v1/vendor/bookings/{id}/payments`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePaymentRequest {
    #[serde(default, alias = "Vendor_id", alias = "vendorId")]
    pub vendor_id: Option<i64>,
    pub payment_method_id: i32,
    /// `RescheduleBooking` charges the reschedule fee instead of the booking.
    #[serde(default, alias = "billingDetails")]
    pub billing_details: Option<String>,
}

/// Body of `POST /api/v1/vendor/bookings/{id}/reschedule`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RescheduleRequest {
    #[serde(alias = "Date_start", alias = "dateFrom")]
    pub date_start: String,
    #[serde(default, alias = "End_date", alias = "dateTo")]
    pub end_date: Option<String>,
    #[serde(alias = "Start_time", alias = "timeFrom")]
    pub start_time: String,
    #[serde(alias = "End_time", alias = "timeTo")]
    pub end_time: String,
    #[serde(default)]
    pub reschedule_reason: Option<String>,
    #[serde(default)]
    pub payment_intent_id: Option<String>,
}

/// Body of `POST /api/v1/vendor/bookings/{id}/cancel`.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct CancelRequest {
    #[serde(default, alias = "cancellation_reason")]
    pub reason: Option<String>,
    #[serde(default, alias = "processRefund")]
    pub process_refund: bool,
}

// ============ Payments ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PaymentPurpose {
    /// Pays for a pending booking.
    Booking,
    /// Pays the fee for moving a confirmed booking.
    Reschedule,
}

impl PaymentPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentPurpose::Booking => "booking",
            PaymentPurpose::Reschedule => "reschedule",
        }
    }

    pub fn from_billing_details(billing_details: Option<&str>) -> Self {
        match billing_details {
            Some(details) if details.eq_ignore_ascii_case("RescheduleBooking") => {
                PaymentPurpose::Reschedule
            }
            _ => PaymentPurpose::Booking,
        }
    }
}

impl FromStr for PaymentPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "booking" => Ok(PaymentPurpose::Booking),
            "reschedule" => Ok(PaymentPurpose::Reschedule),
            other => Err(format!("Unknown payment purpose '{}'", other)),
        }
    }
}

/// Provider-side status of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 8] = [
        PaymentStatus::RequiresPaymentMethod,
        PaymentStatus::RequiresConfirmation,
        PaymentStatus::RequiresAction,
        PaymentStatus::Processing,
        PaymentStatus::Succeeded,
        PaymentStatus::Canceled,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    /// Whether a stored payment may move to `next`. Settled payments only
    /// move forward: `succeeded` becomes `refunded`, while `refunded` and
    /// `canceled` are final. Late or redelivered provider events fail this.
    pub fn can_become(&self, next: PaymentStatus) -> bool {
        match self {
            PaymentStatus::Refunded | PaymentStatus::Canceled => false,
            PaymentStatus::Succeeded => next == PaymentStatus::Refunded,
            _ => true,
        }
    }

    /// Statuses a payment may hold before moving to `next`.
    pub fn allowed_before(next: PaymentStatus) -> Vec<PaymentStatus> {
        Self::ALL
            .into_iter()
            .filter(|s| s.can_become(next))
            .collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::RequiresPaymentMethod => "requires_payment_method",
            PaymentStatus::RequiresConfirmation => "requires_confirmation",
            PaymentStatus::RequiresAction => "requires_action",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Succeeded => "succeeded",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "requires_payment_method" => Ok(PaymentStatus::RequiresPaymentMethod),
            "requires_confirmation" => Ok(PaymentStatus::RequiresConfirmation),
            "requires_action" => Ok(PaymentStatus::RequiresAction),
            "processing" => Ok(PaymentStatus::Processing),
            "succeeded" | "paid" | "success" => Ok(PaymentStatus::Succeeded),
            "canceled" | "cancelled" => Ok(PaymentStatus::Canceled),
            "failed" | "payment_failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("Unknown payment status '{}'", other)),
        }
    }
}

/// Payment method chosen in the price confirmation dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMethod {
    Card,
    BankAccount,
    Link,
}

impl PaymentMethod {
    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            1 => Some(PaymentMethod::Card),
            2 => Some(PaymentMethod::BankAccount),
            3 => Some(PaymentMethod::Link),
            _ => None,
        }
    }

    /// Provider payment method type.
    pub fn provider_type(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankAccount => "us_bank_account",
            PaymentMethod::Link => "link",
        }
    }
}

/// A payment attempt recorded against a booking.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub vendor_booking_id: i64,
    pub vendor_id: i64,
    pub purpose: PaymentPurpose,
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method_id: i32,
    /// Set once a reschedule fee payment has been spent on a reschedule.
    pub consumed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub vendor_booking_id: i64,
    pub vendor_id: i64,
    pub purpose: PaymentPurpose,
    pub payment_intent_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub payment_method_id: i32,
}

/// Transaction details normalized out of a provider payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransactionDetails {
    pub id: String,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub client_secret: Option<String>,
}

// ============ Responses ============

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub success: bool,
    #[serde(rename = "paymentIntent")]
    pub payment_intent: TransactionDetails,
    pub transaction: PaymentRecord,
    pub booking: BookingView,
    /// Payment amount formatted for display.
    pub amount_display: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RescheduleResponse {
    pub success: bool,
    pub message: String,
    pub booking: BookingView,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundOutcome {
    #[schema(value_type = Option<String>)]
    pub original: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub fee: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub refund: Option<BigDecimal>,
    /// Whether money was actually returned through the provider.
    pub processed: bool,
    pub refund_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancellationResponse {
    pub success: bool,
    pub message: String,
    pub booking: BookingView,
    pub refund: RefundOutcome,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CancellationEstimate {
    pub vendor_booking_id: i64,
    #[schema(value_type = Option<String>)]
    pub original: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub fee: Option<BigDecimal>,
    #[schema(value_type = Option<String>)]
    pub refund: Option<BigDecimal>,
    pub original_display: String,
    /// `Unknown` when no fee policy applies.
    pub fee_display: String,
    /// `Unknown` when no fee policy applies.
    pub refund_display: String,
}

/// A booked slot on a vendor's calendar.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookedSlot {
    pub vendor_booking_id: i64,
    pub status: BookingStatus,
    #[serde(flatten)]
    pub schedule: BookingSchedule,
}

/// Body of `GET /api/v1/vendors/{vendor_id}/availability`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VendorAvailability {
    pub vendor_id: i64,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub booked_slots: Vec<BookedSlot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_parsing() {
        assert_eq!("PENDING".parse::<BookingStatus>(), Ok(BookingStatus::Pending));
        assert_eq!("Confirmed".parse::<BookingStatus>(), Ok(BookingStatus::Confirmed));
        assert_eq!("canceled".parse::<BookingStatus>(), Ok(BookingStatus::Cancelled));
        assert!("paid".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_purpose_from_billing_details() {
        assert_eq!(
            PaymentPurpose::from_billing_details(Some("RescheduleBooking")),
            PaymentPurpose::Reschedule
        );
        assert_eq!(
            PaymentPurpose::from_billing_details(Some("VendorBooking")),
            PaymentPurpose::Booking
        );
        assert_eq!(PaymentPurpose::from_billing_details(None), PaymentPurpose::Booking);
    }

    #[test]
    fn test_create_request_accepts_legacy_field_names() {
        let req: CreateBookingRequest = serde_json::from_value(serde_json::json!({
            "Vendor_id": 12,
            "vendor_price": "150.00",
            "Date_start": "2025-06-20",
            "End_date": "2025-06-21",
            "Start_time": "00:00",
            "End_time": "23:59",
            "vendor_category_details": [
                {"category_id": 3, "category_name": "DJ", "emozi": "🎧"}
            ]
        }))
        .unwrap();

        assert_eq!(req.vendor_id, 12);
        assert_eq!(req.end_date.as_deref(), Some("2025-06-21"));
        assert_eq!(req.categories[0].emoji.as_deref(), Some("🎧"));
    }

    #[test]
    fn test_settled_payment_status_only_moves_forward() {
        assert!(PaymentStatus::Processing.can_become(PaymentStatus::Succeeded));
        assert!(PaymentStatus::Failed.can_become(PaymentStatus::Succeeded));
        assert!(PaymentStatus::Succeeded.can_become(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Succeeded.can_become(PaymentStatus::Processing));
        assert!(!PaymentStatus::Succeeded.can_become(PaymentStatus::Failed));
        assert!(!PaymentStatus::Succeeded.can_become(PaymentStatus::Succeeded));
        assert!(!PaymentStatus::Refunded.can_become(PaymentStatus::Succeeded));
        assert!(!PaymentStatus::Canceled.can_become(PaymentStatus::Processing));

        let before_refund = PaymentStatus::allowed_before(PaymentStatus::Refunded);
        assert!(before_refund.contains(&PaymentStatus::Succeeded));
        assert!(!before_refund.contains(&PaymentStatus::Refunded));
        assert!(!PaymentStatus::allowed_before(PaymentStatus::Processing)
            .contains(&PaymentStatus::Succeeded));
    }
}
