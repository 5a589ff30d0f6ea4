//! Repository interfaces, one per entity.
//!
//! Handlers only see these traits. `db_storage` implements them on Postgres,
//! `memory_storage` in process for local runs and tests.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use sqlx::PgPool;
use std::sync::Arc;

use crate::errors::AppError;
use crate::lifecycle::BookingTransition;
use crate::models::{
    BookingFilter, NewBooking, NewPayment, PaymentPurpose, PaymentRecord, PaymentStatus,
    VendorBooking,
};
use crate::onboarding::OnboardingPortal;
use crate::pagination::PageRequest;

#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert(&self, booking: NewBooking) -> Result<VendorBooking, AppError>;

    async fn get(&self, id: i64) -> Result<Option<VendorBooking>, AppError>;

    /// Newest first. Returns the page and the total number of matches.
    async fn list(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<(Vec<VendorBooking>, u64), AppError>;

    /// Non-cancelled bookings of a vendor touching `[from, to]`.
    async fn list_for_vendor_between(
        &self,
        vendor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VendorBooking>, AppError>;

    /// Applies `transition` only if the booking still holds
    /// `transition.expected_status()`. `None` when it does not (or is gone).
    async fn transition(
        &self,
        id: i64,
        transition: BookingTransition,
    ) -> Result<Option<VendorBooking>, AppError>;

    /// Stores the amount actually refunded on a cancelled booking.
    async fn record_refund(
        &self,
        id: i64,
        refund_amount: BigDecimal,
    ) -> Result<Option<VendorBooking>, AppError>;
}

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, AppError>;

    async fn find_by_intent(&self, payment_intent_id: &str)
        -> Result<Option<PaymentRecord>, AppError>;

    /// Moves a payment to `status` when [`PaymentStatus::can_become`] allows it.
    /// `None` when the intent is unknown or the payment is already settled.
    async fn update_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRecord>, AppError>;

    /// Most recent succeeded payment of `purpose` for a booking.
    async fn latest_succeeded(
        &self,
        vendor_booking_id: i64,
        purpose: PaymentPurpose,
    ) -> Result<Option<PaymentRecord>, AppError>;

    /// Marks a payment as spent. `false` if it was already consumed.
    async fn consume(&self, payment_intent_id: &str) -> Result<bool, AppError>;
}

#[async_trait]
pub trait OnboardingRepository: Send + Sync {
    /// Stores a new portal; the id on `portal` is ignored.
    async fn insert(&self, portal: OnboardingPortal) -> Result<OnboardingPortal, AppError>;

    async fn get(&self, id: i64) -> Result<Option<OnboardingPortal>, AppError>;

    async fn list(
        &self,
        vendor_id: Option<i64>,
        page: PageRequest,
    ) -> Result<(Vec<OnboardingPortal>, u64), AppError>;

    async fn update(&self, portal: OnboardingPortal) -> Result<Option<OnboardingPortal>, AppError>;

    /// Cancellation percentage from the vendor's most recent active portal.
    async fn cancellation_charges_for_vendor(
        &self,
        vendor_id: i64,
    ) -> Result<Option<BigDecimal>, AppError>;
}

/// The repositories the service runs on.
#[derive(Clone)]
pub struct Storage {
    pub bookings: Arc<dyn BookingRepository>,
    pub payments: Arc<dyn PaymentRepository>,
    pub onboarding: Arc<dyn OnboardingRepository>,
}

impl Storage {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            bookings: Arc::new(crate::db_storage::PgBookingRepository::new(pool.clone())),
            payments: Arc::new(crate::db_storage::PgPaymentRepository::new(pool.clone())),
            onboarding: Arc::new(crate::db_storage::PgOnboardingRepository::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            bookings: Arc::new(crate::memory_storage::MemoryBookingRepository::default()),
            payments: Arc::new(crate::memory_storage::MemoryPaymentRepository::default()),
            onboarding: Arc::new(crate::memory_storage::MemoryOnboardingRepository::default()),
        }
    }
}
