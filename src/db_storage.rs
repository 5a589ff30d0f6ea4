use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::errors::{AppError, ResultExt};
use crate::lifecycle::BookingTransition;
use crate::models::{
    BookedBy, BookingFilter, BookingSchedule, BookingStatus, EventDetails, NewBooking,
    NewPayment, PaymentPurpose, PaymentRecord, PaymentStatus, VendorBooking, VendorCategory,
};
use crate::onboarding::{
    BankDetails, BusinessInformation, KycDetails, OnboardingPortal, ServiceAreas, ServiceCategory,
};
use crate::pagination::PageRequest;
use crate::storage::{BookingRepository, OnboardingRepository, PaymentRepository};

const BOOKING_COLUMNS: &str = "vendor_booking_id, vendor_id, status, amount, \
    cancellation_charges_percentage, cancellation_fee, date_start, end_date, start_time, \
    end_time, event_details, categories, created_by, transaction_id, cancellation_reason, \
    refund_amount, reschedule_reason, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, vendor_booking_id, vendor_id, purpose, payment_intent_id, \
    amount_cents, currency, status, payment_method_id, consumed, created_at, updated_at";

const PORTAL_COLUMNS: &str = "vendor_onboarding_portal_id, vendor_id, business, service_areas, \
    kyc, bank, service_categories, cancellation_charges, escrow_payment, \
    initial_payment_required, if_confirm, status, created_at, updated_at";

fn limit_offset(page: PageRequest) -> (i64, i64) {
    (
        i64::from(page.limit),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

fn total(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

// ============ Bookings ============

#[derive(Debug, FromRow)]
struct BookingRow {
    vendor_booking_id: i64,
    vendor_id: Option<i64>,
    status: String,
    amount: Option<BigDecimal>,
    cancellation_charges_percentage: Option<BigDecimal>,
    cancellation_fee: Option<BigDecimal>,
    date_start: NaiveDate,
    end_date: NaiveDate,
    start_time: String,
    end_time: String,
    event_details: Option<Json<EventDetails>>,
    categories: Json<Vec<VendorCategory>>,
    created_by: Option<Json<BookedBy>>,
    transaction_id: Option<String>,
    cancellation_reason: Option<String>,
    refund_amount: Option<BigDecimal>,
    reschedule_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<BookingRow> for VendorBooking {
    type Error = AppError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = row.status.parse::<BookingStatus>().map_err(|e| {
            AppError::InternalError(format!("Booking {}: {}", row.vendor_booking_id, e))
        })?;
        Ok(VendorBooking {
            vendor_booking_id: row.vendor_booking_id,
            vendor_id: row.vendor_id,
            status,
            amount: row.amount,
            cancellation_charges_percentage: row.cancellation_charges_percentage,
            cancellation_fee: row.cancellation_fee,
            schedule: BookingSchedule {
                date_start: row.date_start,
                end_date: row.end_date,
                start_time: row.start_time,
                end_time: row.end_time,
            },
            event_details: row.event_details.map(|j| j.0),
            categories: row.categories.0,
            created_by: row.created_by.map(|j| j.0),
            transaction_id: row.transaction_id,
            cancellation_reason: row.cancellation_reason,
            refund_amount: row.refund_amount,
            reschedule_reason: row.reschedule_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_bookings(rows: Vec<BookingRow>) -> Result<Vec<VendorBooking>, AppError> {
    rows.into_iter().map(VendorBooking::try_from).collect()
}

/// Postgres-backed booking store.
pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_row(
        &self,
        legacy_booking_id: Option<i64>,
        booking: NewBooking,
    ) -> Result<Option<VendorBooking>, AppError> {
        let query = format!(
            r#"
            INSERT INTO vendor_bookings (
                legacy_booking_id, vendor_id, status, amount, cancellation_charges_percentage,
                cancellation_fee, date_start, end_date, start_time, end_time, event_details,
                categories, created_by, transaction_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (legacy_booking_id) DO NOTHING
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );

        let row: Option<BookingRow> = sqlx::query_as(&query)
            .bind(legacy_booking_id)
            .bind(booking.vendor_id)
            .bind(booking.status.as_str())
            .bind(&booking.amount)
            .bind(&booking.cancellation_charges_percentage)
            .bind(&booking.cancellation_fee)
            .bind(booking.schedule.date_start)
            .bind(booking.schedule.end_date)
            .bind(&booking.schedule.start_time)
            .bind(&booking.schedule.end_time)
            .bind(booking.event_details.map(Json))
            .bind(Json(booking.categories))
            .bind(booking.created_by.map(Json))
            .bind(&booking.transaction_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to insert booking")?;

        row.map(VendorBooking::try_from).transpose()
    }

    /// Inserts a booking carried over from a legacy export. `None` when that
    /// legacy id was imported before.
    pub async fn insert_imported(
        &self,
        legacy_booking_id: i64,
        booking: NewBooking,
    ) -> Result<Option<VendorBooking>, AppError> {
        self.insert_row(Some(legacy_booking_id), booking).await
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn insert(&self, booking: NewBooking) -> Result<VendorBooking, AppError> {
        self.insert_row(None, booking)
            .await?
            .ok_or_else(|| AppError::InternalError("Booking insert returned no row".to_string()))
    }

    async fn get(&self, id: i64) -> Result<Option<VendorBooking>, AppError> {
        let query = format!(
            "SELECT {} FROM vendor_bookings WHERE vendor_booking_id = $1",
            BOOKING_COLUMNS
        );
        let row: Option<BookingRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        row.map(VendorBooking::try_from).transpose()
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<(Vec<VendorBooking>, u64), AppError> {
        let status = filter.status.map(|s| s.as_str());
        let (limit, offset) = limit_offset(page);

        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM vendor_bookings
            WHERE ($1::BIGINT IS NULL OR vendor_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
            "#,
        )
        .bind(filter.vendor_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count bookings")?;

        let query = format!(
            r#"
            SELECT {} FROM vendor_bookings
            WHERE ($1::BIGINT IS NULL OR vendor_id = $1)
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY vendor_booking_id DESC
            LIMIT $3 OFFSET $4
            "#,
            BOOKING_COLUMNS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&query)
            .bind(filter.vendor_id)
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list bookings")?;

        Ok((into_bookings(rows)?, total(count)))
    }

    async fn list_for_vendor_between(
        &self,
        vendor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VendorBooking>, AppError> {
        let query = format!(
            r#"
            SELECT {} FROM vendor_bookings
            WHERE vendor_id = $1
              AND status <> 'cancelled'
              AND date_start <= $3
              AND end_date >= $2
            ORDER BY date_start, start_time
            "#,
            BOOKING_COLUMNS
        );
        let rows: Vec<BookingRow> = sqlx::query_as(&query)
            .bind(vendor_id)
            .bind(from)
            .bind(to)
            .fetch_all(&self.pool)
            .await
            .context("Failed to load vendor calendar")?;

        into_bookings(rows)
    }

    async fn transition(
        &self,
        id: i64,
        transition: BookingTransition,
    ) -> Result<Option<VendorBooking>, AppError> {
        let expected = transition.expected_status().as_str();
        let target = transition.target_status().as_str();

        // Every statement guards on the current status so concurrent
        // transitions of one booking cannot both apply.
        let row: Option<BookingRow> = match transition {
            BookingTransition::Confirm { transaction_id } => {
                let query = format!(
                    r#"
                    UPDATE vendor_bookings
                    SET status = $3, transaction_id = $4, updated_at = now()
                    WHERE vendor_booking_id = $1 AND status = $2
                    RETURNING {}
                    "#,
                    BOOKING_COLUMNS
                );
                sqlx::query_as::<_, BookingRow>(&query)
                    .bind(id)
                    .bind(expected)
                    .bind(target)
                    .bind(transaction_id)
                    .fetch_optional(&self.pool)
                    .await
            }
            BookingTransition::Reschedule { schedule, reason } => {
                let query = format!(
                    r#"
                    UPDATE vendor_bookings
                    SET status = $3, date_start = $4, end_date = $5, start_time = $6,
                        end_time = $7, reschedule_reason = $8, updated_at = now()
                    WHERE vendor_booking_id = $1 AND status = $2
                    RETURNING {}
                    "#,
                    BOOKING_COLUMNS
                );
                sqlx::query_as::<_, BookingRow>(&query)
                    .bind(id)
                    .bind(expected)
                    .bind(target)
                    .bind(schedule.date_start)
                    .bind(schedule.end_date)
                    .bind(schedule.start_time)
                    .bind(schedule.end_time)
                    .bind(reason)
                    .fetch_optional(&self.pool)
                    .await
            }
            BookingTransition::Cancel { reason } => {
                let query = format!(
                    r#"
                    UPDATE vendor_bookings
                    SET status = $3, cancellation_reason = $4, updated_at = now()
                    WHERE vendor_booking_id = $1 AND status = $2
                    RETURNING {}
                    "#,
                    BOOKING_COLUMNS
                );
                sqlx::query_as::<_, BookingRow>(&query)
                    .bind(id)
                    .bind(expected)
                    .bind(target)
                    .bind(reason)
                    .fetch_optional(&self.pool)
                    .await
            }
        }
        .with_context(|| format!("Failed to update booking {}", id))?;

        row.map(VendorBooking::try_from).transpose()
    }

    async fn record_refund(
        &self,
        id: i64,
        refund_amount: BigDecimal,
    ) -> Result<Option<VendorBooking>, AppError> {
        let query = format!(
            r#"
            UPDATE vendor_bookings SET refund_amount = $2, updated_at = now()
            WHERE vendor_booking_id = $1 AND status = 'cancelled'
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let row: Option<BookingRow> = sqlx::query_as(&query)
            .bind(id)
            .bind(refund_amount)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to record refund for booking {}", id))?;

        row.map(VendorBooking::try_from).transpose()
    }
}

// ============ Payments ============

#[derive(Debug, FromRow)]
struct PaymentRow {
    id: Uuid,
    vendor_booking_id: i64,
    vendor_id: i64,
    purpose: String,
    payment_intent_id: String,
    amount_cents: i64,
    currency: String,
    status: String,
    payment_method_id: i32,
    consumed: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = AppError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentRecord {
            id: row.id,
            vendor_booking_id: row.vendor_booking_id,
            vendor_id: row.vendor_id,
            purpose: row.purpose.parse().map_err(AppError::InternalError)?,
            payment_intent_id: row.payment_intent_id,
            amount_cents: row.amount_cents,
            currency: row.currency,
            status: row.status.parse().map_err(AppError::InternalError)?,
            payment_method_id: row.payment_method_id,
            consumed: row.consumed,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PgPaymentRepository {
    pool: PgPool,
}

impl PgPaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PaymentRepository for PgPaymentRepository {
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, AppError> {
        let query = format!(
            r#"
            INSERT INTO booking_payments (
                id, vendor_booking_id, vendor_id, purpose, payment_intent_id,
                amount_cents, currency, status, payment_method_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (payment_intent_id) DO NOTHING
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(payment.vendor_booking_id)
            .bind(payment.vendor_id)
            .bind(payment.purpose.as_str())
            .bind(&payment.payment_intent_id)
            .bind(payment.amount_cents)
            .bind(&payment.currency)
            .bind(payment.status.as_str())
            .bind(payment.payment_method_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to record payment")?;

        match row {
            Some(row) => PaymentRecord::try_from(row),
            None => Err(AppError::Conflict(format!(
                "Payment intent {} is already recorded",
                payment.payment_intent_id
            ))),
        }
    }

    async fn find_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentRecord>, AppError> {
        let query = format!(
            "SELECT {} FROM booking_payments WHERE payment_intent_id = $1",
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&query)
            .bind(payment_intent_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn update_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRecord>, AppError> {
        let query = format!(
            r#"
            UPDATE booking_payments SET status = $2, updated_at = now()
            WHERE payment_intent_id = $1 AND status = ANY($3)
            RETURNING {}
            "#,
            PAYMENT_COLUMNS
        );
        let allowed: Vec<&str> = PaymentStatus::allowed_before(status)
            .iter()
            .map(PaymentStatus::as_str)
            .collect();
        let row: Option<PaymentRow> = sqlx::query_as(&query)
            .bind(payment_intent_id)
            .bind(status.as_str())
            .bind(allowed)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to update payment status")?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn latest_succeeded(
        &self,
        vendor_booking_id: i64,
        purpose: PaymentPurpose,
    ) -> Result<Option<PaymentRecord>, AppError> {
        let query = format!(
            r#"
            SELECT {} FROM booking_payments
            WHERE vendor_booking_id = $1 AND purpose = $2 AND status = 'succeeded'
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        );
        let row: Option<PaymentRow> = sqlx::query_as(&query)
            .bind(vendor_booking_id)
            .bind(purpose.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn consume(&self, payment_intent_id: &str) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE booking_payments SET consumed = true, updated_at = now()
            WHERE payment_intent_id = $1 AND NOT consumed
            "#,
        )
        .bind(payment_intent_id)
        .execute(&self.pool)
        .await
        .context("Failed to consume payment")?;

        Ok(result.rows_affected() == 1)
    }
}

// ============ Onboarding ============

#[derive(Debug, FromRow)]
struct PortalRow {
    vendor_onboarding_portal_id: i64,
    vendor_id: i64,
    business: Json<BusinessInformation>,
    service_areas: Json<ServiceAreas>,
    kyc: Json<KycDetails>,
    bank: Json<BankDetails>,
    service_categories: Json<Vec<ServiceCategory>>,
    cancellation_charges: Option<BigDecimal>,
    escrow_payment: bool,
    initial_payment_required: bool,
    if_confirm: bool,
    status: bool,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<PortalRow> for OnboardingPortal {
    fn from(row: PortalRow) -> Self {
        OnboardingPortal {
            vendor_onboarding_portal_id: row.vendor_onboarding_portal_id,
            vendor_id: row.vendor_id,
            business: row.business.0,
            service_areas: row.service_areas.0,
            kyc: row.kyc.0,
            bank: row.bank.0,
            service_categories: row.service_categories.0,
            cancellation_charges: row.cancellation_charges,
            escrow_payment: row.escrow_payment,
            initial_payment_required: row.initial_payment_required,
            if_confirm: row.if_confirm,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

pub struct PgOnboardingRepository {
    pool: PgPool,
}

impl PgOnboardingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OnboardingRepository for PgOnboardingRepository {
    async fn insert(&self, portal: OnboardingPortal) -> Result<OnboardingPortal, AppError> {
        let query = format!(
            r#"
            INSERT INTO vendor_onboarding_portals (
                vendor_id, business, service_areas, kyc, bank, service_categories,
                cancellation_charges, escrow_payment, initial_payment_required, if_confirm, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING {}
            "#,
            PORTAL_COLUMNS
        );
        let row: PortalRow = sqlx::query_as(&query)
            .bind(portal.vendor_id)
            .bind(Json(&portal.business))
            .bind(Json(&portal.service_areas))
            .bind(Json(&portal.kyc))
            .bind(Json(&portal.bank))
            .bind(Json(&portal.service_categories))
            .bind(&portal.cancellation_charges)
            .bind(portal.escrow_payment)
            .bind(portal.initial_payment_required)
            .bind(portal.if_confirm)
            .bind(portal.status)
            .fetch_one(&self.pool)
            .await
            .context("Failed to create onboarding portal")?;

        Ok(row.into())
    }

    async fn get(&self, id: i64) -> Result<Option<OnboardingPortal>, AppError> {
        let query = format!(
            "SELECT {} FROM vendor_onboarding_portals WHERE vendor_onboarding_portal_id = $1",
            PORTAL_COLUMNS
        );
        let row: Option<PortalRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok(row.map(OnboardingPortal::from))
    }

    async fn list(
        &self,
        vendor_id: Option<i64>,
        page: PageRequest,
    ) -> Result<(Vec<OnboardingPortal>, u64), AppError> {
        let (limit, offset) = limit_offset(page);

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM vendor_onboarding_portals WHERE ($1::BIGINT IS NULL OR vendor_id = $1)",
        )
        .bind(vendor_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count onboarding portals")?;

        let query = format!(
            r#"
            SELECT {} FROM vendor_onboarding_portals
            WHERE ($1::BIGINT IS NULL OR vendor_id = $1)
            ORDER BY vendor_onboarding_portal_id DESC
            LIMIT $2 OFFSET $3
            "#,
            PORTAL_COLUMNS
        );
        let rows: Vec<PortalRow> = sqlx::query_as(&query)
            .bind(vendor_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list onboarding portals")?;

        Ok((rows.into_iter().map(OnboardingPortal::from).collect(), total(count)))
    }

    async fn update(&self, portal: OnboardingPortal) -> Result<Option<OnboardingPortal>, AppError> {
        let query = format!(
            r#"
            UPDATE vendor_onboarding_portals
            SET business = $2, service_areas = $3, kyc = $4, bank = $5,
                service_categories = $6, cancellation_charges = $7, escrow_payment = $8,
                initial_payment_required = $9, if_confirm = $10, status = $11,
                updated_at = now()
            WHERE vendor_onboarding_portal_id = $1
            RETURNING {}
            "#,
            PORTAL_COLUMNS
        );
        let row: Option<PortalRow> = sqlx::query_as(&query)
            .bind(portal.vendor_onboarding_portal_id)
            .bind(Json(&portal.business))
            .bind(Json(&portal.service_areas))
            .bind(Json(&portal.kyc))
            .bind(Json(&portal.bank))
            .bind(Json(&portal.service_categories))
            .bind(&portal.cancellation_charges)
            .bind(portal.escrow_payment)
            .bind(portal.initial_payment_required)
            .bind(portal.if_confirm)
            .bind(portal.status)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| {
                format!(
                    "Failed to update onboarding portal {}",
                    portal.vendor_onboarding_portal_id
                )
            })?;

        Ok(row.map(OnboardingPortal::from))
    }

    async fn cancellation_charges_for_vendor(
        &self,
        vendor_id: i64,
    ) -> Result<Option<BigDecimal>, AppError> {
        let charges: Option<Option<BigDecimal>> = sqlx::query_scalar(
            r#"
            SELECT cancellation_charges FROM vendor_onboarding_portals
            WHERE vendor_id = $1 AND status
            ORDER BY vendor_onboarding_portal_id DESC
            LIMIT 1
            "#,
        )
        .bind(vendor_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(charges.flatten())
    }
}
