//! Booking flows: creation, payment, reschedule and cancellation.
//!
//! Handlers wrap the mutating flows in the in-flight guard; everything here
//! assumes it may still race with the payment webhook, which is why each
//! state change goes through a compare-and-set transition.

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use crate::availability::find_conflict;
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::lifecycle::{ensure_allowed, BookingAction, BookingTransition};
use crate::models::*;
use crate::money::{
    cancellation_breakdown, format_money, from_cents, refund_estimate, resolve_fee_policy,
    to_cents, CancellationBreakdown, FeePolicy,
};
use crate::pagination::{PageRequest, ResponseList};
use crate::payment_gateway::{
    idempotency_key, refund_idempotency_key, PaymentGateway, PaymentIntentRequest,
    RefundRequest,
};
use crate::storage::Storage;
use crate::validation::build_schedule;

/// Outcome of applying a provider event to a stored payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventOutcome {
    /// The payment was updated (and its booking confirmed when applicable).
    Applied,
    /// No payment with that intent id is stored.
    UnknownIntent,
    /// The payment is already settled past this status; the event was late
    /// or redelivered and left the payment untouched.
    Stale,
}

#[derive(Clone)]
pub struct BookingService {
    storage: Storage,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    reschedule_fee_cents: i64,
}

impl BookingService {
    pub fn new(config: &Config, storage: Storage, gateway: Arc<dyn PaymentGateway>) -> Self {
        Self {
            storage,
            gateway,
            currency: config.payment_currency.clone(),
            reschedule_fee_cents: config.reschedule_fee_cents,
        }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn get_booking(&self, id: i64) -> Result<VendorBooking, AppError> {
        self.storage
            .bookings
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }

    pub async fn list_bookings(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<ResponseList<BookingView>, AppError> {
        let (bookings, total) = self.storage.bookings.list(filter, page).await?;
        let views = bookings.into_iter().map(BookingView::from).collect();
        Ok(ResponseList::new(views, page, total))
    }

    /// Booked slots of a vendor between two dates, inclusive.
    pub async fn availability(
        &self,
        vendor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<BookedSlot>, AppError> {
        if to < from {
            return Err(AppError::BadRequest(
                "date_to cannot be before date_from".to_string(),
            ));
        }

        let bookings = self
            .storage
            .bookings
            .list_for_vendor_between(vendor_id, from, to)
            .await?;

        Ok(bookings
            .into_iter()
            .map(|b| BookedSlot {
                vendor_booking_id: b.vendor_booking_id,
                status: b.status,
                schedule: b.schedule,
            })
            .collect())
    }

    async fn ensure_slot_free(
        &self,
        vendor_id: i64,
        schedule: &BookingSchedule,
        ignore_booking_id: Option<i64>,
    ) -> Result<(), AppError> {
        let existing = self
            .storage
            .bookings
            .list_for_vendor_between(vendor_id, schedule.date_start, schedule.end_date)
            .await?;

        if let Some(clash) = find_conflict(schedule, &existing, ignore_booking_id) {
            return Err(AppError::Conflict(format!(
                "Vendor {} is already booked from {} {} to {} {} (booking {})",
                vendor_id,
                clash.schedule.date_start,
                clash.schedule.start_time,
                clash.schedule.end_date,
                clash.schedule.end_time,
                clash.vendor_booking_id
            )));
        }
        Ok(())
    }

    /// Creates a `pending` booking on a free slot.
    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> Result<VendorBooking, AppError> {
        if request.vendor_id <= 0 {
            return Err(AppError::BadRequest("Invalid vendor id".to_string()));
        }
        if let Some(amount) = &request.amount {
            if *amount < BigDecimal::from(0) {
                return Err(AppError::BadRequest("Amount cannot be negative".to_string()));
            }
        }
        if let Some(pct) = &request.cancellation_charges_percentage {
            if *pct < BigDecimal::from(0) || *pct > BigDecimal::from(100) {
                return Err(AppError::BadRequest(
                    "Cancellation charges percentage must be between 0 and 100".to_string(),
                ));
            }
        }
        if let Some(fee) = &request.cancellation_fee {
            if *fee < BigDecimal::from(0) {
                return Err(AppError::BadRequest(
                    "Cancellation fee cannot be negative".to_string(),
                ));
            }
        }

        let schedule = build_schedule(
            &request.date_start,
            request.end_date.as_deref(),
            &request.start_time,
            &request.end_time,
        )?;

        self.ensure_slot_free(request.vendor_id, &schedule, None)
            .await?;

        let booking = self
            .storage
            .bookings
            .insert(NewBooking {
                vendor_id: Some(request.vendor_id),
                status: BookingStatus::Pending,
                amount: request.amount,
                cancellation_charges_percentage: request.cancellation_charges_percentage,
                cancellation_fee: request.cancellation_fee,
                schedule,
                event_details: request.event_details,
                categories: request.categories,
                created_by: request.created_by,
                transaction_id: None,
            })
            .await?;

        tracing::info!(
            "Created booking {} for vendor {}",
            booking.vendor_booking_id,
            request.vendor_id
        );
        Ok(booking)
    }

    /// Charges a booking, or the reschedule fee of a confirmed booking.
    pub async fn pay(
        &self,
        id: i64,
        request: CreatePaymentRequest,
    ) -> Result<PaymentResponse, AppError> {
        let booking = self.get_booking(id).await?;

        let vendor_id = match (booking.vendor_id, request.vendor_id) {
            (Some(own), Some(given)) if own != given => {
                return Err(AppError::BadRequest(format!(
                    "Vendor id {} does not match booking {}",
                    given, id
                )));
            }
            (Some(own), _) => own,
            (None, Some(given)) => given,
            (None, None) => {
                return Err(AppError::BadRequest("Missing vendor id on booking".to_string()))
            }
        };

        let payment_method = PaymentMethod::from_id(request.payment_method_id).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Unknown payment method id {}",
                request.payment_method_id
            ))
        })?;

        let purpose = PaymentPurpose::from_billing_details(request.billing_details.as_deref());
        let action = match purpose {
            PaymentPurpose::Booking => BookingAction::Pay,
            PaymentPurpose::Reschedule => BookingAction::Reschedule,
        };
        ensure_allowed(id, booking.status, action)?;

        let amount_cents = match purpose {
            PaymentPurpose::Booking => booking
                .amount
                .as_ref()
                .and_then(to_cents)
                .filter(|cents| *cents > 0)
                .ok_or_else(|| {
                    AppError::BadRequest(format!("Booking {} has no payable amount", id))
                })?,
            PaymentPurpose::Reschedule if self.reschedule_fee_cents > 0 => {
                self.reschedule_fee_cents
            }
            PaymentPurpose::Reschedule => {
                return Err(AppError::BadRequest(
                    "No reschedule fee is due".to_string(),
                ))
            }
        };

        tracing::info!(
            "Paying booking {} ({}, {} cents, method {})",
            id,
            purpose.as_str(),
            amount_cents,
            payment_method.provider_type()
        );

        let intent = self
            .gateway
            .create_payment_intent(PaymentIntentRequest {
                vendor_booking_id: id,
                vendor_id,
                purpose,
                amount_cents,
                currency: self.currency.clone(),
                payment_method,
                idempotency_key: idempotency_key(
                    id,
                    vendor_id,
                    purpose,
                    amount_cents,
                    Utc::now().timestamp(),
                ),
            })
            .await
            .context("Failed to create payment")?;

        let status = match intent.status.as_deref().map(str::parse::<PaymentStatus>) {
            Some(Ok(status)) => status,
            Some(Err(e)) => {
                tracing::warn!("Payment intent {}: {}, treating as processing", intent.id, e);
                PaymentStatus::Processing
            }
            None => PaymentStatus::Processing,
        };

        // A replayed idempotency key returns an intent we already recorded.
        let transaction = match self.storage.payments.find_by_intent(&intent.id).await? {
            Some(existing) => existing,
            None => {
                self.storage
                    .payments
                    .insert(NewPayment {
                        vendor_booking_id: id,
                        vendor_id,
                        purpose,
                        payment_intent_id: intent.id.clone(),
                        amount_cents,
                        currency: self.currency.clone(),
                        status,
                        payment_method_id: request.payment_method_id,
                    })
                    .await?
            }
        };

        let booking = if purpose == PaymentPurpose::Booking && status == PaymentStatus::Succeeded {
            self.confirm(id, &intent.id).await?
        } else {
            booking
        };

        Ok(PaymentResponse {
            success: true,
            payment_intent: intent,
            transaction,
            booking: booking.into(),
            amount_display: format_money(Some(&from_cents(amount_cents))),
        })
    }

    /// Confirms a pending booking. A booking the webhook already confirmed
    /// with the same intent counts as success.
    async fn confirm(&self, id: i64, payment_intent_id: &str) -> Result<VendorBooking, AppError> {
        let transition = BookingTransition::Confirm {
            transaction_id: payment_intent_id.to_string(),
        };
        if let Some(booking) = self.storage.bookings.transition(id, transition).await? {
            tracing::info!("Booking {} confirmed by {}", id, payment_intent_id);
            return Ok(booking);
        }

        let current = self.get_booking(id).await?;
        if current.status == BookingStatus::Confirmed
            && current.transaction_id.as_deref() == Some(payment_intent_id)
        {
            return Ok(current);
        }
        Err(AppError::Conflict(format!(
            "Booking {} changed to {} while the payment was processed",
            id, current.status
        )))
    }

    /// Moves a confirmed booking to a new slot.
    pub async fn reschedule(
        &self,
        id: i64,
        request: RescheduleRequest,
    ) -> Result<RescheduleResponse, AppError> {
        let booking = self.get_booking(id).await?;
        ensure_allowed(id, booking.status, BookingAction::Reschedule)?;

        let schedule = build_schedule(
            &request.date_start,
            request.end_date.as_deref(),
            &request.start_time,
            &request.end_time,
        )?;

        let fee_payment = if self.reschedule_fee_cents > 0 {
            Some(self.reschedule_fee_payment(id, request.payment_intent_id.as_deref()).await?)
        } else {
            None
        };

        if let Some(vendor_id) = booking.vendor_id {
            self.ensure_slot_free(vendor_id, &schedule, Some(id)).await?;
        }

        if let Some(payment) = &fee_payment {
            if !self.storage.payments.consume(&payment.payment_intent_id).await? {
                return Err(AppError::PaymentRequired(format!(
                    "Reschedule fee payment {} has already been used",
                    payment.payment_intent_id
                )));
            }
        }

        let transition = BookingTransition::Reschedule {
            schedule,
            reason: request
                .reschedule_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        };
        let updated = self
            .storage
            .bookings
            .transition(id, transition)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Booking {} changed status during reschedule", id);
                AppError::Conflict(format!("Booking {} is no longer confirmed", id))
            })?;

        tracing::info!(
            "Booking {} rescheduled to {} {}",
            id,
            updated.schedule.date_start,
            updated.schedule.start_time
        );

        Ok(RescheduleResponse {
            success: true,
            message: "Booking rescheduled successfully".to_string(),
            booking: updated.into(),
        })
    }

    async fn reschedule_fee_payment(
        &self,
        id: i64,
        payment_intent_id: Option<&str>,
    ) -> Result<PaymentRecord, AppError> {
        let fee = format_money(Some(&from_cents(self.reschedule_fee_cents)));
        let intent_id = payment_intent_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                AppError::PaymentRequired(format!(
                    "A reschedule fee of {} must be paid before rescheduling",
                    fee
                ))
            })?;

        let payment = self
            .storage
            .payments
            .find_by_intent(intent_id)
            .await?
            .filter(|p| p.vendor_booking_id == id && p.purpose == PaymentPurpose::Reschedule)
            .ok_or_else(|| {
                AppError::PaymentRequired(format!(
                    "Payment {} is not a reschedule fee for booking {}",
                    intent_id, id
                ))
            })?;

        if payment.status != PaymentStatus::Succeeded {
            return Err(AppError::PaymentRequired(format!(
                "Reschedule fee payment {} is {}",
                intent_id,
                payment.status.as_str()
            )));
        }
        if payment.consumed {
            return Err(AppError::PaymentRequired(format!(
                "Reschedule fee payment {} has already been used",
                intent_id
            )));
        }
        Ok(payment)
    }

    async fn breakdown_for(&self, booking: &VendorBooking) -> Result<CancellationBreakdown, AppError> {
        let mut policy = resolve_fee_policy(booking, None);
        if policy == FeePolicy::Unknown {
            if let Some(vendor_id) = booking.vendor_id {
                let vendor_pct = self
                    .storage
                    .onboarding
                    .cancellation_charges_for_vendor(vendor_id)
                    .await?;
                policy = resolve_fee_policy(booking, vendor_pct.as_ref());
            }
        }
        Ok(cancellation_breakdown(booking.amount.as_ref(), &policy))
    }

    pub async fn cancellation_estimate(&self, id: i64) -> Result<CancellationEstimate, AppError> {
        let booking = self.get_booking(id).await?;
        let breakdown = self.breakdown_for(&booking).await?;

        Ok(CancellationEstimate {
            vendor_booking_id: id,
            original_display: format_money(breakdown.original.as_ref()),
            fee_display: match &breakdown.fee {
                Some(fee) => format_money(Some(fee)),
                None => "Unknown".to_string(),
            },
            refund_display: refund_estimate(&breakdown),
            original: breakdown.original,
            fee: breakdown.fee,
            refund: breakdown.refund,
        })
    }

    /// Cancels a confirmed booking and optionally refunds the booking payment.
    ///
    /// The status change happens first, so a losing concurrent cancel never
    /// reaches the provider. A refund the provider rejects leaves the booking
    /// cancelled with `processed: false`. The booking's `refund_amount` is
    /// only set once the provider has issued the refund.
    pub async fn cancel(
        &self,
        id: i64,
        request: CancelRequest,
    ) -> Result<CancellationResponse, AppError> {
        let booking = self.get_booking(id).await?;
        ensure_allowed(id, booking.status, BookingAction::Cancel)?;

        let breakdown = self.breakdown_for(&booking).await?;

        let transition = BookingTransition::Cancel {
            reason: request
                .reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        };
        let mut cancelled = self
            .storage
            .bookings
            .transition(id, transition)
            .await?
            .ok_or_else(|| {
                tracing::warn!("Booking {} changed status during cancellation", id);
                AppError::Conflict(format!("Booking {} is no longer confirmed", id))
            })?;
        tracing::info!("Booking {} cancelled", id);

        let mut outcome = RefundOutcome {
            original: breakdown.original.clone(),
            fee: breakdown.fee.clone(),
            refund: breakdown.refund.clone(),
            processed: false,
            refund_id: None,
        };
        let mut message = "Booking cancelled successfully".to_string();

        if request.process_refund {
            match self.refund(id, &breakdown).await {
                Ok(Some((refund_id, refunded_cents))) => {
                    let refunded = from_cents(refunded_cents);
                    // The money has moved; a failed write must not hide that.
                    match self.storage.bookings.record_refund(id, refunded.clone()).await {
                        Ok(Some(updated)) => cancelled = updated,
                        Ok(None) => {}
                        Err(e) => tracing::error!(
                            "Booking {} refunded ({}) but the amount was not recorded: {}",
                            id,
                            refund_id,
                            e
                        ),
                    }
                    message =
                        format!("Booking cancelled, {} refunded", format_money(Some(&refunded)));
                    outcome.processed = true;
                    outcome.refund_id = Some(refund_id);
                    outcome.refund = Some(refunded);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Refund for cancelled booking {} failed: {}", id, e);
                    message = "Booking cancelled; the refund could not be processed".to_string();
                }
            }
        }

        Ok(CancellationResponse {
            success: true,
            message,
            booking: cancelled.into(),
            refund: outcome,
        })
    }

    /// Returns the provider refund id and the refunded cents, or `None` when
    /// there is nothing to refund.
    async fn refund(
        &self,
        id: i64,
        breakdown: &CancellationBreakdown,
    ) -> Result<Option<(String, i64)>, AppError> {
        let Some(refund_cents) = breakdown.refund.as_ref().and_then(to_cents) else {
            tracing::info!("Booking {} has no known refund amount", id);
            return Ok(None);
        };
        if refund_cents <= 0 {
            return Ok(None);
        }

        let Some(payment) = self
            .storage
            .payments
            .latest_succeeded(id, PaymentPurpose::Booking)
            .await?
        else {
            tracing::warn!("Booking {} has no succeeded payment to refund", id);
            return Ok(None);
        };

        let amount_cents = refund_cents.min(payment.amount_cents);
        let refund = self
            .gateway
            .create_refund(RefundRequest {
                payment_intent_id: payment.payment_intent_id.clone(),
                amount_cents,
                idempotency_key: refund_idempotency_key(&payment.payment_intent_id, amount_cents),
            })
            .await
            .context("Failed to refund payment")?;

        self.storage
            .payments
            .update_status(&payment.payment_intent_id, PaymentStatus::Refunded)
            .await?;

        tracing::info!(
            "Refunded {} cents of {} ({})",
            amount_cents,
            payment.payment_intent_id,
            refund.id
        );
        Ok(Some((refund.id, amount_cents)))
    }

    /// Records a provider status for a stored payment. A succeeded booking
    /// payment confirms its booking if it is still pending.
    pub async fn apply_payment_event(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<PaymentEventOutcome, AppError> {
        let Some(stored) = self.storage.payments.find_by_intent(payment_intent_id).await? else {
            return Ok(PaymentEventOutcome::UnknownIntent);
        };
        let Some(payment) = self
            .storage
            .payments
            .update_status(payment_intent_id, status)
            .await?
        else {
            tracing::info!(
                "Ignoring {} for {}, payment is already {}",
                status.as_str(),
                payment_intent_id,
                stored.status.as_str()
            );
            return Ok(PaymentEventOutcome::Stale);
        };

        if status == PaymentStatus::Succeeded && payment.purpose == PaymentPurpose::Booking {
            let transition = BookingTransition::Confirm {
                transaction_id: payment_intent_id.to_string(),
            };
            match self
                .storage
                .bookings
                .transition(payment.vendor_booking_id, transition)
                .await?
            {
                Some(_) => tracing::info!(
                    "Booking {} confirmed by webhook for {}",
                    payment.vendor_booking_id,
                    payment_intent_id
                ),
                None => tracing::debug!(
                    "Booking {} was not pending, webhook confirmation skipped",
                    payment.vendor_booking_id
                ),
            }
        }

        Ok(PaymentEventOutcome::Applied)
    }
}
