use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::AppError;
use crate::lifecycle::BookingTransition;
use crate::models::{
    BookingFilter, BookingStatus, NewBooking, NewPayment, PaymentPurpose, PaymentRecord,
    PaymentStatus, VendorBooking,
};
use crate::onboarding::OnboardingPortal;
use crate::pagination::{paginate, PageRequest};
use crate::storage::{BookingRepository, OnboardingRepository, PaymentRepository};

struct Table<T> {
    next_id: i64,
    rows: BTreeMap<i64, T>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self {
            next_id: 0,
            rows: BTreeMap::new(),
        }
    }
}

impl<T> Table<T> {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryBookingRepository {
    table: RwLock<Table<VendorBooking>>,
}

#[async_trait]
impl BookingRepository for MemoryBookingRepository {
    async fn insert(&self, booking: NewBooking) -> Result<VendorBooking, AppError> {
        let mut table = self.table.write().await;
        let id = table.allocate_id();
        let record = VendorBooking {
            vendor_booking_id: id,
            vendor_id: booking.vendor_id,
            status: booking.status,
            amount: booking.amount,
            cancellation_charges_percentage: booking.cancellation_charges_percentage,
            cancellation_fee: booking.cancellation_fee,
            schedule: booking.schedule,
            event_details: booking.event_details,
            categories: booking.categories,
            created_by: booking.created_by,
            transaction_id: booking.transaction_id,
            cancellation_reason: None,
            refund_amount: None,
            reschedule_reason: None,
            created_at: Utc::now(),
            updated_at: None,
        };
        table.rows.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: i64) -> Result<Option<VendorBooking>, AppError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn list(
        &self,
        filter: &BookingFilter,
        page: PageRequest,
    ) -> Result<(Vec<VendorBooking>, u64), AppError> {
        let table = self.table.read().await;
        let matches: Vec<VendorBooking> = table
            .rows
            .values()
            .rev()
            .filter(|b| filter.vendor_id.is_none() || b.vendor_id == filter.vendor_id)
            .filter(|b| filter.status.map_or(true, |s| b.status == s))
            .cloned()
            .collect();
        let total = matches.len() as u64;
        Ok((paginate(&matches, page), total))
    }

    async fn list_for_vendor_between(
        &self,
        vendor_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VendorBooking>, AppError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .filter(|b| b.vendor_id == Some(vendor_id))
            .filter(|b| b.status != BookingStatus::Cancelled)
            .filter(|b| b.schedule.date_start <= to && b.schedule.end_date >= from)
            .cloned()
            .collect())
    }

    async fn transition(
        &self,
        id: i64,
        transition: BookingTransition,
    ) -> Result<Option<VendorBooking>, AppError> {
        let mut table = self.table.write().await;
        let Some(booking) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if booking.status != transition.expected_status() {
            return Ok(None);
        }

        booking.status = transition.target_status();
        booking.updated_at = Some(Utc::now());
        match transition {
            BookingTransition::Confirm { transaction_id } => {
                booking.transaction_id = Some(transaction_id);
            }
            BookingTransition::Reschedule { schedule, reason } => {
                booking.schedule = schedule;
                booking.reschedule_reason = reason;
            }
            BookingTransition::Cancel { reason } => {
                booking.cancellation_reason = reason;
            }
        }
        Ok(Some(booking.clone()))
    }

    async fn record_refund(
        &self,
        id: i64,
        refund_amount: BigDecimal,
    ) -> Result<Option<VendorBooking>, AppError> {
        let mut table = self.table.write().await;
        Ok(table
            .rows
            .get_mut(&id)
            .filter(|b| b.status == BookingStatus::Cancelled)
            .map(|b| {
                b.refund_amount = Some(refund_amount);
                b.updated_at = Some(Utc::now());
                b.clone()
            }))
    }
}

#[derive(Default)]
pub struct MemoryPaymentRepository {
    rows: RwLock<Vec<PaymentRecord>>,
}

#[async_trait]
impl PaymentRepository for MemoryPaymentRepository {
    async fn insert(&self, payment: NewPayment) -> Result<PaymentRecord, AppError> {
        let mut rows = self.rows.write().await;
        if rows
            .iter()
            .any(|p| p.payment_intent_id == payment.payment_intent_id)
        {
            return Err(AppError::Conflict(format!(
                "Payment intent {} is already recorded",
                payment.payment_intent_id
            )));
        }
        let record = PaymentRecord {
            id: Uuid::new_v4(),
            vendor_booking_id: payment.vendor_booking_id,
            vendor_id: payment.vendor_id,
            purpose: payment.purpose,
            payment_intent_id: payment.payment_intent_id,
            amount_cents: payment.amount_cents,
            currency: payment.currency,
            status: payment.status,
            payment_method_id: payment.payment_method_id,
            consumed: false,
            created_at: Utc::now(),
            updated_at: None,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn find_by_intent(
        &self,
        payment_intent_id: &str,
    ) -> Result<Option<PaymentRecord>, AppError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .find(|p| p.payment_intent_id == payment_intent_id)
            .cloned())
    }

    async fn update_status(
        &self,
        payment_intent_id: &str,
        status: PaymentStatus,
    ) -> Result<Option<PaymentRecord>, AppError> {
        let mut rows = self.rows.write().await;
        Ok(rows
            .iter_mut()
            .find(|p| p.payment_intent_id == payment_intent_id && p.status.can_become(status))
            .map(|p| {
                p.status = status;
                p.updated_at = Some(Utc::now());
                p.clone()
            }))
    }

    async fn latest_succeeded(
        &self,
        vendor_booking_id: i64,
        purpose: PaymentPurpose,
    ) -> Result<Option<PaymentRecord>, AppError> {
        Ok(self
            .rows
            .read()
            .await
            .iter()
            .rev()
            .find(|p| {
                p.vendor_booking_id == vendor_booking_id
                    && p.purpose == purpose
                    && p.status == PaymentStatus::Succeeded
            })
            .cloned())
    }

    async fn consume(&self, payment_intent_id: &str) -> Result<bool, AppError> {
        let mut rows = self.rows.write().await;
        match rows
            .iter_mut()
            .find(|p| p.payment_intent_id == payment_intent_id && !p.consumed)
        {
            Some(p) => {
                p.consumed = true;
                p.updated_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct MemoryOnboardingRepository {
    table: RwLock<Table<OnboardingPortal>>,
}

#[async_trait]
impl OnboardingRepository for MemoryOnboardingRepository {
    async fn insert(&self, mut portal: OnboardingPortal) -> Result<OnboardingPortal, AppError> {
        let mut table = self.table.write().await;
        let id = table.allocate_id();
        portal.vendor_onboarding_portal_id = id;
        table.rows.insert(id, portal.clone());
        Ok(portal)
    }

    async fn get(&self, id: i64) -> Result<Option<OnboardingPortal>, AppError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn list(
        &self,
        vendor_id: Option<i64>,
        page: PageRequest,
    ) -> Result<(Vec<OnboardingPortal>, u64), AppError> {
        let table = self.table.read().await;
        let matches: Vec<OnboardingPortal> = table
            .rows
            .values()
            .rev()
            .filter(|p| vendor_id.map_or(true, |v| p.vendor_id == v))
            .cloned()
            .collect();
        let total = matches.len() as u64;
        Ok((paginate(&matches, page), total))
    }

    async fn update(&self, portal: OnboardingPortal) -> Result<Option<OnboardingPortal>, AppError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&portal.vendor_onboarding_portal_id) {
            Some(existing) => {
                *existing = portal.clone();
                Ok(Some(portal))
            }
            None => Ok(None),
        }
    }

    async fn cancellation_charges_for_vendor(
        &self,
        vendor_id: i64,
    ) -> Result<Option<BigDecimal>, AppError> {
        let table = self.table.read().await;
        Ok(table
            .rows
            .values()
            .rev()
            .find(|p| p.vendor_id == vendor_id && p.status)
            .and_then(|p| p.cancellation_charges.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookingSchedule;

    fn new_booking(vendor_id: i64, status: BookingStatus) -> NewBooking {
        let day = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        NewBooking {
            vendor_id: Some(vendor_id),
            status,
            amount: Some(BigDecimal::from(100)),
            cancellation_charges_percentage: None,
            cancellation_fee: None,
            schedule: BookingSchedule {
                date_start: day,
                end_date: day,
                start_time: "10:00".to_string(),
                end_time: "12:00".to_string(),
            },
            event_details: None,
            categories: Vec::new(),
            created_by: None,
            transaction_id: None,
        }
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let repo = MemoryBookingRepository::default();
        let booking = repo.insert(new_booking(1, BookingStatus::Pending)).await.unwrap();

        let cancel = BookingTransition::Cancel { reason: None };
        assert!(repo
            .transition(booking.vendor_booking_id, cancel.clone())
            .await
            .unwrap()
            .is_none());

        let confirmed = repo
            .transition(
                booking.vendor_booking_id,
                BookingTransition::Confirm {
                    transaction_id: "pi_1".to_string(),
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(confirmed.status, BookingStatus::Confirmed);
        assert_eq!(confirmed.transaction_id.as_deref(), Some("pi_1"));

        let cancelled = repo
            .transition(booking.vendor_booking_id, cancel.clone())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);

        // Second cancel loses the race.
        assert!(repo
            .transition(booking.vendor_booking_id, cancel)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_paginates_newest_first() {
        let repo = MemoryBookingRepository::default();
        for _ in 0..3 {
            repo.insert(new_booking(1, BookingStatus::Pending)).await.unwrap();
        }
        repo.insert(new_booking(2, BookingStatus::Pending)).await.unwrap();

        let filter = BookingFilter {
            vendor_id: Some(1),
            status: None,
        };
        let (page, total) = repo
            .list(&filter, PageRequest { page: 1, limit: 2 })
            .await
            .unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].vendor_booking_id, 3);
    }

    #[tokio::test]
    async fn test_payment_consumed_once() {
        let repo = MemoryPaymentRepository::default();
        repo.insert(NewPayment {
            vendor_booking_id: 1,
            vendor_id: 1,
            purpose: PaymentPurpose::Reschedule,
            payment_intent_id: "pi_fee".to_string(),
            amount_cents: 500,
            currency: "usd".to_string(),
            status: PaymentStatus::Succeeded,
            payment_method_id: 1,
        })
        .await
        .unwrap();

        assert!(repo.consume("pi_fee").await.unwrap());
        assert!(!repo.consume("pi_fee").await.unwrap());
        assert!(!repo.consume("pi_missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_settled_payment_ignores_stale_status() {
        let repo = MemoryPaymentRepository::default();
        repo.insert(NewPayment {
            vendor_booking_id: 1,
            vendor_id: 1,
            purpose: PaymentPurpose::Booking,
            payment_intent_id: "pi_paid".to_string(),
            amount_cents: 10_000,
            currency: "usd".to_string(),
            status: PaymentStatus::Succeeded,
            payment_method_id: 1,
        })
        .await
        .unwrap();

        assert!(repo
            .update_status("pi_paid", PaymentStatus::Processing)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .latest_succeeded(1, PaymentPurpose::Booking)
            .await
            .unwrap()
            .is_some());

        let refunded = repo
            .update_status("pi_paid", PaymentStatus::Refunded)
            .await
            .unwrap();
        assert_eq!(refunded.map(|p| p.status), Some(PaymentStatus::Refunded));
        assert!(repo
            .update_status("pi_paid", PaymentStatus::Succeeded)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_refund_recorded_only_on_cancelled_booking() {
        let repo = MemoryBookingRepository::default();
        let booking = repo.insert(new_booking(1, BookingStatus::Confirmed)).await.unwrap();
        let id = booking.vendor_booking_id;

        assert!(repo
            .record_refund(id, BigDecimal::from(80))
            .await
            .unwrap()
            .is_none());

        let cancelled = repo
            .transition(id, BookingTransition::Cancel { reason: None })
            .await
            .unwrap()
            .unwrap();
        assert!(cancelled.refund_amount.is_none());

        let refunded = repo.record_refund(id, BigDecimal::from(80)).await.unwrap();
        assert_eq!(
            refunded.and_then(|b| b.refund_amount),
            Some(BigDecimal::from(80))
        );
    }
}
