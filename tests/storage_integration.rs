use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::env;
use uuid::Uuid;

use vendor_bookings_api::core::lifecycle::BookingTransition;
use vendor_bookings_api::core::models::{
    BookingSchedule, BookingStatus, NewBooking, NewPayment, PaymentPurpose, PaymentStatus,
};
use vendor_bookings_api::db::Database;
use vendor_bookings_api::storage::Storage;

/// Integration smoke test for the Postgres repositories.
/// Marked ignored to avoid running against production by accident; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn booking_payment_round_trip_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = Database::new(&db_url).await?;
    let storage = Storage::postgres(db.pool.clone());

    // Far-future date per run so repeated runs never overlap.
    let day = NaiveDate::from_ymd_opt(2090, 1, 1).unwrap()
        + chrono::Duration::days((Uuid::new_v4().as_u128() % 3000) as i64);
    let vendor_id = (Uuid::new_v4().as_u128() % 1_000_000) as i64 + 1_000_000;

    let booking = storage
        .bookings
        .insert(NewBooking {
            vendor_id: Some(vendor_id),
            status: BookingStatus::Pending,
            amount: Some(BigDecimal::from(100)),
            cancellation_charges_percentage: Some(BigDecimal::from(20)),
            cancellation_fee: None,
            schedule: BookingSchedule {
                date_start: day,
                end_date: day,
                start_time: "18:00".to_string(),
                end_time: "22:00".to_string(),
            },
            event_details: None,
            categories: Vec::new(),
            created_by: None,
            transaction_id: None,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(booking.status, BookingStatus::Pending);

    let intent_id = format!("pi_smoke_{}", Uuid::new_v4().simple());
    storage
        .payments
        .insert(NewPayment {
            vendor_booking_id: booking.vendor_booking_id,
            vendor_id,
            purpose: PaymentPurpose::Booking,
            payment_intent_id: intent_id.clone(),
            amount_cents: 10_000,
            currency: "usd".to_string(),
            status: PaymentStatus::Succeeded,
            payment_method_id: 1,
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let confirm = || BookingTransition::Confirm {
        transaction_id: intent_id.clone(),
    };
    let confirmed = storage
        .bookings
        .transition(booking.vendor_booking_id, confirm())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(confirmed.map(|b| b.status), Some(BookingStatus::Confirmed));

    // Compare-and-set: a second confirm finds the booking no longer pending.
    let again = storage
        .bookings
        .transition(booking.vendor_booking_id, confirm())
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(again.is_none());

    // A late provider event cannot pull a settled payment back.
    let stale = storage
        .payments
        .update_status(&intent_id, PaymentStatus::Processing)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(stale.is_none());
    let refunded = storage
        .payments
        .update_status(&intent_id, PaymentStatus::Refunded)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(refunded.map(|p| p.status), Some(PaymentStatus::Refunded));

    let slots = storage
        .bookings
        .list_for_vendor_between(vendor_id, day, day)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(slots.len(), 1);

    Ok(())
}
