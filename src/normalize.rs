//! Resolves loosely named JSON payloads into typed records.
//!
//! Booking exports and payment provider responses name the same field in
//! several ways (`Vendor_Booking_id`, `vendor_event_book_id`, `_id`, ...).
//! The fallback chains live here and nowhere else.

use bigdecimal::BigDecimal;
use serde_json::Value;
use std::str::FromStr;

use crate::models::{
    BookedBy, BookingStatus, EventDetails, NewBooking, TransactionDetails, VendorCategory,
};
use crate::validation::build_schedule;

pub const BOOKING_ID_KEYS: &[&str] = &[
    "Vendor_Booking_id",
    "vendor_event_book_id",
    "vendor_booking_id",
    "_id",
];
pub const VENDOR_ID_KEYS: &[&str] = &["vendor_id", "Vendor_id", "vendorId"];
pub const AMOUNT_KEYS: &[&str] = &["amount", "vendor_price", "vendor_amount", "transaction_amount"];
pub const FEE_PERCENTAGE_KEYS: &[&str] = &[
    "cancellation_charges_percentage",
    "cancellation_fee_percentage",
    "cancellation_percentage",
    "CancellationCharges",
];
pub const FLAT_FEE_KEYS: &[&str] = &[
    "cancellation_fee",
    "cancellation_charge_amount",
    "cancellation_charges",
];
const STATUS_KEYS: &[&str] = &["vender_booking_status", "vendor_booking_status", "status"];

/// First key present with a non-null, non-empty value.
pub fn first_value<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| match value.get(*key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(v) => Some(v),
    })
}

/// Integer from a number or a numeric string. Non-numeric ids (document
/// store object ids) are skipped so the chain can keep looking.
pub fn first_i64(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    })
}

pub fn first_str<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    })
}

pub fn first_decimal(value: &Value, keys: &[&str]) -> Option<BigDecimal> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Number(n) => BigDecimal::from_str(&n.to_string()).ok(),
        Value::String(s) => BigDecimal::from_str(s.trim()).ok(),
        _ => None,
    })
}

pub fn resolve_booking_id(value: &Value) -> Option<i64> {
    first_i64(value, BOOKING_ID_KEYS)
}

pub fn resolve_vendor_id(value: &Value) -> Option<i64> {
    first_i64(value, VENDOR_ID_KEYS)
}

pub fn resolve_amount(value: &Value) -> Option<BigDecimal> {
    first_decimal(value, AMOUNT_KEYS)
}

/// Builds a booking from a legacy export record.
///
/// Returns the resolved legacy id (if any) alongside the record so callers can
/// report which source row produced which booking.
pub fn legacy_booking(value: &Value) -> Result<(Option<i64>, NewBooking), String> {
    let date_start = first_str(value, &["Date_start", "dateFrom", "date_start"])
        .ok_or_else(|| "missing start date".to_string())?;
    let end_date = first_str(value, &["End_date", "dateTo", "end_date"]);
    let start_time = first_str(value, &["Start_time", "timeFrom", "start_time"]).unwrap_or("00:00");
    let end_time = first_str(value, &["End_time", "timeTo", "end_time"]).unwrap_or("23:59");

    let schedule = build_schedule(date_start, end_date, start_time, end_time)
        .map_err(|e| e.to_string())?;

    let status = match first_str(value, STATUS_KEYS) {
        Some(raw) => raw.parse::<BookingStatus>()?,
        None => BookingStatus::Pending,
    };

    let event_details = value
        .get("event_details")
        .filter(|v| v.is_object())
        .map(|details| EventDetails {
            name_title: first_str(details, &["name_title", "title"]).map(String::from),
            venue_name: first_str(details, &["venue_name", "venue"]).map(String::from),
            max_capacity: first_i64(details, &["max_capacity", "maxCapacity"])
                .and_then(|c| i32::try_from(c).ok()),
        })
        .or_else(|| {
            first_str(value, &["event_name"]).map(|name| EventDetails {
                name_title: Some(name.to_string()),
                venue_name: first_str(value, &["event_address"]).map(String::from),
                max_capacity: first_i64(value, &["no_of_guests"])
                    .and_then(|c| i32::try_from(c).ok()),
            })
        });

    let categories = value
        .get("vendor_category_details")
        .or_else(|| value.get("categories"))
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|c| {
                    Some(VendorCategory {
                        category_id: first_i64(c, &["category_id", "id"])?,
                        category_name: first_str(c, &["category_name", "name"])?.to_string(),
                        emoji: first_str(c, &["emozi", "emoji"]).map(String::from),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let created_by = value
        .get("created_by_details")
        .and_then(|d| {
            Some(BookedBy {
                user_id: first_i64(d, &["user_id", "id"])?,
                name: first_str(d, &["name"]).unwrap_or_default().to_string(),
                email: first_str(d, &["email"]).map(String::from),
            })
        });

    let transaction_id = first_str(value, &["transaction_id", "payment_intent_id"])
        .map(String::from);

    Ok((
        resolve_booking_id(value),
        NewBooking {
            vendor_id: resolve_vendor_id(value),
            status,
            amount: resolve_amount(value),
            cancellation_charges_percentage: first_decimal(value, FEE_PERCENTAGE_KEYS),
            cancellation_fee: first_decimal(value, FLAT_FEE_KEYS),
            schedule,
            event_details,
            categories,
            created_by,
            transaction_id,
        },
    ))
}

/// Pulls transaction details out of a payment payload.
///
/// Accepts the intent itself, `{paymentIntent: {...}}`, `{data: {...}}` or
/// `{data: {paymentIntent: {...}}}`.
pub fn extract_transaction_details(value: &Value) -> Option<TransactionDetails> {
    let candidates = [
        value.pointer("/data/data/paymentIntent"),
        value.pointer("/data/paymentIntent"),
        value.get("paymentIntent"),
        value.get("payment_intent").filter(|v| v.is_object()),
        value.get("data").filter(|v| v.is_object()),
        Some(value),
    ];

    candidates.into_iter().flatten().find_map(|intent| {
        let id = first_str(intent, &["id", "payment_intent_id", "transaction_id", "paymentIntentId"])?;
        Some(TransactionDetails {
            id: id.to_string(),
            amount_cents: first_i64(intent, &["amount", "amount_received", "amount_cents"]),
            currency: first_str(intent, &["currency"]).map(|c| c.to_lowercase()),
            status: first_str(intent, &["status", "payment_status", "transaction_status"])
                .map(String::from),
            client_secret: first_str(intent, &["client_secret", "clientSecret"]).map(String::from),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_booking_id_fallback_chain() {
        assert_eq!(resolve_booking_id(&json!({"Vendor_Booking_id": 7})), Some(7));
        assert_eq!(resolve_booking_id(&json!({"vendor_event_book_id": "8"})), Some(8));
        assert_eq!(
            resolve_booking_id(&json!({"_id": "65a1f0c2e4b0", "vendor_booking_id": 9})),
            Some(9)
        );
        assert_eq!(resolve_booking_id(&json!({"_id": "65a1f0c2e4b0"})), None);
    }

    #[test]
    fn test_vendor_and_amount_resolution() {
        let v = json!({"Vendor_id": 4, "vendor_price": "250.5"});
        assert_eq!(resolve_vendor_id(&v), Some(4));
        assert_eq!(resolve_amount(&v), Some(BigDecimal::from_str("250.5").unwrap()));

        let v = json!({"vendorId": null, "vendor_id": "", "transaction_amount": 99});
        assert_eq!(resolve_vendor_id(&v), None);
        assert_eq!(resolve_amount(&v), Some(BigDecimal::from(99)));
    }

    #[test]
    fn test_legacy_booking_record() {
        let record = json!({
            "_id": "65a1f0c2e4b0",
            "Vendor_Booking_id": 42,
            "Vendor_id": 3,
            "vender_booking_status": "Confirmed",
            "vendor_price": 120,
            "CancellationCharges": 15,
            "Date_start": "2025-06-20T00:00:00.000Z",
            "End_date": "2025-06-20T00:00:00.000Z",
            "Start_time": "18:00",
            "End_time": "22:00",
            "event_details": {"name_title": "Birthday", "venue_name": "Rooftop", "max_capacity": 50},
            "vendor_category_details": [{"category_id": 1, "category_name": "DJ", "emozi": "🎧"}],
            "created_by_details": {"user_id": 11, "name": "Jordan", "email": "jordan@example.com"}
        });

        let (legacy_id, booking) = legacy_booking(&record).unwrap();
        assert_eq!(legacy_id, Some(42));
        assert_eq!(booking.vendor_id, Some(3));
        assert_eq!(booking.status, BookingStatus::Confirmed);
        assert_eq!(booking.amount, Some(BigDecimal::from(120)));
        assert_eq!(
            booking.cancellation_charges_percentage,
            Some(BigDecimal::from(15))
        );
        assert_eq!(booking.schedule.start_time, "18:00");
        assert_eq!(booking.categories.len(), 1);
        assert_eq!(booking.created_by.unwrap().user_id, 11);
    }

    #[test]
    fn test_legacy_booking_requires_start_date() {
        assert!(legacy_booking(&json!({"Vendor_id": 3})).is_err());
    }

    #[test]
    fn test_transaction_details_nested_shapes() {
        let nested = json!({"data": {"data": {"paymentIntent": {
            "id": "pi_123", "amount": 10000, "currency": "USD", "status": "succeeded",
            "client_secret": "pi_123_secret"
        }}}});
        let details = extract_transaction_details(&nested).unwrap();
        assert_eq!(details.id, "pi_123");
        assert_eq!(details.amount_cents, Some(10_000));
        assert_eq!(details.currency.as_deref(), Some("usd"));

        let flat = json!({"id": "pi_9", "status": "processing"});
        assert_eq!(extract_transaction_details(&flat).unwrap().id, "pi_9");

        assert!(extract_transaction_details(&json!({"message": "ok"})).is_none());
    }
}
