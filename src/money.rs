//! Money formatting and cancellation fee math.
//!
//! Amounts are decimal dollars with two places; provider calls use cents.

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use serde_json::Value;
use std::str::FromStr;

use crate::models::VendorBooking;

/// Rounds to cents, half up.
pub fn round_cents(value: &BigDecimal) -> BigDecimal {
    value.with_scale_round(2, RoundingMode::HalfUp)
}

/// `$12.50` for `12.5`, `-` when the amount is unknown.
pub fn format_money(value: Option<&BigDecimal>) -> String {
    match value {
        None => "-".to_string(),
        Some(v) => {
            let rounded = round_cents(v);
            if rounded < BigDecimal::from(0) {
                format!("-${}", round_cents(&(-v.clone())))
            } else {
                format!("${}", rounded)
            }
        }
    }
}

/// Formats a loosely typed JSON value the same way.
///
/// `null` and `""` render as `-`; strings that are not numbers come back as-is.
pub fn format_money_value(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) if s.trim().is_empty() => "-".to_string(),
        Value::String(s) => match BigDecimal::from_str(s.trim()) {
            Ok(n) => format_money(Some(&n)),
            Err(_) => s.clone(),
        },
        Value::Number(n) => match BigDecimal::from_str(&n.to_string()) {
            Ok(n) => format_money(Some(&n)),
            Err(_) => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Dollars to whole cents. `None` when the value does not fit an `i64`.
pub fn to_cents(amount: &BigDecimal) -> Option<i64> {
    (amount * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
}

pub fn from_cents(cents: i64) -> BigDecimal {
    (BigDecimal::from(cents) / BigDecimal::from(100)).with_scale(2)
}

/// How the cancellation fee of a booking is computed.
#[derive(Debug, Clone, PartialEq)]
pub enum FeePolicy {
    /// Percentage of the booking amount.
    Percentage(BigDecimal),
    /// Flat amount, capped at the booking amount.
    Flat(BigDecimal),
    /// No fee data anywhere.
    Unknown,
}

/// Picks the fee policy for a booking: booking percentage, then booking flat
/// fee, then the vendor's onboarding percentage.
pub fn resolve_fee_policy(
    booking: &VendorBooking,
    vendor_percentage: Option<&BigDecimal>,
) -> FeePolicy {
    if let Some(pct) = &booking.cancellation_charges_percentage {
        return FeePolicy::Percentage(pct.clone());
    }
    if let Some(fee) = &booking.cancellation_fee {
        return FeePolicy::Flat(fee.clone());
    }
    match vendor_percentage {
        Some(pct) => FeePolicy::Percentage(pct.clone()),
        None => FeePolicy::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CancellationBreakdown {
    pub original: Option<BigDecimal>,
    pub fee: Option<BigDecimal>,
    pub refund: Option<BigDecimal>,
}

pub fn cancellation_breakdown(
    amount: Option<&BigDecimal>,
    policy: &FeePolicy,
) -> CancellationBreakdown {
    let Some(amount) = amount else {
        return CancellationBreakdown {
            original: None,
            fee: None,
            refund: None,
        };
    };

    let zero = BigDecimal::from(0);
    let hundred = BigDecimal::from(100);
    let amount = if *amount < zero { zero.clone() } else { amount.clone() };

    let fee = match policy {
        FeePolicy::Percentage(pct) => {
            let pct = if *pct < zero {
                zero.clone()
            } else if *pct > hundred {
                hundred.clone()
            } else {
                pct.clone()
            };
            Some(round_cents(&(&amount * &pct / &hundred)))
        }
        FeePolicy::Flat(flat) => {
            let flat = if *flat < zero { zero.clone() } else { flat.clone() };
            Some(round_cents(if flat > amount { &amount } else { &flat }))
        }
        FeePolicy::Unknown => None,
    };

    let refund = fee.as_ref().map(|fee| {
        let refund = &amount - fee;
        if refund < zero {
            round_cents(&zero)
        } else {
            round_cents(&refund)
        }
    });

    CancellationBreakdown {
        original: Some(round_cents(&amount)),
        fee,
        refund,
    }
}

/// Refund estimate shown before cancelling: formatted refund or `Unknown`.
pub fn refund_estimate(breakdown: &CancellationBreakdown) -> String {
    match &breakdown.refund {
        Some(refund) => format_money(Some(refund)),
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(Some(&dec("12.5"))), "$12.50");
        assert_eq!(format_money(Some(&dec("80"))), "$80.00");
        assert_eq!(format_money(Some(&dec("0.005"))), "$0.01");
        assert_eq!(format_money(Some(&dec("-4.5"))), "-$4.50");
        assert_eq!(format_money(None), "-");
    }

    #[test]
    fn test_format_money_value() {
        assert_eq!(format_money_value(&json!(12.5)), "$12.50");
        assert_eq!(format_money_value(&json!("99")), "$99.00");
        assert_eq!(format_money_value(&json!(null)), "-");
        assert_eq!(format_money_value(&json!("")), "-");
        assert_eq!(format_money_value(&json!("TBD")), "TBD");
    }

    #[test]
    fn test_cents_conversion() {
        assert_eq!(to_cents(&dec("100")), Some(10_000));
        assert_eq!(to_cents(&dec("12.345")), Some(1_235));
        assert_eq!(from_cents(500), dec("5.00"));
        assert_eq!(format_money(Some(&from_cents(500))), "$5.00");
    }

    #[test]
    fn test_percentage_breakdown() {
        let breakdown =
            cancellation_breakdown(Some(&dec("100")), &FeePolicy::Percentage(dec("20")));
        assert_eq!(breakdown.fee, Some(dec("20.00")));
        assert_eq!(breakdown.refund, Some(dec("80.00")));
        assert_eq!(refund_estimate(&breakdown), "$80.00");
    }

    #[test]
    fn test_flat_fee_is_capped_at_amount() {
        let breakdown = cancellation_breakdown(Some(&dec("30")), &FeePolicy::Flat(dec("50")));
        assert_eq!(breakdown.fee, Some(dec("30.00")));
        assert_eq!(breakdown.refund, Some(dec("0.00")));
    }

    #[test]
    fn test_unknown_policy_estimate() {
        let breakdown = cancellation_breakdown(Some(&dec("100")), &FeePolicy::Unknown);
        assert_eq!(breakdown.original, Some(dec("100.00")));
        assert_eq!(breakdown.fee, None);
        assert_eq!(refund_estimate(&breakdown), "Unknown");

        let breakdown = cancellation_breakdown(None, &FeePolicy::Percentage(dec("10")));
        assert_eq!(breakdown.original, None);
        assert_eq!(refund_estimate(&breakdown), "Unknown");
    }
}
