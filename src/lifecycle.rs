//! Booking lifecycle rules.
//!
//! A booking moves `pending -> confirmed` when paid, may be rescheduled while
//! `confirmed`, and ends in `cancelled`. Every mutation is expressed as a
//! [`BookingTransition`] so the store can apply it as a compare-and-set on
//! the status it expects.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::AppError;
use crate::models::{BookingSchedule, BookingStatus};

/// What a client may do with a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookingAction {
    Pay,
    Reschedule,
    Cancel,
}

impl BookingAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingAction::Pay => "pay",
            BookingAction::Reschedule => "reschedule",
            BookingAction::Cancel => "cancel",
        }
    }

    /// Status a booking must be in for this action.
    pub fn required_status(&self) -> BookingStatus {
        match self {
            BookingAction::Pay => BookingStatus::Pending,
            BookingAction::Reschedule | BookingAction::Cancel => BookingStatus::Confirmed,
        }
    }
}

/// Actions offered for a booking in `status`.
pub fn available_actions(status: BookingStatus) -> Vec<BookingAction> {
    match status {
        BookingStatus::Pending => vec![BookingAction::Pay],
        BookingStatus::Confirmed => vec![BookingAction::Reschedule, BookingAction::Cancel],
        BookingStatus::Cancelled => Vec::new(),
    }
}

/// Rejects `action` unless the booking is in the status it requires.
pub fn ensure_allowed(
    booking_id: i64,
    status: BookingStatus,
    action: BookingAction,
) -> Result<(), AppError> {
    if status == action.required_status() {
        return Ok(());
    }

    tracing::warn!(
        "Rejected {} on booking {} (status {})",
        action.as_str(),
        booking_id,
        status
    );

    Err(AppError::Conflict(format!(
        "Booking {} is {}; {} is only allowed for {} bookings",
        booking_id,
        status,
        action.as_str(),
        action.required_status()
    )))
}

/// A state change applied to a stored booking.
#[derive(Debug, Clone)]
pub enum BookingTransition {
    /// Payment succeeded.
    Confirm { transaction_id: String },
    /// Move a confirmed booking to a new slot.
    Reschedule {
        schedule: BookingSchedule,
        reason: Option<String>,
    },
    /// Cancel a confirmed booking. Any refund is recorded separately once
    /// the provider has issued it.
    Cancel { reason: Option<String> },
}

impl BookingTransition {
    pub fn action(&self) -> BookingAction {
        match self {
            BookingTransition::Confirm { .. } => BookingAction::Pay,
            BookingTransition::Reschedule { .. } => BookingAction::Reschedule,
            BookingTransition::Cancel { .. } => BookingAction::Cancel,
        }
    }

    /// Status the booking must currently hold.
    pub fn expected_status(&self) -> BookingStatus {
        self.action().required_status()
    }

    /// Status after the transition.
    pub fn target_status(&self) -> BookingStatus {
        match self {
            BookingTransition::Confirm { .. } | BookingTransition::Reschedule { .. } => {
                BookingStatus::Confirmed
            }
            BookingTransition::Cancel { .. } => BookingStatus::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_pending_offers_only_pay() {
        assert_eq!(
            available_actions(BookingStatus::Pending),
            vec![BookingAction::Pay]
        );
    }

    #[test]
    fn test_confirmed_offers_reschedule_and_cancel() {
        let actions = available_actions(BookingStatus::Confirmed);
        assert!(actions.contains(&BookingAction::Reschedule));
        assert!(actions.contains(&BookingAction::Cancel));
        assert!(!actions.contains(&BookingAction::Pay));
    }

    #[test]
    fn test_cancelled_is_terminal() {
        assert!(available_actions(BookingStatus::Cancelled).is_empty());
        for action in [
            BookingAction::Pay,
            BookingAction::Reschedule,
            BookingAction::Cancel,
        ] {
            assert!(ensure_allowed(1, BookingStatus::Cancelled, action).is_err());
        }
    }

    #[test]
    fn test_pay_and_cancel_are_mutually_exclusive() {
        assert!(ensure_allowed(1, BookingStatus::Pending, BookingAction::Pay).is_ok());
        assert!(ensure_allowed(1, BookingStatus::Pending, BookingAction::Cancel).is_err());
        assert!(ensure_allowed(1, BookingStatus::Confirmed, BookingAction::Pay).is_err());
        assert!(ensure_allowed(1, BookingStatus::Confirmed, BookingAction::Cancel).is_ok());
    }

    #[test]
    fn test_transition_statuses() {
        let confirm = BookingTransition::Confirm {
            transaction_id: "pi_1".to_string(),
        };
        assert_eq!(confirm.expected_status(), BookingStatus::Pending);
        assert_eq!(confirm.target_status(), BookingStatus::Confirmed);

        let day = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        let reschedule = BookingTransition::Reschedule {
            schedule: BookingSchedule {
                date_start: day,
                end_date: day,
                start_time: "10:00".to_string(),
                end_time: "12:00".to_string(),
            },
            reason: None,
        };
        assert_eq!(reschedule.expected_status(), BookingStatus::Confirmed);
        assert_eq!(reschedule.target_status(), BookingStatus::Confirmed);

        let cancel = BookingTransition::Cancel {
            reason: Some("Venue closed".to_string()),
        };
        assert_eq!(cancel.expected_status(), BookingStatus::Confirmed);
        assert_eq!(cancel.target_status(), BookingStatus::Cancelled);
    }
}
