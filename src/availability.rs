//! Vendor calendar conflict checks.

use crate::models::{BookingSchedule, BookingStatus, VendorBooking};
use crate::validation::is_full_day;

fn minutes(time: &str) -> Option<u32> {
    let (h, m) = time.split_once(':')?;
    Some(h.parse::<u32>().ok()? * 60 + m.parse::<u32>().ok()?)
}

fn is_single_day(schedule: &BookingSchedule) -> bool {
    schedule.date_start == schedule.end_date
}

/// Date ranges are inclusive on both ends.
pub fn dates_overlap(a: &BookingSchedule, b: &BookingSchedule) -> bool {
    a.date_start <= b.end_date && a.end_date >= b.date_start
}

/// Half-open time windows: `10:00-11:00` does not overlap `11:00-12:00`.
pub fn times_overlap(a: &BookingSchedule, b: &BookingSchedule) -> bool {
    match (
        minutes(&a.start_time),
        minutes(&a.end_time),
        minutes(&b.start_time),
        minutes(&b.end_time),
    ) {
        (Some(a_start), Some(a_end), Some(b_start), Some(b_end)) => {
            a_start < b_end && a_end > b_start
        }
        // Unparseable windows block the whole day.
        _ => true,
    }
}

/// Whether `candidate` cannot coexist with `existing` on one vendor calendar.
///
/// Hourly bookings on the same single day only clash when their time windows
/// overlap; anything involving a full or multi-day booking clashes on any
/// shared date.
pub fn conflicts(candidate: &BookingSchedule, existing: &BookingSchedule) -> bool {
    if !dates_overlap(candidate, existing) {
        return false;
    }

    let hourly = |s: &BookingSchedule| is_single_day(s) && !is_full_day(&s.start_time, &s.end_time);
    if hourly(candidate) && hourly(existing) {
        return times_overlap(candidate, existing);
    }
    true
}

/// First non-cancelled booking that clashes with `candidate`, skipping the
/// booking being moved.
pub fn find_conflict<'a>(
    candidate: &BookingSchedule,
    bookings: &'a [VendorBooking],
    ignore_booking_id: Option<i64>,
) -> Option<&'a VendorBooking> {
    bookings.iter().find(|b| {
        b.status != BookingStatus::Cancelled
            && Some(b.vendor_booking_id) != ignore_booking_id
            && conflicts(candidate, &b.schedule)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn schedule(start: (u32, u32), end: (u32, u32), from: &str, to: &str) -> BookingSchedule {
        BookingSchedule {
            date_start: NaiveDate::from_ymd_opt(2025, start.0, start.1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, end.0, end.1).unwrap(),
            start_time: from.to_string(),
            end_time: to.to_string(),
        }
    }

    #[test]
    fn test_adjacent_hourly_slots_do_not_conflict() {
        let a = schedule((6, 20), (6, 20), "10:00", "11:00");
        let b = schedule((6, 20), (6, 20), "11:00", "12:00");
        assert!(!conflicts(&a, &b));
    }

    #[test]
    fn test_overlapping_hourly_slots_conflict() {
        let a = schedule((6, 20), (6, 20), "10:00", "12:00");
        let b = schedule((6, 20), (6, 20), "11:30", "13:00");
        assert!(conflicts(&a, &b));
    }

    #[test]
    fn test_full_day_blocks_hourly() {
        let full = schedule((6, 20), (6, 20), "00:00", "23:59");
        let hourly = schedule((6, 20), (6, 20), "18:00", "19:00");
        assert!(conflicts(&full, &hourly));
        assert!(conflicts(&hourly, &full));
    }

    #[test]
    fn test_multi_day_range_overlap() {
        let multi = schedule((6, 19), (6, 21), "00:00", "23:59");
        let inside = schedule((6, 21), (6, 21), "09:00", "10:00");
        let after = schedule((6, 22), (6, 22), "09:00", "10:00");
        assert!(conflicts(&multi, &inside));
        assert!(!conflicts(&multi, &after));
    }
}
