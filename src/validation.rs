use chrono::{DateTime, NaiveDate, NaiveTime};
use phonenumber::country::Id as CountryId;
use phonenumber::Mode;
use regex::Regex;
use std::sync::OnceLock;

use crate::errors::AppError;
use crate::models::BookingSchedule;

const FULL_DAY_START: &str = "00:00";
const FULL_DAY_END: &str = "23:59";

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        // RFC 5322 simplified: local@domain.tld
        Regex::new(
            r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
        )
        .expect("email regex is valid")
    })
}

fn ifsc_regex() -> &'static Regex {
    static IFSC: OnceLock<Regex> = OnceLock::new();
    IFSC.get_or_init(|| Regex::new(r"^[A-Z]{4}0[A-Z0-9]{6}$").expect("IFSC regex is valid"))
}

fn time_regex() -> &'static Regex {
    static TIME: OnceLock<Regex> = OnceLock::new();
    TIME.get_or_init(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("time regex is valid"))
}

/// Parses `YYYY-MM-DD` or a full RFC 3339 timestamp (date part is kept).
pub fn parse_date(raw: &str) -> Result<NaiveDate, AppError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(date);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .map_err(|_| AppError::BadRequest(format!("Invalid date '{}'", raw)))
}

/// Accepts `HH:MM` in 24-hour time.
pub fn parse_time(raw: &str) -> Result<NaiveTime, AppError> {
    let raw = raw.trim();
    if !time_regex().is_match(raw) {
        return Err(AppError::BadRequest(format!(
            "Invalid time '{}', expected HH:MM",
            raw
        )));
    }
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| AppError::BadRequest(format!("Invalid time '{}'", raw)))
}

pub fn is_full_day(start_time: &str, end_time: &str) -> bool {
    start_time == FULL_DAY_START && end_time == FULL_DAY_END
}

/// Builds a schedule from request fields.
///
/// A missing end date means a single-day booking. Single-day bookings need
/// `start_time < end_time`.
pub fn build_schedule(
    date_start: &str,
    end_date: Option<&str>,
    start_time: &str,
    end_time: &str,
) -> Result<BookingSchedule, AppError> {
    let start = parse_date(date_start)?;
    let end = match end_date {
        Some(raw) if !raw.trim().is_empty() => parse_date(raw)?,
        _ => start,
    };
    if end < start {
        return Err(AppError::BadRequest(
            "End date cannot be before start date".to_string(),
        ));
    }

    let from = parse_time(start_time)?;
    let to = parse_time(end_time)?;
    if start == end && from >= to {
        return Err(AppError::BadRequest(
            "Start time must be before end time".to_string(),
        ));
    }

    Ok(BookingSchedule {
        date_start: start,
        end_date: end,
        start_time: start_time.trim().to_string(),
        end_time: end_time.trim().to_string(),
    })
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    email.len() >= 5 && email_regex().is_match(email)
}

/// Normalizes a phone number to E.164.
///
/// Numbers without a `+` prefix are read as US numbers.
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    let raw = raw.trim();
    if raw.len() < 7 {
        return Err(AppError::BadRequest(format!("Phone '{}' is too short", raw)));
    }

    let country = if raw.starts_with('+') {
        None
    } else {
        Some(CountryId::US)
    };

    match phonenumber::parse(country, raw) {
        Ok(number) if phonenumber::is_valid(&number) => {
            let formatted = number.format().mode(Mode::E164).to_string();
            tracing::debug!("Valid phone: {} -> {}", raw, formatted);
            Ok(formatted)
        }
        Ok(_) => Err(AppError::BadRequest(format!("Invalid phone number '{}'", raw))),
        Err(e) => {
            tracing::warn!("Failed to parse phone '{}': {:?}", raw, e);
            Err(AppError::BadRequest(format!("Invalid phone number '{}'", raw)))
        }
    }
}

/// Indian Financial System Code: four letters, a zero, six alphanumerics.
pub fn is_valid_ifsc(code: &str) -> bool {
    ifsc_regex().is_match(code.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 20).unwrap();
        assert_eq!(parse_date("2025-06-20").unwrap(), expected);
        assert_eq!(parse_date("2025-06-20T00:00:00.000Z").unwrap(), expected);
        assert!(parse_date("20/06/2025").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert!(parse_time("00:00").is_ok());
        assert!(parse_time("23:59").is_ok());
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("9:30").is_err());
    }

    #[test]
    fn test_single_day_schedule_requires_ordered_times() {
        assert!(build_schedule("2025-06-20", None, "10:00", "12:00").is_ok());
        assert!(build_schedule("2025-06-20", None, "12:00", "10:00").is_err());
        assert!(build_schedule("2025-06-20", Some(""), "00:00", "23:59").is_ok());
    }

    #[test]
    fn test_multi_day_schedule() {
        let schedule =
            build_schedule("2025-06-20", Some("2025-06-22"), "00:00", "23:59").unwrap();
        assert_eq!(schedule.end_date, NaiveDate::from_ymd_opt(2025, 6, 22).unwrap());
        assert!(build_schedule("2025-06-22", Some("2025-06-20"), "00:00", "23:59").is_err());
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("vendor@example.com"));
        assert!(is_valid_email("dj.mike+events@beats.co.uk"));
        assert!(!is_valid_email("missing@domain"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("no spaces@example.com"));
    }

    #[test]
    fn test_phone_normalization() {
        assert_eq!(normalize_phone("(201) 555-0123").unwrap(), "+12015550123");
        assert_eq!(normalize_phone("+44 121 234 5678").unwrap(), "+441212345678");
        assert!(normalize_phone("123").is_err());
    }

    #[test]
    fn test_ifsc() {
        assert!(is_valid_ifsc("HDFC0001234"));
        assert!(!is_valid_ifsc("HDFC1001234"));
        assert!(!is_valid_ifsc("hdfc0001234"));
    }
}
