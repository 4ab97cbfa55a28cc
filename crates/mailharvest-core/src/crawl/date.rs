//! Parsing of dates as the webmail UI displays them.
//!
//! The UI shows absolute dates in a handful of layouts, relative words for
//! recent messages, and a bare time for messages received today. Anything
//! unrecognized parses to `None`; an unknown date never stops a scan.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};

/// Absolute layouts, tried in order. Parsed values are at midnight.
const DATE_FORMATS: &[&str] = &["%b %d, %Y", "%d %b %Y", "%Y-%m-%d", "%m/%d/%Y"];

/// Time-of-day layouts used for messages received today.
const TIME_FORMATS: &[&str] = &["%H:%M", "%I:%M %p"];

/// Parses a UI date relative to `now`.
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use mailharvest_core::crawl::date::parse_ui_date;
///
/// let now = NaiveDate::from_ymd_opt(2025, 3, 10)
///     .and_then(|d| d.and_hms_opt(12, 0, 0))
///     .unwrap_or_default();
/// let parsed = parse_ui_date("Mar 3, 2025", now).map(|d| d.date());
/// assert_eq!(parsed, NaiveDate::from_ymd_opt(2025, 3, 3));
/// assert_eq!(parse_ui_date("sometime", now), None);
/// ```
#[must_use]
pub fn parse_ui_date(raw: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date.and_time(NaiveTime::MIN));
        }
    }

    let lower = text.to_lowercase();
    if lower.contains("yesterday") {
        return Some(now - TimeDelta::days(1));
    }
    if lower.contains("today") {
        return Some(now);
    }

    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return Some(now.date().and_time(time));
        }
    }

    month_day_this_year(text, now)
}

/// "Mar 3" style dates without a year: the most recent such day not after `now`.
fn month_day_this_year(text: &str, now: NaiveDateTime) -> Option<NaiveDateTime> {
    let year = now.year();
    let date = NaiveDate::parse_from_str(&format!("{text} {year}"), "%b %d %Y").ok()?;
    let date = if date > now.date() {
        NaiveDate::parse_from_str(&format!("{text} {}", year - 1), "%b %d %Y").ok()?
    } else {
        date
    };
    Some(date.and_time(NaiveTime::MIN))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_absolute_formats() {
        assert_eq!(parse_ui_date("Mar 3, 2025", now()), Some(midnight(2025, 3, 3)));
        assert_eq!(parse_ui_date("3 Mar 2025", now()), Some(midnight(2025, 3, 3)));
        assert_eq!(parse_ui_date("2025-03-03", now()), Some(midnight(2025, 3, 3)));
        assert_eq!(parse_ui_date("03/04/2025", now()), Some(midnight(2025, 3, 4)));
    }

    #[test]
    fn test_surrounding_whitespace() {
        assert_eq!(parse_ui_date("  2025-03-03\n", now()), Some(midnight(2025, 3, 3)));
    }

    #[test]
    fn test_relative_words() {
        assert_eq!(parse_ui_date("Today", now()), Some(now()));
        assert_eq!(
            parse_ui_date("Yesterday", now()),
            Some(now() - TimeDelta::days(1))
        );
    }

    #[test]
    fn test_time_of_day_is_today() {
        let expected = NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(9, 15, 0)
            .unwrap();
        assert_eq!(parse_ui_date("09:15", now()), Some(expected));
        assert_eq!(parse_ui_date("9:15 AM", now()), Some(expected));
    }

    #[test]
    fn test_month_day_without_year() {
        assert_eq!(parse_ui_date("Mar 1", now()), Some(midnight(2025, 3, 1)));
        assert_eq!(parse_ui_date("Dec 24", now()), Some(midnight(2024, 12, 24)));
    }

    #[test]
    fn test_unrecognized_is_none() {
        assert_eq!(parse_ui_date("", now()), None);
        assert_eq!(parse_ui_date("last week", now()), None);
        assert_eq!(parse_ui_date("2025-13-45", now()), None);
    }
}
