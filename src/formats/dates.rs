//! Feed date parsing.
//!
//! Feeds carry Excel serials, ISO dates, US and European slash dates, and
//! dotted/dashed day-first dates. Ambiguous slash dates are disambiguated
//! only by explicit source config; when in doubt, US. Excel serials are
//! never ambiguous.

use chrono::{Datelike, Duration, NaiveDate};

/// Excel serials are interpreted against the 1899-12-30 epoch. Only values
/// in this window are treated as dates; anything else is a plain number.
pub const EXCEL_SERIAL_MIN: i64 = 40_000;
pub const EXCEL_SERIAL_MAX: i64 = 70_000;

pub fn excel_epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1899, 12, 30).unwrap()
}

pub fn excel_serial_to_date(serial: i64) -> Option<NaiveDate> {
    if !(EXCEL_SERIAL_MIN..=EXCEL_SERIAL_MAX).contains(&serial) {
        return None;
    }
    excel_epoch().checked_add_signed(Duration::days(serial))
}

/// Does this cell look like an Excel serial date?
pub fn is_excel_serial(raw: &str) -> bool {
    raw.trim()
        .parse::<i64>()
        .ok()
        .map(|n| (EXCEL_SERIAL_MIN..=EXCEL_SERIAL_MAX).contains(&n))
        .unwrap_or(false)
}

fn parse_slash(s: &str, european: bool) -> Option<NaiveDate> {
    let parts: Vec<&str> = s.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let a: u32 = parts[0].trim().parse().ok()?;
    let b: u32 = parts[1].trim().parse().ok()?;
    let year_part = parts[2].trim();
    let year: i32 = match year_part.len() {
        2 => 2000 + year_part.parse::<i32>().ok()?,
        4 => year_part.parse().ok()?,
        _ => return None,
    };

    let (month, day) = if european { (b, a) } else { (a, b) };
    NaiveDate::from_ymd_opt(year, month, day)
        // A day > 12 in the month slot means the other order was intended.
        .or_else(|| NaiveDate::from_ymd_opt(year, day, month))
}

/// Parse any of the accepted feed date shapes. `european` prefers day-first
/// for ambiguous slash dates.
pub fn parse_date_flexible(raw: &str, european: bool) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(serial) = s.parse::<i64>() {
        return excel_serial_to_date(serial);
    }

    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d);
    }

    if s.contains('/') {
        return parse_slash(s, european);
    }

    // D.M.YYYY
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d.%m.%Y") {
        return Some(d);
    }

    // D-M-YYYY (ISO already tried above, so a leading 4-digit year is gone)
    if let Ok(d) = NaiveDate::parse_from_str(s, "%d-%m-%Y") {
        return Some(d);
    }

    None
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Human display form for stock-info messages, e.g. `January 5, 2026`.
pub fn format_long(date: NaiveDate) -> String {
    format!(
        "{} {}, {}",
        MONTH_NAMES[(date.month0()) as usize],
        date.day(),
        date.year()
    )
}

/// Reformat a day-first slash date to month-first. Leaves anything that is
/// not a parseable European slash date untouched.
pub fn european_to_us(raw: &str) -> String {
    if raw.contains('/') {
        if let Some(d) = parse_slash(raw.trim(), true) {
            return format!("{}/{}/{}", d.month(), d.day(), d.year());
        }
    }
    raw.to_string()
}

/// Loose check used by row-shape state machines: does this cell hold a date?
pub fn looks_like_date(raw: &str) -> bool {
    parse_date_flexible(raw, false).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excel_serial_epoch_math() {
        // 45292 = 2024-01-01
        assert_eq!(
            excel_serial_to_date(45292),
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
        assert_eq!(excel_serial_to_date(100), None);
        assert_eq!(excel_serial_to_date(99_999), None);
    }

    #[test]
    fn iso_and_us_dates() {
        assert_eq!(
            parse_date_flexible("2026-03-24", false),
            NaiveDate::from_ymd_opt(2026, 3, 24)
        );
        assert_eq!(
            parse_date_flexible("3/24/2026", false),
            NaiveDate::from_ymd_opt(2026, 3, 24)
        );
        assert_eq!(
            parse_date_flexible("3/5/26", false),
            NaiveDate::from_ymd_opt(2026, 3, 5)
        );
    }

    #[test]
    fn european_dates() {
        assert_eq!(
            parse_date_flexible("24/03/2026", true),
            NaiveDate::from_ymd_opt(2026, 3, 24)
        );
        // Day > 12 disambiguates even when US order was requested.
        assert_eq!(
            parse_date_flexible("24/03/2026", false),
            NaiveDate::from_ymd_opt(2026, 3, 24)
        );
        assert_eq!(
            parse_date_flexible("15.07.2026", false),
            NaiveDate::from_ymd_opt(2026, 7, 15)
        );
        assert_eq!(
            parse_date_flexible("15-07-2026", false),
            NaiveDate::from_ymd_opt(2026, 7, 15)
        );
    }

    #[test]
    fn european_to_us_reformat() {
        assert_eq!(european_to_us("24/03/2026"), "3/24/2026");
        assert_eq!(european_to_us("not a date"), "not a date");
    }

    #[test]
    fn long_format() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 5).unwrap();
        assert_eq!(format_long(d), "January 5, 2026");
    }
}
