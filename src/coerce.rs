//! Cell coercion: raw cells to typed values or an absent marker.
//!
//! Absence is always `None`. What absence means for a field (NULL, empty
//! string, a sentinel, or a dropped row) is decided by the reader.

use crate::entity::RowError;
use crate::table::Cell;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Weekday labels, Monday first.
pub const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Substituted for postal codes that are missing or not numeric.
pub const UNKNOWN_POSTAL_CODE: &str = "0";

const DAY_FIRST_FORMATS: [&str; 2] = ["%d/%m/%y", "%d/%m/%Y"];
const ISO_OFFSET_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"];
const ISO_DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

fn whitespace() -> &'static Regex {
    static WHITESPACE: OnceLock<Regex> = OnceLock::new();
    WHITESPACE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// A numeric cell value, passed through as read.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Int(i64),
    Float(f64),
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Numeric::Int(i) => write!(f, "{}", i),
            Numeric::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Collapse every run of whitespace to one space and trim the ends.
pub fn collapse_whitespace(value: &str) -> String {
    whitespace().replace_all(value, " ").trim().to_string()
}

/// Whitespace-collapsed text, `None` for blank cells.
pub fn clean_text(cell: &Cell) -> Option<String> {
    if cell.is_blank() {
        return None;
    }
    Some(collapse_whitespace(&cell.to_string()))
}

/// Trimmed text of an identifier-like cell (ids, codes); empty when blank.
pub fn identifier(cell: &Cell) -> String {
    cell.to_string().trim().to_string()
}

/// Numeric value of a cell, `None` for blank, non-numeric or non-finite input.
pub fn nullable_number(cell: &Cell) -> Option<Numeric> {
    match cell {
        Cell::Int(i) => Some(Numeric::Int(*i)),
        Cell::Float(v) if v.is_finite() => Some(Numeric::Float(*v)),
        Cell::Text(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Some(Numeric::Int(i));
            }
            s.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Numeric::Float)
        }
        _ => None,
    }
}

/// Integer value of a cell. Fractional values are truncated.
pub fn integer(cell: &Cell) -> Option<i64> {
    match nullable_number(cell)? {
        Numeric::Int(i) => Some(i),
        Numeric::Float(v) => Some(v.trunc() as i64),
    }
}

/// Parse a date cell.
///
/// Spreadsheet date cells are taken as-is. Text is tried as day/month/year
/// (two-digit year first), then as an ISO date or date-time, with or without
/// a UTC offset.
pub fn parse_date(cell: &Cell) -> Result<NaiveDateTime, RowError> {
    let raw = match cell {
        Cell::DateTime(dt) => return Ok(*dt),
        Cell::Text(s) => s.trim(),
        other => {
            return Err(RowError::InvalidDate {
                raw: other.to_string(),
            })
        }
    };

    let midnight = |date: NaiveDate| date.and_time(NaiveTime::MIN);

    for format in DAY_FIRST_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Ok(midnight(date));
        }
    }
    for format in ISO_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(dt);
        }
    }
    for format in ISO_OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Ok(dt.naive_local());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(midnight(date));
    }

    Err(RowError::InvalidDate {
        raw: raw.to_string(),
    })
}

/// Three-letter English day name ("Mon" .. "Sun").
pub fn weekday_label(date: NaiveDate) -> &'static str {
    WEEKDAY_LABELS[date.weekday().num_days_from_monday() as usize]
}

/// Postal code kept as trimmed text when it is an integer once spaces are
/// removed, otherwise [`UNKNOWN_POSTAL_CODE`].
pub fn postal_code(cell: &Cell) -> String {
    let code = identifier(cell);
    if code.is_empty() || code.replace(' ', "").parse::<i64>().is_err() {
        return UNKNOWN_POSTAL_CODE.to_string();
    }
    code
}

/// Street number as text; blank and `-` mean no number.
pub fn street_number(cell: &Cell) -> Option<String> {
    let number = identifier(cell);
    if number.is_empty() || number == "-" {
        None
    } else {
        Some(number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::text(s)
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Agia \t Sofia\n "), "Agia Sofia");
        assert_eq!(clean_text(&text("   ")), None);
        assert_eq!(clean_text(&Cell::Empty), None);
        assert_eq!(clean_text(&text(" Kentro  ")), Some("Kentro".to_string()));
    }

    #[test]
    fn test_nullable_number() {
        assert_eq!(nullable_number(&Cell::Float(12.3)), Some(Numeric::Float(12.3)));
        assert_eq!(nullable_number(&Cell::Int(7)), Some(Numeric::Int(7)));
        assert_eq!(nullable_number(&text(" 4.5 ")), Some(Numeric::Float(4.5)));
        assert_eq!(nullable_number(&text("18")), Some(Numeric::Int(18)));
        assert_eq!(nullable_number(&Cell::Empty), None);
        assert_eq!(nullable_number(&text("   ")), None);
        assert_eq!(nullable_number(&text("n/a")), None);
        assert_eq!(nullable_number(&Cell::Float(f64::NAN)), None);
        assert_eq!(nullable_number(&text("nan")), None);
    }

    #[test]
    fn test_numeric_passes_through() {
        assert_eq!(Numeric::Float(12.3).to_string(), "12.3");
        assert_eq!(Numeric::Float(0.125).to_string(), "0.125");
        assert_eq!(Numeric::Int(-4).to_string(), "-4");
    }

    #[test]
    fn test_date_formats_agree() {
        let day_first = parse_date(&text("15/03/24")).unwrap();
        let iso = parse_date(&text("2024-03-15")).unwrap();
        let iso_time = parse_date(&text("2024-03-15 00:00:00")).unwrap();

        assert_eq!(day_first, iso);
        assert_eq!(iso, iso_time);
        assert_eq!(day_first.date().to_string(), "2024-03-15");
    }

    #[test]
    fn test_date_keeps_time_of_day() {
        let dt = parse_date(&text("2022-06-01T13:00:00")).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2022-06-01 13:00:00");

        let offset = parse_date(&text("2022-06-01 13:00:00+00:00")).unwrap();
        assert_eq!(offset, dt);
    }

    #[test]
    fn test_date_cell_used_directly() {
        let dt = NaiveDate::from_ymd_opt(2023, 1, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(parse_date(&Cell::DateTime(dt)).unwrap(), dt);
    }

    #[test]
    fn test_unparseable_date() {
        assert!(matches!(
            parse_date(&text("32/13/24")),
            Err(RowError::InvalidDate { .. })
        ));
        assert!(parse_date(&text("yesterday")).is_err());
        assert!(parse_date(&Cell::Float(45366.0)).is_err());
    }

    #[test]
    fn test_weekday_label() {
        let friday = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let sunday = NaiveDate::from_ymd_opt(2024, 3, 17).unwrap();

        assert_eq!(weekday_label(friday), "Fri");
        assert_eq!(weekday_label(monday), "Mon");
        assert_eq!(weekday_label(sunday), "Sun");
    }

    #[test]
    fn test_postal_code() {
        assert_eq!(postal_code(&text(" 546 22 ")), "546 22");
        assert_eq!(postal_code(&Cell::Float(54622.0)), "54622");
        assert_eq!(postal_code(&text("ΤΚ")), "0");
        assert_eq!(postal_code(&Cell::Empty), "0");
    }

    #[test]
    fn test_street_number() {
        assert_eq!(street_number(&text("12A")), Some("12A".to_string()));
        assert_eq!(street_number(&Cell::Float(5.0)), Some("5".to_string()));
        assert_eq!(street_number(&text("-")), None);
        assert_eq!(street_number(&text("  ")), None);
    }

    #[test]
    fn test_integer() {
        assert_eq!(integer(&Cell::Float(3.0)), Some(3));
        assert_eq!(integer(&text("4.0")), Some(4));
        assert_eq!(integer(&text("x")), None);
    }
}
