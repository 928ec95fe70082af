//! Date parsing and formatting shared by validation, the memory store and the edit form.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Display format of form date pickers (`dd/MM/yyyy`).
pub const DISPLAY_FORMAT: &str = "%d/%m/%Y";

/// Parse RFC 3339, `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC) or `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    if let Ok(d) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&d));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| Utc.from_utc_datetime(&d))
}

/// Stored form of a timestamp, matching what the Postgres store returns.
pub fn to_wire(d: &DateTime<Utc>) -> String {
    d.to_rfc3339()
}

/// `dd/MM/yyyy` rendering of a stored timestamp; `None` when it does not parse.
pub fn to_display(s: &str) -> Option<String> {
    parse_timestamp(s).map(|d| d.format(DISPLAY_FORMAT).to_string())
}

/// Parse a `dd/MM/yyyy` picker value into midnight UTC.
pub fn from_display(s: &str) -> Option<DateTime<Utc>> {
    NaiveDate::parse_from_str(s.trim(), DISPLAY_FORMAT)
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| Utc.from_utc_datetime(&d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_rfc3339_naive_and_plain_dates() {
        let a = parse_timestamp("2026-03-01T10:00:00+02:00").unwrap();
        assert_eq!(to_wire(&a), "2026-03-01T08:00:00+00:00");
        let b = parse_timestamp("2026-03-01T10:00:00").unwrap();
        assert_eq!(to_wire(&b), "2026-03-01T10:00:00+00:00");
        let c = parse_timestamp("2026-03-01").unwrap();
        assert_eq!(to_wire(&c), "2026-03-01T00:00:00+00:00");
        assert!(parse_timestamp("01/03/2026").is_none());
        assert!(parse_timestamp("tomorrow").is_none());
    }

    #[test]
    fn display_round_trip_uses_day_first() {
        assert_eq!(to_display("2026-03-01T08:00:00+00:00").as_deref(), Some("01/03/2026"));
        let d = from_display("15/04/2026").unwrap();
        assert_eq!(to_wire(&d), "2026-04-15T00:00:00+00:00");
        assert!(from_display("2026-04-15").is_none());
    }
}
