//! Date helpers for document periods

use chrono::{NaiveDate, TimeZone, Utc};

/// Placeholder shown for a missing date or period
pub const EMPTY_DATE: &str = "—";

/// Parse the date part of an ISO date or timestamp (`2024-03-01`,
/// `2024-03-01T10:00:00`, `2024-03-01 10:00`)
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    let date_part = trimmed
        .split(|c| c == 'T' || c == ' ')
        .next()
        .unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// `2024-03-01` → `01.03.2024`
pub fn format_date_ru(value: Option<&str>) -> Option<String> {
    value
        .and_then(parse_iso_date)
        .map(|date| date.format("%d.%m.%Y").to_string())
}

/// Period label: `дд.мм.гггг — дд.мм.гггг`, open ends shown as a bare dash
pub fn format_period(start: Option<&str>, end: Option<&str>) -> String {
    match (format_date_ru(start), format_date_ru(end)) {
        (Some(start), Some(end)) => format!("{} — {}", start, end),
        (Some(start), None) => format!("{} —", start),
        (None, Some(end)) => format!("— {}", end),
        (None, None) => EMPTY_DATE.to_string(),
    }
}

/// Midnight UTC of an ISO date, in milliseconds
pub fn iso_date_to_timestamp(value: &str) -> Option<i64> {
    let date = parse_iso_date(value)?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight).timestamp_millis())
}

/// Milliseconds since the epoch → ISO date (UTC)
pub fn timestamp_to_iso_date(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|dt| dt.format("%Y-%m-%d").to_string())
}
