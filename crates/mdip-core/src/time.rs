use chrono::{DateTime, SecondsFormat, Utc};

/// Parse an RFC 3339 timestamp.
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Normalise a timestamp to second precision (`YYYY-MM-DDTHH:MM:SSZ`).
pub fn standard_time(s: &str) -> Option<String> {
    parse_time(s).map(|t| format_time(&t))
}

pub fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Current time in the format stamped onto local events.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Convert unix seconds to the normalised ISO form.
pub fn unix_to_iso(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|t| format_time(&t))
}
