use chrono::{DateTime, Local, NaiveDateTime};

/// Formats accepted for timestamps coming from the server
const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

/// Render a server timestamp as `YYYY/MM/DD HH:MM:SS`.
///
/// RFC 3339 timestamps are converted to local time; naive timestamps are taken
/// as already local. Anything unparseable is returned unchanged.
///
/// # Examples
///
/// ```
/// use qdii_console::utils::format_run_time;
///
/// assert_eq!(format_run_time("2024-03-01 09:00:05"), "2024/03/01 09:00:05");
/// assert_eq!(format_run_time("yesterday"), "yesterday");
/// ```
#[must_use]
pub fn format_run_time(raw: &str) -> String {
    let raw = raw.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return parsed
            .with_timezone(&Local)
            .format("%Y/%m/%d %H:%M:%S")
            .to_string();
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map_or_else(
            || raw.to_string(),
            |parsed| parsed.format("%Y/%m/%d %H:%M:%S").to_string(),
        )
}
