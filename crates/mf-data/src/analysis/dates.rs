//! Date recognition for text values

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parse a text value as a date, trying RFC 3339 first and then each format
pub fn parse_date(value: &str, formats: &[String]) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    formats.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(value, format)
            .map(|dt| dt.and_utc())
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(value, format)
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
            })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;

    #[test]
    fn test_recognized_formats() {
        let formats = AnalyzerConfig::default().date_formats;
        let day = parse_date("2017-03-02", &formats).unwrap();
        assert_eq!(day.to_rfc3339(), "2017-03-02T00:00:00+00:00");

        let stamp = parse_date("2017-03-02T10:30:00Z", &formats).unwrap();
        assert_eq!(stamp.timestamp_millis() - day.timestamp_millis(), (10 * 60 + 30) * 60 * 1000);

        assert!(parse_date("02/03/2017", &formats).is_some());
        assert!(parse_date("2017-03-02 10:30:00", &formats).is_some());
    }

    #[test]
    fn test_rejects_non_dates() {
        let formats = AnalyzerConfig::default().date_formats;
        assert!(parse_date("flood", &formats).is_none());
        assert!(parse_date("", &formats).is_none());
        assert!(parse_date("2017-13-45", &formats).is_none());
    }
}
