use chrono::{DateTime, NaiveDate, SecondsFormat, TimeZone, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

pub fn millis_to_rfc3339(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis).single() {
        Some(at) => at.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => millis.to_string(),
    }
}

pub fn parse_rfc3339_millis(raw: &str) -> Option<i64> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|at| at.with_timezone(&Utc).timestamp_millis())
}

pub fn calendar_day(millis: i64) -> NaiveDate {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|at| at.date_naive())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rfc3339_round_trips_through_millis() {
        let rendered = millis_to_rfc3339(1_700_000_000_123);
        assert_eq!(rendered, "2023-11-14T22:13:20.123Z");
        assert_eq!(parse_rfc3339_millis(&rendered), Some(1_700_000_000_123));
    }

    #[test]
    fn calendar_day_uses_utc() {
        let day = calendar_day(1_700_000_000_123);
        assert_eq!(day.to_string(), "2023-11-14");
    }
}
