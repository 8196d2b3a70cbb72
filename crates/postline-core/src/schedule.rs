//! Schedule-time parsing and validation.

use crate::error::{Error, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// A validated publish time: the UTC instant plus the zone the caller
/// scheduled it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleTime {
    pub at: DateTime<Utc>,
    pub time_zone: Tz,
}

impl ScheduleTime {
    /// Parse a requested publish time and reject anything not strictly in
    /// the future.
    ///
    /// `timestamp` is either RFC 3339 (offset included) or a naive local
    /// timestamp (`2026-08-07T18:30` or with seconds) interpreted in
    /// `time_zone`.
    pub fn parse(timestamp: &str, time_zone: &str) -> Result<Self> {
        let tz: Tz = time_zone
            .parse()
            .map_err(|_| Error::InvalidTimezone(time_zone.to_string()))?;

        let at = parse_instant(timestamp, tz)?;

        if at <= Utc::now() {
            return Err(Error::PastSchedule(
                at.with_timezone(&tz).to_rfc3339(),
            ));
        }

        Ok(Self { at, time_zone: tz })
    }

    /// Delay from now until the scheduled instant. Signed: the queue
    /// rejects anything negative rather than firing immediately.
    pub fn delay_from_now(&self) -> chrono::Duration {
        self.at - Utc::now()
    }
}

fn parse_instant(timestamp: &str, tz: Tz) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(timestamp) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%dT%H:%M"))
        .map_err(|_| Error::InvalidTimestamp(timestamp.to_string()))?;

    // A DST gap or fold makes the local time ambiguous. Earliest wins.
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::InvalidTimestamp(timestamp.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rejects_past_time() {
        let past = (Utc::now() - Duration::hours(1)).to_rfc3339();
        let err = ScheduleTime::parse(&past, "America/New_York").unwrap_err();
        assert!(matches!(err, Error::PastSchedule(_)));
    }

    #[test]
    fn rejects_current_instant() {
        let now = Utc::now().to_rfc3339();
        let err = ScheduleTime::parse(&now, "UTC").unwrap_err();
        assert!(matches!(err, Error::PastSchedule(_)));
    }

    #[test]
    fn rejects_unknown_zone() {
        let future = (Utc::now() + Duration::hours(1)).to_rfc3339();
        let err = ScheduleTime::parse(&future, "Mars/Olympus_Mons").unwrap_err();
        assert!(matches!(err, Error::InvalidTimezone(_)));
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let err = ScheduleTime::parse("next tuesday", "UTC").unwrap_err();
        assert!(matches!(err, Error::InvalidTimestamp(_)));
    }

    #[test]
    fn accepts_future_rfc3339() {
        let future = (Utc::now() + Duration::hours(2)).to_rfc3339();
        let parsed = ScheduleTime::parse(&future, "America/New_York").unwrap();
        let delay = parsed.delay_from_now();
        assert!(delay > Duration::seconds(7100));
        assert!(delay < Duration::seconds(7300));
    }

    #[test]
    fn interprets_naive_timestamp_in_zone() {
        // One day out, formatted without an offset; interpreted in the
        // requested zone, not in UTC.
        let tz: Tz = "America/New_York".parse().unwrap();
        let local = (Utc::now() + Duration::days(1)).with_timezone(&tz);
        let naive = local.format("%Y-%m-%dT%H:%M:%S").to_string();

        let parsed = ScheduleTime::parse(&naive, "America/New_York").unwrap();
        assert_eq!(parsed.at.timestamp(), local.timestamp());
    }
}
