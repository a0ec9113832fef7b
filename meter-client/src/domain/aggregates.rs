use serde::{Deserialize, Serialize};
use time::{Date, Duration, OffsetDateTime, Time, UtcOffset};

/// Optional inclusive bounds on the reading timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<OffsetDateTime>,
    pub end: Option<OffsetDateTime>,
}

impl TimeRange {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn since(start: OffsetDateTime) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    pub fn between(start: OffsetDateTime, end: OffsetDateTime) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, ts: OffsetDateTime) -> bool {
        self.start.map_or(true, |s| ts >= s) && self.end.map_or(true, |e| ts <= e)
    }
}

/// A meter as observed in the readings table.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MeterInfo {
    pub meter_id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub last_reading: OffsetDateTime,
    pub reading_count: i64,
}

/// Per-day aggregate used as forecast history.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct DailyPower {
    pub day: Date,
    pub avg_power: Option<f64>,
    pub peak_power: Option<f64>,
    pub avg_energy: Option<f64>,
    pub reading_count: i64,
}

/// Window statistics feeding the billing summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
pub struct ReadingStats {
    pub total_readings: i64,
    pub avg_power: Option<f64>,
    pub peak_power: Option<f64>,
    pub min_power: Option<f64>,
    pub avg_energy: Option<f64>,
    pub max_energy: Option<f64>,
    pub avg_power_factor: Option<f64>,
    pub min_power_factor: Option<f64>,
    pub avg_voltage: Option<f64>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub first_reading: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_reading: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct PeriodConsumption {
    #[serde(with = "time::serde::rfc3339")]
    pub period_start: OffsetDateTime,
    pub avg_power: Option<f64>,
    pub peak_power: Option<f64>,
    pub min_power: Option<f64>,
    pub avg_energy: Option<f64>,
    pub max_energy: Option<f64>,
    pub avg_power_factor: Option<f64>,
    pub avg_voltage: Option<f64>,
    pub reading_count: i64,
}

/// Hourly bucket for a single meter.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct HourlyProfile {
    #[serde(with = "time::serde::rfc3339")]
    pub hour: OffsetDateTime,
    pub avg_power: Option<f64>,
    pub avg_energy: Option<f64>,
    pub avg_power_factor: Option<f64>,
    pub reading_count: i64,
}

/// Hourly bucket across every meter.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct HourlyTrend {
    #[serde(with = "time::serde::rfc3339")]
    pub hour: OffsetDateTime,
    pub avg_power: Option<f64>,
    pub total_energy: Option<f64>,
    pub reading_count: i64,
}

/// Bucket width for consumption reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Hourly,
    #[default]
    Daily,
    Monthly,
}

impl Period {
    /// Unit understood by Postgres `date_trunc`.
    pub fn date_trunc_unit(self) -> &'static str {
        match self {
            Period::Hourly => "hour",
            Period::Daily => "day",
            Period::Monthly => "month",
        }
    }

    /// Start of the bucket containing `ts`, in UTC.
    pub fn truncate(self, ts: OffsetDateTime) -> OffsetDateTime {
        let utc = ts.to_offset(UtcOffset::UTC);
        let midnight = utc.replace_time(Time::MIDNIGHT);
        match self {
            Period::Hourly => midnight + Duration::hours(i64::from(utc.hour())),
            Period::Daily => midnight,
            Period::Monthly => midnight - Duration::days(i64::from(utc.day()) - 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn truncate_buckets_to_period_start() {
        let ts = datetime!(2024-02-17 13:45:10 UTC);
        assert_eq!(Period::Hourly.truncate(ts), datetime!(2024-02-17 13:00:00 UTC));
        assert_eq!(Period::Daily.truncate(ts), datetime!(2024-02-17 00:00:00 UTC));
        assert_eq!(Period::Monthly.truncate(ts), datetime!(2024-02-01 00:00:00 UTC));
    }

    #[test]
    fn truncate_normalizes_offsets_to_utc() {
        let ts = datetime!(2024-02-17 01:30:00 +02:00);
        assert_eq!(Period::Daily.truncate(ts), datetime!(2024-02-16 00:00:00 UTC));
    }

    #[test]
    fn range_bounds_are_inclusive() {
        let range = TimeRange::between(
            datetime!(2024-01-01 00:00:00 UTC),
            datetime!(2024-01-02 00:00:00 UTC),
        );
        assert!(range.contains(datetime!(2024-01-01 00:00:00 UTC)));
        assert!(range.contains(datetime!(2024-01-02 00:00:00 UTC)));
        assert!(!range.contains(datetime!(2024-01-02 00:00:01 UTC)));
        assert!(TimeRange::unbounded().contains(datetime!(1999-01-01 00:00:00 UTC)));
    }
}
