//! In-memory counterparts of the SQL aggregation queries, used when readings
//! are served from a snapshot instead of Postgres. Semantics follow SQL: `AVG`,
//! `MIN` and `MAX` skip missing values and are `None` over nothing.

use std::collections::BTreeMap;

use meter_client::domain::{
    DailyPower, HourlyProfile, HourlyTrend, MeterInfo, MeterReading, Period, PeriodConsumption,
    ReadingStats,
};
use time::{Date, OffsetDateTime, UtcOffset};

#[derive(Default)]
struct Column {
    sum: f64,
    count: u32,
    min: Option<f64>,
    max: Option<f64>,
}

impl Column {
    fn push(&mut self, value: Option<f64>) {
        let Some(v) = value else { return };
        self.sum += v;
        self.count += 1;
        self.min = Some(self.min.map_or(v, |m| m.min(v)));
        self.max = Some(self.max.map_or(v, |m| m.max(v)));
    }

    fn avg(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / f64::from(self.count))
    }

    fn total(&self) -> Option<f64> {
        (self.count > 0).then_some(self.sum)
    }
}

/// Column accumulators shared by every grouping below.
#[derive(Default)]
struct Group {
    kwt: Column,
    kwh: Column,
    pf: Column,
    voltage: Column,
    rows: i64,
    first: Option<OffsetDateTime>,
    last: Option<OffsetDateTime>,
}

impl Group {
    fn push(&mut self, r: &MeterReading) {
        self.kwt.push(r.kwt);
        self.kwh.push(r.kwh);
        self.pf.push(Some(r.mean_power_factor()));
        self.voltage.push(Some(r.mean_voltage()));
        self.rows += 1;
        self.first = Some(self.first.map_or(r.ts, |f| f.min(r.ts)));
        self.last = Some(self.last.map_or(r.ts, |l| l.max(r.ts)));
    }
}

fn utc_day(ts: OffsetDateTime) -> Date {
    ts.to_offset(UtcOffset::UTC).date()
}

pub fn meter_catalogue<'a>(readings: impl IntoIterator<Item = &'a MeterReading>) -> Vec<MeterInfo> {
    let mut groups: BTreeMap<&str, Group> = BTreeMap::new();
    for r in readings {
        groups.entry(r.meter_id.as_str()).or_default().push(r);
    }

    groups
        .into_iter()
        .filter_map(|(meter_id, g)| {
            Some(MeterInfo {
                meter_id: meter_id.to_string(),
                last_reading: g.last?,
                reading_count: g.rows,
            })
        })
        .collect()
}

/// Per UTC day, oldest first.
pub fn daily_power<'a>(readings: impl IntoIterator<Item = &'a MeterReading>) -> Vec<DailyPower> {
    let mut groups: BTreeMap<Date, Group> = BTreeMap::new();
    for r in readings {
        groups.entry(utc_day(r.ts)).or_default().push(r);
    }

    groups
        .into_iter()
        .map(|(day, g)| DailyPower {
            day,
            avg_power: g.kwt.avg(),
            peak_power: g.kwt.max,
            avg_energy: g.kwh.avg(),
            reading_count: g.rows,
        })
        .collect()
}

pub fn reading_stats<'a>(readings: impl IntoIterator<Item = &'a MeterReading>) -> ReadingStats {
    let mut g = Group::default();
    for r in readings {
        g.push(r);
    }

    ReadingStats {
        total_readings: g.rows,
        avg_power: g.kwt.avg(),
        peak_power: g.kwt.max,
        min_power: g.kwt.min,
        avg_energy: g.kwh.avg(),
        max_energy: g.kwh.max,
        avg_power_factor: g.pf.avg(),
        min_power_factor: g.pf.min,
        avg_voltage: g.voltage.avg(),
        first_reading: g.first,
        last_reading: g.last,
    }
}

fn buckets<'a>(
    readings: impl IntoIterator<Item = &'a MeterReading>,
    period: Period,
) -> BTreeMap<OffsetDateTime, Group> {
    let mut groups: BTreeMap<OffsetDateTime, Group> = BTreeMap::new();
    for r in readings {
        groups.entry(period.truncate(r.ts)).or_default().push(r);
    }
    groups
}

/// Newest bucket first, at most `limit` buckets.
pub fn consumption<'a>(
    readings: impl IntoIterator<Item = &'a MeterReading>,
    period: Period,
    limit: usize,
) -> Vec<PeriodConsumption> {
    buckets(readings, period)
        .into_iter()
        .rev()
        .take(limit)
        .map(|(period_start, g)| PeriodConsumption {
            period_start,
            avg_power: g.kwt.avg(),
            peak_power: g.kwt.max,
            min_power: g.kwt.min,
            avg_energy: g.kwh.avg(),
            max_energy: g.kwh.max,
            avg_power_factor: g.pf.avg(),
            avg_voltage: g.voltage.avg(),
            reading_count: g.rows,
        })
        .collect()
}

/// Newest hour first, at most `limit` hours.
pub fn hourly_profile<'a>(
    readings: impl IntoIterator<Item = &'a MeterReading>,
    limit: usize,
) -> Vec<HourlyProfile> {
    buckets(readings, Period::Hourly)
        .into_iter()
        .rev()
        .take(limit)
        .map(|(hour, g)| HourlyProfile {
            hour,
            avg_power: g.kwt.avg(),
            avg_energy: g.kwh.avg(),
            avg_power_factor: g.pf.avg(),
            reading_count: g.rows,
        })
        .collect()
}

/// The most recent `limit` hours, returned oldest first.
pub fn hourly_trend<'a>(
    readings: impl IntoIterator<Item = &'a MeterReading>,
    limit: usize,
) -> Vec<HourlyTrend> {
    let mut rows: Vec<HourlyTrend> = buckets(readings, Period::Hourly)
        .into_iter()
        .rev()
        .take(limit)
        .map(|(hour, g)| HourlyTrend {
            hour,
            avg_power: g.kwt.avg(),
            total_energy: g.kwh.total(),
            reading_count: g.rows,
        })
        .collect();
    rows.reverse();
    rows
}
