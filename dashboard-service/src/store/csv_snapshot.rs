use std::{cmp::Reverse, fs::File, path::Path};

use csv::StringRecord;
use meter_client::domain::{
    DailyPower, HourlyProfile, HourlyTrend, MeterInfo, MeterReading, Period, PeriodConsumption,
    ReadingStats, TimeRange,
};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::{ReadingStore, StoreError};
use crate::analytics::{aggregate, latest::latest_per_meter};

/// Readings loaded once from a CSV export and held in memory.
///
/// Expected header columns (by name):
/// - meter_id
/// - timestamp or ts (RFC3339)
/// - id (optional, defaults to the row number)
/// - any of v1..v3, i1..i3, pf1..pf3, kva1..kva3, kvat, kw1..kw3, kwt,
///   kvar1..kvar3, kvart, kvah, kwh, kvarh (optional, empty means missing)
#[derive(Debug)]
pub struct CsvSnapshotStore {
    /// Newest first.
    readings: Vec<MeterReading>,
}

impl CsvSnapshotStore {
    pub fn from_readings(mut readings: Vec<MeterReading>) -> Self {
        readings.sort_by_key(|r| (Reverse(r.ts), Reverse(r.id)));
        Self { readings }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path)
            .map_err(|e| anyhow::anyhow!("failed to open snapshot {}: {e}", path.display()))?;
        let store = Self::from_reader(file)?;
        tracing::info!(
            path = %path.display(),
            readings = store.readings.len(),
            "loaded reading snapshot"
        );
        Ok(store)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> anyhow::Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();

        let mut readings = Vec::new();
        for (row, result) in rdr.records().enumerate() {
            let record = result?;
            match record_to_reading(&record, &headers, row as i64 + 1) {
                Ok(r) => readings.push(r),
                Err(e) => {
                    metrics::counter!("snapshot_parse_errors_total").increment(1);
                    return Err(anyhow::anyhow!("row {}: {e}", row + 1));
                }
            }
        }

        Ok(Self::from_readings(readings))
    }

    fn for_meter<'a>(&'a self, meter_id: &'a str) -> impl Iterator<Item = &'a MeterReading> + 'a {
        self.readings.iter().filter(move |r| r.meter_id == meter_id)
    }
}

fn parse_optional_f64(s: &str) -> Result<Option<f64>, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|e| format!("invalid number '{trimmed}': {e}"))
}

fn record_to_reading(
    record: &StringRecord,
    headers: &StringRecord,
    row: i64,
) -> Result<MeterReading, String> {
    let get = |name: &str| -> Option<&str> {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .and_then(|idx| record.get(idx))
    };
    let value = |name: &str| -> Result<Option<f64>, String> {
        get(name).map_or(Ok(None), parse_optional_f64)
    };

    let meter_id = get("meter_id")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("missing meter_id")?;
    let ts_str = get("timestamp").or_else(|| get("ts")).ok_or("missing timestamp")?;
    let ts = OffsetDateTime::parse(ts_str.trim(), &Rfc3339)
        .map_err(|e| format!("invalid timestamp '{ts_str}': {e}"))?;
    let id = match get("id").map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => s.parse().map_err(|e| format!("invalid id '{s}': {e}"))?,
        None => row,
    };

    let mut r = MeterReading::empty(meter_id, ts);
    r.id = id;
    r.v1 = value("v1")?;
    r.v2 = value("v2")?;
    r.v3 = value("v3")?;
    r.i1 = value("i1")?;
    r.i2 = value("i2")?;
    r.i3 = value("i3")?;
    r.pf1 = value("pf1")?;
    r.pf2 = value("pf2")?;
    r.pf3 = value("pf3")?;
    r.kva1 = value("kva1")?;
    r.kva2 = value("kva2")?;
    r.kva3 = value("kva3")?;
    r.kvat = value("kvat")?;
    r.kw1 = value("kw1")?;
    r.kw2 = value("kw2")?;
    r.kw3 = value("kw3")?;
    r.kwt = value("kwt")?;
    r.kvar1 = value("kvar1")?;
    r.kvar2 = value("kvar2")?;
    r.kvar3 = value("kvar3")?;
    r.kvart = value("kvart")?;
    r.kvah = value("kvah")?;
    r.kwh = value("kwh")?;
    r.kvarh = value("kvarh")?;
    Ok(r)
}

fn row_limit(limit: i64) -> usize {
    usize::try_from(limit.max(0)).unwrap_or(usize::MAX)
}

#[async_trait::async_trait]
impl ReadingStore for CsvSnapshotStore {
    async fn list_meters(&self) -> Result<Vec<MeterInfo>, StoreError> {
        Ok(aggregate::meter_catalogue(&self.readings))
    }

    async fn latest_readings(&self) -> Result<Vec<MeterReading>, StoreError> {
        Ok(latest_per_meter(&self.readings))
    }

    async fn latest_for_meter(&self, meter_id: &str) -> Result<Option<MeterReading>, StoreError> {
        Ok(self.for_meter(meter_id).next().cloned())
    }

    async fn readings_for_meter(
        &self,
        meter_id: &str,
        limit: i64,
        range: TimeRange,
    ) -> Result<Vec<MeterReading>, StoreError> {
        Ok(self
            .for_meter(meter_id)
            .filter(|r| range.contains(r.ts))
            .take(row_limit(limit))
            .cloned()
            .collect())
    }

    async fn daily_power(
        &self,
        meter_id: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<DailyPower>, StoreError> {
        Ok(aggregate::daily_power(
            self.for_meter(meter_id).filter(|r| r.ts >= since),
        ))
    }

    async fn reading_stats(
        &self,
        meter_id: &str,
        range: TimeRange,
    ) -> Result<ReadingStats, StoreError> {
        Ok(aggregate::reading_stats(
            self.for_meter(meter_id).filter(|r| range.contains(r.ts)),
        ))
    }

    async fn consumption(
        &self,
        meter_id: &str,
        period: Period,
        limit: i64,
    ) -> Result<Vec<PeriodConsumption>, StoreError> {
        Ok(aggregate::consumption(
            self.for_meter(meter_id),
            period,
            row_limit(limit),
        ))
    }

    async fn hourly_profile(
        &self,
        meter_id: &str,
        limit: i64,
    ) -> Result<Vec<HourlyProfile>, StoreError> {
        Ok(aggregate::hourly_profile(self.for_meter(meter_id), row_limit(limit)))
    }

    async fn hourly_trend(&self, limit: i64) -> Result<Vec<HourlyTrend>, StoreError> {
        Ok(aggregate::hourly_trend(&self.readings, row_limit(limit)))
    }

    async fn recent_readings(
        &self,
        since: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<MeterReading>, StoreError> {
        Ok(self
            .readings
            .iter()
            .filter(|r| r.ts >= since)
            .take(row_limit(limit))
            .cloned()
            .collect())
    }
}
