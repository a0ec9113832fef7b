use std::collections::HashMap;

use meter_client::domain::MeterInfo;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::config::MeterOverride;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeterStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meter {
    pub id: String,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: MeterStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub last_reading: OffsetDateTime,
    pub reading_count: i64,
}

/// Display metadata for meters. Ids come from the readings; names and
/// locations from `[[meters]]` in the config.
#[derive(Debug, Clone)]
pub struct MeterDirectory {
    overrides: HashMap<String, MeterOverride>,
    stale_after: Duration,
}

impl MeterDirectory {
    pub fn new(overrides: &[MeterOverride], stale_after_minutes: i64) -> Self {
        Self {
            overrides: overrides.iter().map(|m| (m.id.clone(), m.clone())).collect(),
            stale_after: Duration::minutes(stale_after_minutes),
        }
    }

    pub fn display_name(&self, meter_id: &str) -> String {
        self.overrides
            .get(meter_id)
            .and_then(|m| m.name.clone())
            .unwrap_or_else(|| format!("Meter {meter_id}"))
    }

    pub fn status(&self, last_reading: OffsetDateTime, now: OffsetDateTime) -> MeterStatus {
        if now - last_reading <= self.stale_after {
            MeterStatus::Active
        } else {
            MeterStatus::Inactive
        }
    }

    pub fn describe(&self, info: MeterInfo, now: OffsetDateTime) -> Meter {
        let meta = self.overrides.get(&info.meter_id);
        Meter {
            name: self.display_name(&info.meter_id),
            location: meta.and_then(|m| m.location.clone()),
            description: meta.and_then(|m| m.description.clone()),
            status: self.status(info.last_reading, now),
            last_reading: info.last_reading,
            reading_count: info.reading_count,
            id: info.meter_id,
        }
    }
}
