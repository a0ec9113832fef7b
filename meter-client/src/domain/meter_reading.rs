use serde::Serialize;
use time::OffsetDateTime;

/// One measurement snapshot for a meter, as stored in `meter_readings`.
///
/// Every electrical quantity is nullable: the ingestion side writes whatever
/// the meter reported and leaves the rest empty.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MeterReading {
    pub id: i64,
    pub meter_id: String,
    #[serde(rename = "timestamp", with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub v1: Option<f64>,
    pub v2: Option<f64>,
    pub v3: Option<f64>,
    pub i1: Option<f64>,
    pub i2: Option<f64>,
    pub i3: Option<f64>,
    pub pf1: Option<f64>,
    pub pf2: Option<f64>,
    pub pf3: Option<f64>,
    pub kva1: Option<f64>,
    pub kva2: Option<f64>,
    pub kva3: Option<f64>,
    pub kvat: Option<f64>,
    pub kw1: Option<f64>,
    pub kw2: Option<f64>,
    pub kw3: Option<f64>,
    pub kwt: Option<f64>,
    pub kvar1: Option<f64>,
    pub kvar2: Option<f64>,
    pub kvar3: Option<f64>,
    pub kvart: Option<f64>,
    pub kvah: Option<f64>,
    pub kwh: Option<f64>,
    pub kvarh: Option<f64>,
}

impl MeterReading {
    /// A reading with no measured values.
    pub fn empty(meter_id: impl Into<String>, ts: OffsetDateTime) -> Self {
        Self {
            id: 0,
            meter_id: meter_id.into(),
            ts,
            v1: None,
            v2: None,
            v3: None,
            i1: None,
            i2: None,
            i3: None,
            pf1: None,
            pf2: None,
            pf3: None,
            kva1: None,
            kva2: None,
            kva3: None,
            kvat: None,
            kw1: None,
            kw2: None,
            kw3: None,
            kwt: None,
            kvar1: None,
            kvar2: None,
            kvar3: None,
            kvart: None,
            kvah: None,
            kwh: None,
            kvarh: None,
        }
    }

    pub fn phase_voltages(&self) -> [Option<f64>; 3] {
        [self.v1, self.v2, self.v3]
    }

    pub fn phase_power_factors(&self) -> [Option<f64>; 3] {
        [self.pf1, self.pf2, self.pf3]
    }

    /// Mean of the three phase power factors, missing phases counted as 0.
    pub fn mean_power_factor(&self) -> f64 {
        mean_of_three(self.phase_power_factors())
    }

    /// Mean of the three phase voltages, missing phases counted as 0.
    pub fn mean_voltage(&self) -> f64 {
        mean_of_three(self.phase_voltages())
    }
}

fn mean_of_three(values: [Option<f64>; 3]) -> f64 {
    values.iter().map(|v| v.unwrap_or(0.0)).sum::<f64>() / 3.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn mean_power_factor_counts_missing_phases_as_zero() {
        let mut r = MeterReading::empty("MTR-001", datetime!(2024-01-01 00:00:00 UTC));
        r.pf1 = Some(0.9);
        r.pf2 = Some(0.9);

        assert!((r.mean_power_factor() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn serializes_timestamp_as_rfc3339() {
        let r = MeterReading::empty("MTR-001", datetime!(2024-03-05 10:30:00 UTC));
        let json = serde_json::to_value(&r).unwrap();

        assert_eq!(json["timestamp"], "2024-03-05T10:30:00Z");
        assert!(json["v1"].is_null());
    }
}
