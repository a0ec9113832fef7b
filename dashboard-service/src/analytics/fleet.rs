use meter_client::domain::{HourlyTrend, MeterReading};
use serde::Serialize;

use super::round_to;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopMeter {
    pub meter_id: String,
    pub name: String,
    pub kwt: f64,
}

/// Dashboard headline figures over every meter's latest reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FleetStats {
    pub total_power: f64,
    pub total_energy: f64,
    pub avg_power_factor: f64,
    pub meter_count: usize,
    pub historical_data: Vec<HourlyTrend>,
    pub latest_readings: Vec<MeterReading>,
    pub top_meters: Vec<TopMeter>,
}

pub fn fleet_stats(
    latest: Vec<MeterReading>,
    historical_data: Vec<HourlyTrend>,
    display_name: impl Fn(&str) -> String,
) -> FleetStats {
    let total_power: f64 = latest.iter().map(|r| r.kwt.unwrap_or(0.0)).sum();
    let total_energy: f64 = latest.iter().map(|r| r.kwh.unwrap_or(0.0)).sum();
    let avg_power_factor = if latest.is_empty() {
        0.0
    } else {
        latest.iter().map(MeterReading::mean_power_factor).sum::<f64>() / latest.len() as f64
    };

    let mut top_meters: Vec<TopMeter> = latest
        .iter()
        .map(|r| TopMeter {
            meter_id: r.meter_id.clone(),
            name: display_name(&r.meter_id),
            kwt: r.kwt.unwrap_or(0.0),
        })
        .collect();
    top_meters.sort_by(|a, b| b.kwt.total_cmp(&a.kwt).then_with(|| a.meter_id.cmp(&b.meter_id)));

    FleetStats {
        total_power: round_to(total_power, 2),
        total_energy: round_to(total_energy, 2),
        avg_power_factor: round_to(avg_power_factor, 3),
        meter_count: latest.len(),
        historical_data,
        latest_readings: latest,
        top_meters,
    }
}
