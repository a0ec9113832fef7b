use meter_client::domain::ReadingStats;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::round_to;

/// Flat tariff applied to summaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingRates {
    /// Currency units per kWh.
    pub energy_rate: f64,
    /// Currency units per kW of peak demand, scaled by 1/1000.
    pub demand_rate: f64,
    pub currency: String,
}

impl Default for BillingRates {
    fn default() -> Self {
        Self {
            energy_rate: 0.15,
            demand_rate: 12.5,
            currency: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VoltageStability {
    Good,
    #[serde(rename = "Needs Attention")]
    NeedsAttention,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EfficiencyRating {
    Excellent,
    Good,
    Poor,
}

impl VoltageStability {
    fn classify(avg_voltage: Option<f64>) -> Self {
        match avg_voltage {
            Some(v) if v > 220.0 && v < 240.0 => VoltageStability::Good,
            _ => VoltageStability::NeedsAttention,
        }
    }
}

impl EfficiencyRating {
    fn classify(power_factor_efficiency: f64) -> Self {
        if power_factor_efficiency > 90.0 {
            EfficiencyRating::Excellent
        } else if power_factor_efficiency > 80.0 {
            EfficiencyRating::Good
        } else {
            EfficiencyRating::Poor
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillingSummary {
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
    pub total_cost: f64,
    pub peak_demand_charge: f64,
    pub total_bill: f64,
    pub power_factor_efficiency: f64,
    pub voltage_stability: VoltageStability,
    pub efficiency_rating: EfficiencyRating,
    pub currency: String,
}

/// Derive cost and efficiency figures from window statistics.
///
/// Money is rounded to 2 decimals and power factors to 3. Costs and the
/// rating are computed from unrounded inputs.
pub fn summarize(stats: &ReadingStats, rates: &BillingRates) -> BillingSummary {
    let total_cost = stats.avg_energy.unwrap_or(0.0) * rates.energy_rate;
    let peak_demand_charge = stats.peak_power.unwrap_or(0.0) * rates.demand_rate / 1000.0;
    let total_bill = total_cost + peak_demand_charge;
    let power_factor_efficiency = stats.avg_power_factor.unwrap_or(0.0) * 100.0;

    BillingSummary {
        total_readings: stats.total_readings,
        avg_power: stats.avg_power,
        peak_power: stats.peak_power,
        min_power: stats.min_power,
        avg_energy: stats.avg_energy,
        max_energy: stats.max_energy,
        avg_power_factor: stats.avg_power_factor.map(|pf| round_to(pf, 3)),
        min_power_factor: stats.min_power_factor.map(|pf| round_to(pf, 3)),
        avg_voltage: stats.avg_voltage,
        first_reading: stats.first_reading,
        last_reading: stats.last_reading,
        total_cost: round_to(total_cost, 2),
        peak_demand_charge: round_to(peak_demand_charge, 2),
        total_bill: round_to(total_bill, 2),
        power_factor_efficiency: round_to(power_factor_efficiency, 2),
        voltage_stability: VoltageStability::classify(stats.avg_voltage),
        efficiency_rating: EfficiencyRating::classify(power_factor_efficiency),
        currency: rates.currency.clone(),
    }
}
