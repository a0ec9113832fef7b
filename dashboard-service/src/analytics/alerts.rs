use std::collections::{HashMap, HashSet};
use std::str::FromStr;

use meter_client::domain::{AlertStateRecord, MeterReading};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Limits that turn a latest reading into an alert.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    /// Any phase PF strictly below this raises a low power factor warning.
    pub min_power_factor: f64,
    /// Total real power (kW) strictly above this is critical.
    pub max_total_power_kw: f64,
    /// Largest allowed spread (V) between any two phase voltages.
    pub max_voltage_spread: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            min_power_factor: 0.85,
            max_total_power_kw: 50_000.0,
            max_voltage_spread: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    LowPowerFactor,
    HighPower,
    VoltageImbalance,
}

impl AlertKind {
    fn id_prefix(self) -> &'static str {
        match self {
            AlertKind::LowPowerFactor => "pf",
            AlertKind::HighPower => "power",
            AlertKind::VoltageImbalance => "voltage",
        }
    }

    fn title(self) -> &'static str {
        match self {
            AlertKind::LowPowerFactor => "Low Power Factor",
            AlertKind::HighPower => "High Power Consumption",
            AlertKind::VoltageImbalance => "Voltage Imbalance",
        }
    }

    fn severity(self) -> Severity {
        match self {
            AlertKind::HighPower => Severity::Critical,
            AlertKind::LowPowerFactor | AlertKind::VoltageImbalance => Severity::Warning,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }
}

impl FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "resolved" => Ok(AlertStatus::Resolved),
            other => Err(format!("unknown alert status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub id: String,
    pub kind: AlertKind,
    #[serde(rename = "type")]
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub meter_id: String,
    pub value: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub status: AlertStatus,
    pub status_updated_by: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub status_updated_at: Option<OffsetDateTime>,
}

impl Alert {
    fn raise(kind: AlertKind, reading: &MeterReading, message: String, value: String) -> Self {
        Self {
            id: alert_id(kind, &reading.meter_id),
            kind,
            severity: kind.severity(),
            title: kind.title().to_string(),
            message,
            meter_id: reading.meter_id.clone(),
            value,
            timestamp: reading.ts,
            status: AlertStatus::Active,
            status_updated_by: None,
            status_updated_at: None,
        }
    }
}

pub fn alert_id(kind: AlertKind, meter_id: &str) -> String {
    format!("{}_{}", kind.id_prefix(), meter_id)
}

fn fmt_phase(value: Option<f64>, places: usize) -> String {
    match value {
        Some(v) => format!("{v:.places$}"),
        None => "-".to_string(),
    }
}

/// Evaluate every threshold against each meter's latest reading.
///
/// Predicates are independent, so one meter yields between zero and three
/// alerts. Missing values never trigger a predicate.
pub fn evaluate_alerts(latest: &[MeterReading], thresholds: &AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for reading in latest {
        let pfs = reading.phase_power_factors();
        if pfs.iter().flatten().any(|pf| *pf < thresholds.min_power_factor) {
            alerts.push(Alert::raise(
                AlertKind::LowPowerFactor,
                reading,
                format!(
                    "Power factor below {} on meter {}",
                    thresholds.min_power_factor, reading.meter_id
                ),
                format!(
                    "PF1: {}, PF2: {}, PF3: {}",
                    fmt_phase(pfs[0], 2),
                    fmt_phase(pfs[1], 2),
                    fmt_phase(pfs[2], 2)
                ),
            ));
        }

        if let Some(kwt) = reading.kwt.filter(|kwt| *kwt > thresholds.max_total_power_kw) {
            alerts.push(Alert::raise(
                AlertKind::HighPower,
                reading,
                format!(
                    "Power consumption exceeds {} kW on meter {}",
                    thresholds.max_total_power_kw, reading.meter_id
                ),
                format!("{kwt:.1} kW"),
            ));
        }

        let volts = reading.phase_voltages();
        if max_pairwise_spread(volts).is_some_and(|spread| spread > thresholds.max_voltage_spread) {
            alerts.push(Alert::raise(
                AlertKind::VoltageImbalance,
                reading,
                format!("Voltage imbalance detected on meter {}", reading.meter_id),
                format!(
                    "V1: {}V, V2: {}V, V3: {}V",
                    fmt_phase(volts[0], 1),
                    fmt_phase(volts[1], 1),
                    fmt_phase(volts[2], 1)
                ),
            ));
        }
    }

    metrics::counter!("alerts_evaluated_total").increment(alerts.len() as u64);
    alerts
}

/// Largest |a - b| over the phase pairs where both values are present.
fn max_pairwise_spread(values: [Option<f64>; 3]) -> Option<f64> {
    [(0, 1), (1, 2), (0, 2)]
        .iter()
        .filter_map(|&(a, b)| Some((values[a]? - values[b]?).abs()))
        .reduce(f64::max)
}

/// Overlay stored operator transitions onto freshly evaluated alerts.
///
/// Returns the ids of stored states whose alert is no longer firing.
pub fn apply_states(alerts: &mut [Alert], states: &[AlertStateRecord]) -> Vec<String> {
    let by_id: HashMap<&str, &AlertStateRecord> =
        states.iter().map(|s| (s.alert_id.as_str(), s)).collect();

    for alert in alerts.iter_mut() {
        let Some(state) = by_id.get(alert.id.as_str()) else {
            continue;
        };
        match state.status.parse::<AlertStatus>() {
            Ok(status) => {
                alert.status = status;
                alert.status_updated_by = Some(state.updated_by.clone());
                alert.status_updated_at = Some(state.updated_at);
            }
            Err(e) => {
                tracing::warn!(
                    alert_id = %state.alert_id,
                    error = %e,
                    "ignoring stored alert state"
                );
            }
        }
    }

    let firing: HashSet<&str> = alerts.iter().map(|a| a.id.as_str()).collect();
    states
        .iter()
        .filter(|s| !firing.contains(s.alert_id.as_str()))
        .map(|s| s.alert_id.clone())
        .collect()
}
