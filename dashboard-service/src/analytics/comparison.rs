use meter_client::domain::HourlyProfile;
use serde::Serialize;
use time::{Date, UtcOffset};

/// Hourly buckets fetched for a comparison.
pub const COMPARISON_BUCKETS: i64 = 100;
/// The newest this-many buckets form the current period.
const CURRENT_PERIOD_BUCKETS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub period: Date,
    pub current_power: f64,
    pub current_energy: f64,
    pub previous_power: Option<f64>,
    pub previous_energy: Option<f64>,
    /// `None` when there is nothing to compare against.
    pub savings: Option<f64>,
    pub current_count: u32,
    pub previous_count: u32,
}

#[derive(Default)]
struct Accumulator {
    power: f64,
    energy: f64,
    count: u32,
}

impl Accumulator {
    fn add(&mut self, bucket: &HourlyProfile) {
        self.power += bucket.avg_power.unwrap_or(0.0);
        self.energy += bucket.avg_energy.unwrap_or(0.0);
        self.count += 1;
    }

    fn mean_power(&self) -> f64 {
        self.power / f64::from(self.count.max(1))
    }

    fn mean_energy(&self) -> f64 {
        self.energy / f64::from(self.count.max(1))
    }
}

/// Compare the current period against the previous one, per calendar day.
///
/// `buckets` is newest first. The first buckets form the current period; the
/// rest only contribute to days already present in it. Days without previous
/// buckets get no previous values instead of an invented baseline.
pub fn compare_periods(buckets: &[HourlyProfile], energy_rate: f64) -> Vec<ComparisonRow> {
    let mut days: Vec<(Date, Accumulator, Accumulator)> = Vec::new();

    for (index, bucket) in buckets.iter().enumerate() {
        let day = bucket.hour.to_offset(UtcOffset::UTC).date();
        let position = days.iter().position(|(d, _, _)| *d == day);

        if index < CURRENT_PERIOD_BUCKETS {
            let i = match position {
                Some(i) => i,
                None => {
                    days.push((day, Accumulator::default(), Accumulator::default()));
                    days.len() - 1
                }
            };
            days[i].1.add(bucket);
        } else if let Some(i) = position {
            days[i].2.add(bucket);
        }
    }

    days.into_iter()
        .map(|(period, current, previous)| {
            let current_energy = current.mean_energy();
            let (previous_power, previous_energy) = if previous.count > 0 {
                (Some(previous.mean_power()), Some(previous.mean_energy()))
            } else {
                (None, None)
            };

            ComparisonRow {
                period,
                current_power: current.mean_power(),
                current_energy,
                previous_power,
                previous_energy,
                savings: previous_energy.map(|prev| (prev - current_energy) * energy_rate),
                current_count: current.count,
                previous_count: previous.count,
            }
        })
        .collect()
}
