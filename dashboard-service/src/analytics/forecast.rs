use meter_client::domain::DailyPower;
use serde::Serialize;
use time::{Date, Duration};

/// Fewest daily points a forecast is computed from.
pub const MIN_HISTORY_DAYS: usize = 7;
/// Only the most recent days feed the trend line.
pub const TREND_WINDOW_DAYS: usize = 14;

const CONFIDENCE_FLOOR: f64 = 0.6;
const CONFIDENCE_DECAY_PER_DAY: f64 = 0.05;
const HOURS_PER_DAY: f64 = 24.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ForecastError {
    #[error("insufficient historical data: {available} daily points, at least {required} required")]
    InsufficientData { available: usize, required: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    fn from_slope(slope: f64) -> Self {
        if slope > 0.0 {
            Trend::Increasing
        } else if slope < 0.0 {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearTrend {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearTrend {
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub date: Date,
    pub predicted_power: f64,
    pub confidence_level: f64,
    pub predicted_energy: f64,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    pub trend_slope: f64,
    pub points_used: usize,
    pub forecast: Vec<ForecastPoint>,
}

/// Ordinary least squares over `(index, value)` pairs.
///
/// `None` when the x variance is zero, which only happens with fewer than two
/// values.
pub fn fit_linear_trend(values: &[f64]) -> Option<LinearTrend> {
    let n = values.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in values.iter().enumerate() {
        let x = i as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator == 0.0 {
        return None;
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    Some(LinearTrend { slope, intercept })
}

/// Linear decay per day ahead, never below the floor.
pub fn confidence_for_day(day_ahead: u32) -> f64 {
    (1.0 - CONFIDENCE_DECAY_PER_DAY * f64::from(day_ahead)).max(CONFIDENCE_FLOOR)
}

/// Project daily average power `days` days past the history.
///
/// `history` is oldest first; a day with no power values counts as 0.
/// `first_day` is the date of the first projected point.
pub fn forecast_daily_power(
    history: &[DailyPower],
    days: u32,
    first_day: Date,
) -> Result<Forecast, ForecastError> {
    if history.len() < MIN_HISTORY_DAYS {
        metrics::counter!("forecast_insufficient_data_total").increment(1);
        return Err(ForecastError::InsufficientData {
            available: history.len(),
            required: MIN_HISTORY_DAYS,
        });
    }

    let window_start = history.len().saturating_sub(TREND_WINDOW_DAYS);
    let values: Vec<f64> = history[window_start..]
        .iter()
        .map(|d| d.avg_power.unwrap_or(0.0))
        .collect();
    let n = values.len();

    let line = fit_linear_trend(&values).ok_or(ForecastError::InsufficientData {
        available: n,
        required: MIN_HISTORY_DAYS,
    })?;
    let trend = Trend::from_slope(line.slope);

    let forecast = (1..=days)
        .map(|i| {
            let predicted_power = line.at((n as u32 + i - 1) as f64).max(0.0);
            ForecastPoint {
                date: first_day + Duration::days(i64::from(i) - 1),
                predicted_power,
                confidence_level: confidence_for_day(i),
                predicted_energy: predicted_power * HOURS_PER_DAY,
                trend,
            }
        })
        .collect();

    Ok(Forecast {
        trend_slope: line.slope,
        points_used: n,
        forecast,
    })
}
