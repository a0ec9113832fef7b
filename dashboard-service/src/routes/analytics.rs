use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use time::{Duration, UtcOffset};

use crate::analytics::forecast::{forecast_daily_power, ForecastPoint};
use crate::auth::Session;
use crate::error::ApiResult;
use crate::routes::params::{count_request, in_range, query, required_meter_id};
use crate::state::AppState;

/// Days of daily aggregates the trend is fitted on.
const HISTORY_DAYS: i64 = 30;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastQuery {
    pub meter_id: Option<String>,
    pub days: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ForecastResponse {
    pub meter_id: String,
    pub forecast_period: String,
    pub historical_data_points: usize,
    pub points_used: usize,
    pub trend_slope: f64,
    pub forecast: Vec<ForecastPoint>,
}

async fn forecast(
    State(state): State<AppState>,
    _session: Session,
    params: Result<Query<ForecastQuery>, QueryRejection>,
) -> ApiResult<Json<ForecastResponse>> {
    count_request("analytics_forecast");

    let params = query(params)?;
    let meter_id = required_meter_id(params.meter_id)?;
    let days = in_range("days", params.days, 7, 1, 365)?;

    let now = state.now();
    let history = state
        .readings
        .daily_power(&meter_id, now - Duration::days(HISTORY_DAYS))
        .await?;

    let tomorrow = now.to_offset(UtcOffset::UTC).date() + Duration::days(1);
    let forecast = forecast_daily_power(&history, days, tomorrow).map_err(|e| {
        tracing::info!(%meter_id, error = %e, "forecast refused");
        e
    })?;

    Ok(Json(ForecastResponse {
        meter_id,
        forecast_period: format!("{days} days"),
        historical_data_points: history.len(),
        points_used: forecast.points_used,
        trend_slope: forecast.trend_slope,
        forecast: forecast.forecast,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/analytics/forecast", get(forecast))
}
