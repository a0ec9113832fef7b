use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use meter_client::domain::{Period, PeriodConsumption, TimeRange};
use serde::{Deserialize, Serialize};
use time::Duration;

use crate::analytics::billing::{summarize, BillingSummary};
use crate::analytics::comparison::{compare_periods, ComparisonRow, COMPARISON_BUCKETS};
use crate::auth::Session;
use crate::error::ApiResult;
use crate::routes::params::{count_request, in_range, query, required_meter_id};
use crate::state::AppState;

const MAX_CONSUMPTION_BUCKETS: i64 = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQuery {
    pub meter_id: Option<String>,
    pub days: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionQuery {
    pub meter_id: Option<String>,
    #[serde(default)]
    pub period: Period,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonQuery {
    pub meter_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub meter_id: String,
    pub days: i64,
    #[serde(flatten)]
    pub summary: BillingSummary,
}

async fn summary(
    State(state): State<AppState>,
    _session: Session,
    params: Result<Query<SummaryQuery>, QueryRejection>,
) -> ApiResult<Json<SummaryResponse>> {
    count_request("reports_summary");

    let params = query(params)?;
    let meter_id = required_meter_id(params.meter_id)?;
    let days = in_range("days", params.days, 30, 1, 3650)?;

    let since = state.now() - Duration::days(days);
    let stats = state
        .readings
        .reading_stats(&meter_id, TimeRange::since(since))
        .await?;

    Ok(Json(SummaryResponse {
        meter_id,
        days,
        summary: summarize(&stats, &state.config.billing),
    }))
}

async fn consumption(
    State(state): State<AppState>,
    _session: Session,
    params: Result<Query<ConsumptionQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<PeriodConsumption>>> {
    count_request("reports_consumption");

    let params = query(params)?;
    let meter_id = required_meter_id(params.meter_id)?;
    let limit = params
        .limit
        .unwrap_or(MAX_CONSUMPTION_BUCKETS)
        .clamp(1, MAX_CONSUMPTION_BUCKETS);

    let rows = state
        .readings
        .consumption(&meter_id, params.period, limit)
        .await?;
    Ok(Json(rows))
}

async fn comparison(
    State(state): State<AppState>,
    _session: Session,
    params: Result<Query<ComparisonQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<ComparisonRow>>> {
    count_request("reports_comparison");

    let params = query(params)?;
    let meter_id = required_meter_id(params.meter_id)?;

    let buckets = state
        .readings
        .hourly_profile(&meter_id, COMPARISON_BUCKETS)
        .await?;
    Ok(Json(compare_periods(&buckets, state.config.billing.energy_rate)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/reports/summary", get(summary))
        .route("/reports/consumption", get(consumption))
        .route("/reports/comparison", get(comparison))
}
