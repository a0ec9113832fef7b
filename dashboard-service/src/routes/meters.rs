use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use meter_client::domain::MeterReading;
use serde::Deserialize;

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::etag::conditional_json;
use crate::meters::Meter;
use crate::routes::params::{count_request, date_range, query};
use crate::state::AppState;

const DEFAULT_READINGS_LIMIT: i64 = 100;
const MAX_READINGS_LIMIT: i64 = 10_000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadingsQuery {
    pub limit: Option<i64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

async fn list_meters(
    State(state): State<AppState>,
    _session: Session,
) -> ApiResult<Json<Vec<Meter>>> {
    count_request("meters_list");

    let now = state.now();
    let meters = state
        .readings
        .list_meters()
        .await?
        .into_iter()
        .map(|info| state.meters.describe(info, now))
        .collect();
    Ok(Json(meters))
}

async fn latest_reading(
    State(state): State<AppState>,
    _session: Session,
    Path(meter_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    count_request("meters_latest");

    let reading = state
        .readings
        .latest_for_meter(&meter_id)
        .await?
        .ok_or_else(|| ApiError::not_found("No readings found for this meter"))?;
    conditional_json(&headers, &reading)
}

async fn readings(
    State(state): State<AppState>,
    _session: Session,
    Path(meter_id): Path<String>,
    params: Result<Query<ReadingsQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<MeterReading>>> {
    count_request("meters_readings");

    let params = query(params)?;
    let limit = params
        .limit
        .unwrap_or(DEFAULT_READINGS_LIMIT)
        .clamp(1, MAX_READINGS_LIMIT);
    let range = date_range(params.start_date.as_deref(), params.end_date.as_deref())?;

    let rows = state
        .readings
        .readings_for_meter(&meter_id, limit, range)
        .await?;
    Ok(Json(rows))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/meters", get(list_meters))
        .route("/meters/:meter_id/latest", get(latest_reading))
        .route("/meters/:meter_id/readings", get(readings))
}
