use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::analytics::fleet::fleet_stats;
use crate::auth::Session;
use crate::error::ApiResult;
use crate::etag::conditional_json;
use crate::routes::params::count_request;
use crate::state::AppState;

/// Hours of fleet-wide history on the dashboard chart.
const TREND_HOURS: i64 = 24;

async fn stats(
    State(state): State<AppState>,
    _session: Session,
    headers: HeaderMap,
) -> ApiResult<Response> {
    count_request("dashboard_stats");

    let latest = state.readings.latest_readings().await?;
    let trend = state.readings.hourly_trend(TREND_HOURS).await?;
    let stats = fleet_stats(latest, trend, |id| state.meters.display_name(id));

    conditional_json(&headers, &stats)
}

pub fn router() -> Router<AppState> {
    Router::new().route("/dashboard/stats", get(stats))
}
