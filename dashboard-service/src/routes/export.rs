use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use time::macros::format_description;
use time::UtcOffset;

use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::export::{readings_to_csv, MAX_EXPORT_ROWS};
use crate::routes::params::{count_request, date_range, query, required_meter_id};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportQuery {
    pub meter_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Keep file names to characters every browser accepts unquoted.
fn file_safe(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

async fn export_csv(
    State(state): State<AppState>,
    _session: Session,
    params: Result<Query<ExportQuery>, QueryRejection>,
) -> ApiResult<Response> {
    count_request("export_csv");

    let params = query(params)?;
    let meter_id = required_meter_id(params.meter_id)?;
    let range = date_range(params.start_date.as_deref(), params.end_date.as_deref())?;

    let readings = state
        .readings
        .readings_for_meter(&meter_id, MAX_EXPORT_ROWS, range)
        .await?;
    let body = readings_to_csv(&readings)?;

    let today = state
        .now()
        .to_offset(UtcOffset::UTC)
        .date()
        .format(format_description!("[year]-[month]-[day]"))
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let disposition = format!(
        "attachment; filename=\"meter_{}_{today}.csv\"",
        file_safe(&meter_id)
    );
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| ApiError::internal(format!("invalid content disposition: {e}")))?;

    tracing::info!(%meter_id, rows = readings.len(), "csv export");
    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, HeaderValue::from_static("text/csv")),
            (CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub fn router() -> Router<AppState> {
    Router::new().route("/export/csv", get(export_csv))
}
