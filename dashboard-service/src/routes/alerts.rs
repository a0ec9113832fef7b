use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use meter_client::domain::AlertStateRecord;
use serde::Deserialize;

use crate::analytics::alerts::{apply_states, evaluate_alerts, Alert, AlertStatus};
use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::etag::conditional_json;
use crate::routes::params::{count_request, query};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AlertsQuery {
    pub status: Option<String>,
}

/// Evaluate current alerts with their stored operator states. States of
/// alerts that stopped firing are dropped so a recurrence starts as active.
async fn current_alerts(state: &AppState) -> ApiResult<Vec<Alert>> {
    let latest = state.readings.latest_readings().await?;
    let mut alerts = evaluate_alerts(&latest, &state.config.alerts);

    let stored = state.accounts.alert_states().await?;
    let stale = apply_states(&mut alerts, &stored);
    if !stale.is_empty() {
        state.accounts.clear_alert_states(&stale).await?;
        tracing::debug!(cleared = stale.len(), "dropped states of cleared alerts");
    }
    Ok(alerts)
}

async fn list_alerts(
    State(state): State<AppState>,
    _session: Session,
    params: Result<Query<AlertsQuery>, QueryRejection>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    count_request("alerts_list");

    let params = query(params)?;
    let filter = params
        .status
        .as_deref()
        .map(str::parse::<AlertStatus>)
        .transpose()
        .map_err(ApiError::bad_request)?;

    let mut alerts = current_alerts(&state).await?;
    if let Some(status) = filter {
        alerts.retain(|a| a.status == status);
    }
    conditional_json(&headers, &alerts)
}

async fn transition(
    state: &AppState,
    session: &Session,
    alert_id: &str,
    status: AlertStatus,
) -> ApiResult<Json<Alert>> {
    session.require_admin()?;

    let alerts = current_alerts(state).await?;
    let mut alert = alerts
        .into_iter()
        .find(|a| a.id == alert_id)
        .ok_or_else(|| ApiError::not_found(format!("Alert {alert_id} is not active")))?;

    let record = AlertStateRecord {
        alert_id: alert.id.clone(),
        status: status.as_str().to_string(),
        updated_by: session.email.clone(),
        updated_at: state.now(),
    };
    state.accounts.set_alert_state(&record).await?;
    tracing::info!(%alert_id, status = status.as_str(), by = %session.email, "alert state changed");

    alert.status = status;
    alert.status_updated_by = Some(record.updated_by);
    alert.status_updated_at = Some(record.updated_at);
    Ok(Json(alert))
}

async fn acknowledge(
    State(state): State<AppState>,
    session: Session,
    Path(alert_id): Path<String>,
) -> ApiResult<Json<Alert>> {
    count_request("alerts_acknowledge");
    transition(&state, &session, &alert_id, AlertStatus::Acknowledged).await
}

async fn resolve(
    State(state): State<AppState>,
    session: Session,
    Path(alert_id): Path<String>,
) -> ApiResult<Json<Alert>> {
    count_request("alerts_resolve");
    transition(&state, &session, &alert_id, AlertStatus::Resolved).await
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/alerts", get(list_alerts))
        .route("/alerts/:alert_id/acknowledge", post(acknowledge))
        .route("/alerts/:alert_id/resolve", post(resolve))
}
