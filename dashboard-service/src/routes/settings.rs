use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use meter_client::domain::UserSettings;
use serde::Serialize;

use crate::analytics::alerts::AlertThresholds;
use crate::analytics::billing::BillingRates;
use crate::auth::Session;
use crate::error::{ApiError, ApiResult};
use crate::routes::params::{count_request, json};
use crate::state::AppState;

const REFRESH_INTERVAL_SECONDS: std::ops::RangeInclusive<i32> = 5..=300;

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub settings: UserSettings,
    pub billing: BillingRates,
    pub alert_thresholds: AlertThresholds,
}

pub fn validate_settings(settings: &UserSettings) -> Result<(), ApiError> {
    if !REFRESH_INTERVAL_SECONDS.contains(&settings.refresh_interval_seconds) {
        return Err(ApiError::bad_request(format!(
            "refresh_interval_seconds must be between {} and {}",
            REFRESH_INTERVAL_SECONDS.start(),
            REFRESH_INTERVAL_SECONDS.end()
        )));
    }
    if !matches!(settings.theme.as_str(), "light" | "dark") {
        return Err(ApiError::bad_request("theme must be \"light\" or \"dark\""));
    }
    if settings.currency.len() != 3 || !settings.currency.chars().all(|c| c.is_ascii_uppercase()) {
        return Err(ApiError::bad_request("currency must be a 3-letter code such as USD"));
    }
    Ok(())
}

fn response(state: &AppState, settings: UserSettings) -> SettingsResponse {
    SettingsResponse {
        settings,
        billing: state.config.billing.clone(),
        alert_thresholds: state.config.alerts,
    }
}

async fn get_settings(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<SettingsResponse>> {
    count_request("settings_get");

    let settings = state
        .accounts
        .user_settings(session.user_id)
        .await?
        .unwrap_or_default();
    Ok(Json(response(&state, settings)))
}

async fn put_settings(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<UserSettings>, JsonRejection>,
) -> ApiResult<Json<SettingsResponse>> {
    count_request("settings_put");

    let mut settings = json(payload)?;
    settings.currency = settings.currency.trim().to_ascii_uppercase();
    validate_settings(&settings)?;
    state
        .accounts
        .save_user_settings(session.user_id, &settings)
        .await?;
    tracing::info!(user_id = session.user_id, "settings saved");

    Ok(Json(response(&state, settings)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).put(put_settings))
}
