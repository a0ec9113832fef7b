use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::{hash_password_with_iterations, verify_password, Role, Session};
use crate::error::{ApiError, ApiResult};
use crate::routes::params::{count_request, json};
use crate::state::AppState;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: MeResponse,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub customer_id: Option<String>,
}

impl From<&Session> for MeResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.user_id,
            email: session.email.clone(),
            role: session.role,
            customer_id: session.customer_id.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

fn invalid_credentials(email: &str) -> ApiError {
    metrics::counter!("auth_login_failures_total").increment(1);
    tracing::warn!(%email, "rejected login");
    ApiError::unauthorized("Invalid credentials")
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    count_request("auth_login");

    let payload = json(payload)?;
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || payload.password.trim().is_empty() {
        return Err(ApiError::bad_request("Email and password are required"));
    }

    let Some(user) = state.accounts.find_user_by_email(&email).await? else {
        return Err(invalid_credentials(&email));
    };
    if !verify_password(&payload.password, &user.password_hash) {
        return Err(invalid_credentials(&email));
    }
    let role = Role::parse(&user.role).ok_or_else(|| {
        tracing::warn!(user_id = user.id, role = %user.role, "user has an unknown role");
        ApiError::forbidden("Unknown role")
    })?;

    let token = state.sessions.issue(user.id).await;
    tracing::info!(user_id = user.id, role = role.as_str(), "login");

    Ok(Json(LoginResponse {
        token,
        user: MeResponse {
            id: user.id,
            email: user.email,
            role,
            customer_id: user.customer_id,
        },
    }))
}

async fn logout(State(state): State<AppState>, session: Session) -> StatusCode {
    count_request("auth_logout");
    state.sessions.revoke(&session.token).await;
    StatusCode::NO_CONTENT
}

async fn me(session: Session) -> Json<MeResponse> {
    count_request("auth_me");
    Json(MeResponse::from(&session))
}

async fn change_password(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<StatusCode> {
    count_request("auth_password");

    let payload = json(payload)?;
    let user = state
        .accounts
        .find_user(session.user_id)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Missing or invalid token"))?;
    if !verify_password(&payload.current_password, &user.password_hash) {
        metrics::counter!("auth_login_failures_total").increment(1);
        return Err(ApiError::unauthorized("Current password is incorrect"));
    }

    let new_password = payload.new_password.trim();
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "New password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let hash = hash_password_with_iterations(new_password, state.config.auth.hash_iterations)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    state.accounts.update_password(session.user_id, &hash).await?;

    // Other devices must log in again; this session stays valid.
    let revoked = state
        .sessions
        .revoke_user(session.user_id, Some(&session.token))
        .await;
    tracing::info!(user_id = session.user_id, revoked, "password changed");

    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/password", post(change_password))
}
