use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use meter_client::domain::{NewUser, UserRecord};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::auth::{hash_password_with_iterations, Role, Session};
use crate::error::{ApiError, ApiResult};
use crate::routes::auth::MIN_PASSWORD_LEN;
use crate::routes::params::{count_request, json};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub customer_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            email: user.email,
            role: user.role,
            customer_id: user.customer_id,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    pub email: String,
    pub password: String,
    pub role: String,
    pub customer_id: Option<String>,
}

async fn list_users(
    State(state): State<AppState>,
    session: Session,
) -> ApiResult<Json<Vec<UserResponse>>> {
    count_request("admin_users_list");
    session.require_admin()?;

    let users = state.accounts.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

async fn create_user(
    State(state): State<AppState>,
    session: Session,
    payload: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    count_request("admin_users_create");
    session.require_admin()?;
    let payload = json(payload)?;

    let email = payload.email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::bad_request("A valid email is required"));
    }
    let role = Role::parse(&payload.role)
        .ok_or_else(|| ApiError::bad_request("role must be \"admin\" or \"user\""))?;
    if payload.password.trim().chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let customer_id = payload
        .customer_id
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());

    let iterations = state.config.auth.hash_iterations;
    let password_hash = hash_password_with_iterations(&payload.password, iterations)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let user = state
        .accounts
        .create_user(NewUser {
            email,
            role: role.as_str().to_string(),
            customer_id,
            password_hash,
        })
        .await?;
    tracing::info!(user_id = user.id, role = %user.role, by = %session.email, "user created");

    Ok((StatusCode::CREATED, Json(UserResponse::from(user))))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/users", get(list_users).post(create_user))
}
