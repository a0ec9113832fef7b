use anyhow::Result;
use sqlx::PgPool;

use crate::domain::{AlertStateRecord, NewUser, UserRecord, UserSettings};

pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let row = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, email, role, customer_id, password_hash, created_at
        FROM users
        WHERE email = $1
        LIMIT 1
        "#,
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn find_user(pool: &PgPool, user_id: i64) -> Result<Option<UserRecord>> {
    let row = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, email, role, customer_id, password_hash, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<UserRecord>> {
    let rows = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT id, email, role, customer_id, password_hash, created_at
        FROM users
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Insert a user. A duplicate email surfaces as a unique violation (23505).
pub async fn create_user(pool: &PgPool, user: &NewUser) -> Result<UserRecord> {
    let row = sqlx::query_as::<_, UserRecord>(
        r#"
        INSERT INTO users (email, role, customer_id, password_hash)
        VALUES ($1, $2, $3, $4)
        RETURNING id, email, role, customer_id, password_hash, created_at
        "#,
    )
    .bind(&user.email)
    .bind(&user.role)
    .bind(&user.customer_id)
    .bind(&user.password_hash)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

pub async fn update_password(pool: &PgPool, user_id: i64, password_hash: &str) -> Result<u64> {
    let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(user_id)
        .bind(password_hash)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

pub async fn user_settings(pool: &PgPool, user_id: i64) -> Result<Option<UserSettings>> {
    let row = sqlx::query_as::<_, UserSettings>(
        r#"
        SELECT notifications, auto_refresh, refresh_interval_seconds, theme, currency
        FROM user_settings
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn save_user_settings(
    pool: &PgPool,
    user_id: i64,
    settings: &UserSettings,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO user_settings
            (user_id, notifications, auto_refresh, refresh_interval_seconds, theme, currency, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, NOW())
        ON CONFLICT (user_id) DO UPDATE SET
            notifications            = EXCLUDED.notifications,
            auto_refresh             = EXCLUDED.auto_refresh,
            refresh_interval_seconds = EXCLUDED.refresh_interval_seconds,
            theme                    = EXCLUDED.theme,
            currency                 = EXCLUDED.currency,
            updated_at               = EXCLUDED.updated_at
        "#,
    )
    .bind(user_id)
    .bind(settings.notifications)
    .bind(settings.auto_refresh)
    .bind(settings.refresh_interval_seconds)
    .bind(&settings.theme)
    .bind(&settings.currency)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn alert_states(pool: &PgPool) -> Result<Vec<AlertStateRecord>> {
    let rows = sqlx::query_as::<_, AlertStateRecord>(
        r#"
        SELECT alert_id, status, updated_by, updated_at
        FROM alert_states
        ORDER BY alert_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn upsert_alert_state(pool: &PgPool, state: &AlertStateRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO alert_states (alert_id, status, updated_by, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (alert_id) DO UPDATE SET
            status     = EXCLUDED.status,
            updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(&state.alert_id)
    .bind(&state.status)
    .bind(&state.updated_by)
    .bind(state.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_alert_states(pool: &PgPool, alert_ids: &[String]) -> Result<u64> {
    if alert_ids.is_empty() {
        return Ok(0);
    }

    let result = sqlx::query("DELETE FROM alert_states WHERE alert_id = ANY($1)")
        .bind(alert_ids)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
