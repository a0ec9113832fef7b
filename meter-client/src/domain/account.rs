use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub role: String,
    pub customer_id: Option<String>,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub role: String,
    pub customer_id: Option<String>,
    pub password_hash: String,
}

/// Per-user dashboard preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserSettings {
    pub notifications: bool,
    pub auto_refresh: bool,
    pub refresh_interval_seconds: i32,
    pub theme: String,
    pub currency: String,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            notifications: true,
            auto_refresh: true,
            refresh_interval_seconds: 30,
            theme: "dark".to_string(),
            currency: "USD".to_string(),
        }
    }
}

/// Operator-set status of a derived alert, keyed by the alert's deterministic id.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct AlertStateRecord {
    pub alert_id: String,
    pub status: String,
    pub updated_by: String,
    pub updated_at: OffsetDateTime,
}
