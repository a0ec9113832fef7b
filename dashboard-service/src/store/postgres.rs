use meter_client::db::{account_queries, meter_reading_queries};
use meter_client::domain::{
    AlertStateRecord, DailyPower, HourlyProfile, HourlyTrend, MeterInfo, MeterReading, NewUser,
    Period, PeriodConsumption, ReadingStats, TimeRange, UserRecord, UserSettings,
};
use sqlx::postgres::{PgPool, PgPoolOptions};
use time::OffsetDateTime;

use super::{AccountStore, ReadingStore, StoreError};
use crate::config::DatabaseConfig;

/// Postgres-backed store; all aggregation happens in SQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.uri)
            .await?;
        Ok(Self::new(pool))
    }
}

fn store_error(err: anyhow::Error) -> StoreError {
    metrics::counter!("store_query_errors_total").increment(1);

    match err.downcast_ref::<sqlx::Error>() {
        Some(
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_),
        ) => StoreError::Unavailable(err.to_string()),
        Some(sqlx::Error::Database(db)) if db.code().as_deref() == Some("23505") => {
            StoreError::Conflict(db.message().to_string())
        }
        Some(sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_)) => {
            StoreError::InvalidData(err.to_string())
        }
        _ => StoreError::Query(err.to_string()),
    }
}

#[async_trait::async_trait]
impl ReadingStore for PgStore {
    async fn list_meters(&self) -> Result<Vec<MeterInfo>, StoreError> {
        meter_reading_queries::list_meters(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn latest_readings(&self) -> Result<Vec<MeterReading>, StoreError> {
        meter_reading_queries::latest_readings(&self.pool)
            .await
            .map_err(store_error)
    }

    async fn latest_for_meter(&self, meter_id: &str) -> Result<Option<MeterReading>, StoreError> {
        meter_reading_queries::latest_for_meter(&self.pool, meter_id)
            .await
            .map_err(store_error)
    }

    async fn readings_for_meter(
        &self,
        meter_id: &str,
        limit: i64,
        range: TimeRange,
    ) -> Result<Vec<MeterReading>, StoreError> {
        meter_reading_queries::readings_for_meter(&self.pool, meter_id, limit, range)
            .await
            .map_err(store_error)
    }

    async fn daily_power(
        &self,
        meter_id: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<DailyPower>, StoreError> {
        meter_reading_queries::daily_power(&self.pool, meter_id, since)
            .await
            .map_err(store_error)
    }

    async fn reading_stats(
        &self,
        meter_id: &str,
        range: TimeRange,
    ) -> Result<ReadingStats, StoreError> {
        meter_reading_queries::reading_stats(&self.pool, meter_id, range)
            .await
            .map_err(store_error)
    }

    async fn consumption(
        &self,
        meter_id: &str,
        period: Period,
        limit: i64,
    ) -> Result<Vec<PeriodConsumption>, StoreError> {
        meter_reading_queries::consumption(&self.pool, meter_id, period, limit)
            .await
            .map_err(store_error)
    }

    async fn hourly_profile(
        &self,
        meter_id: &str,
        limit: i64,
    ) -> Result<Vec<HourlyProfile>, StoreError> {
        meter_reading_queries::hourly_profile(&self.pool, meter_id, limit)
            .await
            .map_err(store_error)
    }

    async fn hourly_trend(&self, limit: i64) -> Result<Vec<HourlyTrend>, StoreError> {
        meter_reading_queries::hourly_trend(&self.pool, limit)
            .await
            .map_err(store_error)
    }

    async fn recent_readings(
        &self,
        since: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<MeterReading>, StoreError> {
        meter_reading_queries::recent_readings(&self.pool, since, limit)
            .await
            .map_err(store_error)
    }
}

#[async_trait::async_trait]
impl AccountStore for PgStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        account_queries::find_user_by_email(&self.pool, email)
            .await
            .map_err(store_error)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        account_queries::find_user(&self.pool, user_id)
            .await
            .map_err(store_error)
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        account_queries::list_users(&self.pool).await.map_err(store_error)
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        account_queries::create_user(&self.pool, &user)
            .await
            .map_err(store_error)
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        let updated = account_queries::update_password(&self.pool, user_id, password_hash)
            .await
            .map_err(store_error)?;
        if updated == 0 {
            return Err(StoreError::InvalidData(format!("user {user_id} does not exist")));
        }
        Ok(())
    }

    async fn user_settings(&self, user_id: i64) -> Result<Option<UserSettings>, StoreError> {
        account_queries::user_settings(&self.pool, user_id)
            .await
            .map_err(store_error)
    }

    async fn save_user_settings(
        &self,
        user_id: i64,
        settings: &UserSettings,
    ) -> Result<(), StoreError> {
        account_queries::save_user_settings(&self.pool, user_id, settings)
            .await
            .map_err(store_error)
    }

    async fn alert_states(&self) -> Result<Vec<AlertStateRecord>, StoreError> {
        account_queries::alert_states(&self.pool).await.map_err(store_error)
    }

    async fn set_alert_state(&self, state: &AlertStateRecord) -> Result<(), StoreError> {
        account_queries::upsert_alert_state(&self.pool, state)
            .await
            .map_err(store_error)
    }

    async fn clear_alert_states(&self, alert_ids: &[String]) -> Result<(), StoreError> {
        let removed = account_queries::delete_alert_states(&self.pool, alert_ids)
            .await
            .map_err(store_error)?;
        if removed > 0 {
            tracing::info!(removed, "cleared states of alerts no longer firing");
        }
        Ok(())
    }
}
