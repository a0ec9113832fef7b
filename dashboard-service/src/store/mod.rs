//! Where readings and account state come from. Handlers only see the traits,
//! so the same API runs on Postgres or on an in-memory CSV snapshot.

pub mod csv_snapshot;
pub mod memory_accounts;
pub mod postgres;

use meter_client::domain::{
    AlertStateRecord, DailyPower, HourlyProfile, HourlyTrend, MeterInfo, MeterReading, NewUser,
    Period, PeriodConsumption, ReadingStats, TimeRange, UserRecord, UserSettings,
};
use time::OffsetDateTime;

pub use csv_snapshot::CsvSnapshotStore;
pub use memory_accounts::MemoryAccountStore;
pub use postgres::PgStore;

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("invalid stored data: {0}")]
    InvalidData(String),
    #[error("conflict: {0}")]
    Conflict(String),
}

#[async_trait::async_trait]
pub trait ReadingStore: Send + Sync {
    async fn list_meters(&self) -> Result<Vec<MeterInfo>, StoreError>;

    /// Newest reading of every meter, sorted by meter id.
    async fn latest_readings(&self) -> Result<Vec<MeterReading>, StoreError>;

    async fn latest_for_meter(&self, meter_id: &str) -> Result<Option<MeterReading>, StoreError>;

    /// Newest first.
    async fn readings_for_meter(
        &self,
        meter_id: &str,
        limit: i64,
        range: TimeRange,
    ) -> Result<Vec<MeterReading>, StoreError>;

    /// Oldest day first.
    async fn daily_power(
        &self,
        meter_id: &str,
        since: OffsetDateTime,
    ) -> Result<Vec<DailyPower>, StoreError>;

    async fn reading_stats(
        &self,
        meter_id: &str,
        range: TimeRange,
    ) -> Result<ReadingStats, StoreError>;

    /// Newest bucket first.
    async fn consumption(
        &self,
        meter_id: &str,
        period: Period,
        limit: i64,
    ) -> Result<Vec<PeriodConsumption>, StoreError>;

    /// Newest hour first.
    async fn hourly_profile(
        &self,
        meter_id: &str,
        limit: i64,
    ) -> Result<Vec<HourlyProfile>, StoreError>;

    /// Most recent hours across all meters, oldest first.
    async fn hourly_trend(&self, limit: i64) -> Result<Vec<HourlyTrend>, StoreError>;

    /// Readings of any meter at or after `since`, newest first.
    async fn recent_readings(
        &self,
        since: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<MeterReading>, StoreError>;
}

#[async_trait::async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError>;

    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError>;

    /// Fails with [`StoreError::Conflict`] when the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError>;

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError>;

    async fn user_settings(&self, user_id: i64) -> Result<Option<UserSettings>, StoreError>;

    async fn save_user_settings(
        &self,
        user_id: i64,
        settings: &UserSettings,
    ) -> Result<(), StoreError>;

    async fn alert_states(&self) -> Result<Vec<AlertStateRecord>, StoreError>;

    async fn set_alert_state(&self, state: &AlertStateRecord) -> Result<(), StoreError>;

    async fn clear_alert_states(&self, alert_ids: &[String]) -> Result<(), StoreError>;
}
