use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use time::{Duration, OffsetDateTime};

use crate::auth::SessionManager;
use crate::config::{AppConfig, StoreKind};
use crate::meters::MeterDirectory;
use crate::store::{AccountStore, CsvSnapshotStore, MemoryAccountStore, PgStore, ReadingStore};

/// Source of "now" for windows such as the last 30 days or meter staleness.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    Fixed(OffsetDateTime),
}

impl Clock {
    pub fn now(&self) -> OffsetDateTime {
        match self {
            Clock::System => OffsetDateTime::now_utc(),
            Clock::Fixed(at) => *at,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub readings: Arc<dyn ReadingStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub sessions: Arc<SessionManager>,
    pub meters: Arc<MeterDirectory>,
    pub clock: Clock,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        readings: Arc<dyn ReadingStore>,
        accounts: Arc<dyn AccountStore>,
        clock: Clock,
    ) -> Self {
        let sessions = SessionManager::new(Duration::hours(config.auth.session_ttl_hours));
        let meters = MeterDirectory::new(&config.meters, config.stale_after_minutes);
        Self {
            config: Arc::new(config),
            readings,
            accounts,
            sessions: Arc::new(sessions),
            meters: Arc::new(meters),
            clock,
        }
    }

    /// Connect the store selected by `store.kind`.
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let (readings, accounts): (Arc<dyn ReadingStore>, Arc<dyn AccountStore>) =
            match config.store.kind {
                StoreKind::Postgres => {
                    let db = config
                        .database
                        .as_ref()
                        .context("store.kind = \"postgres\" requires a [database] section")?;
                    let store = Arc::new(PgStore::connect(db).await?);
                    tracing::info!(max_connections = db.max_connections, "using postgres store");
                    (store.clone(), store)
                }
                StoreKind::CsvSnapshot => {
                    let path = config
                        .store
                        .csv_path
                        .as_deref()
                        .context("store.kind = \"csv_snapshot\" requires store.csv_path")?;
                    let readings = Arc::new(CsvSnapshotStore::load(path)?);
                    let accounts = Arc::new(MemoryAccountStore::from_seed(&config.auth.users));
                    tracing::info!(
                        path = %path.display(),
                        seeded_users = config.auth.users.len(),
                        "using csv snapshot store"
                    );
                    (readings, accounts)
                }
            };

        Ok(Self::new(config, readings, accounts, Clock::System))
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }
}

impl FromRef<AppState> for Arc<SessionManager> {
    fn from_ref(state: &AppState) -> Arc<SessionManager> {
        state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<dyn AccountStore> {
    fn from_ref(state: &AppState) -> Arc<dyn AccountStore> {
        state.accounts.clone()
    }
}
