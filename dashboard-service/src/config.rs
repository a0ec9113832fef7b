use serde::Deserialize;
use std::{fs, path::PathBuf};

use anyhow::{bail, Context};

use crate::analytics::{alerts::AlertThresholds, billing::BillingRates};

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind_addr: String,
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    Postgres,
    CsvSnapshot,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub uri: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    pub bind_addr: String,
}

/// Seed account for stores without a user table.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedUser {
    pub email: String,
    pub role: String,
    pub password_hash: String,
    pub customer_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_ttl_hours: i64,
    /// PBKDF2 rounds for passwords hashed by the service.
    pub hash_iterations: u32,
    pub users: Vec<SeedUser>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_ttl_hours: 12,
            hash_iterations: 200_000,
            users: Vec::new(),
        }
    }
}

/// Display metadata for a meter id.
#[derive(Debug, Clone, Deserialize)]
pub struct MeterOverride {
    pub id: String,
    pub name: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub interval_seconds: u64,
    pub window_seconds: i64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            window_seconds: 60,
        }
    }
}

/// Upper bound for `auth.session_ttl_hours`: one year.
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;
/// Upper bound for `stale_after_minutes`: one year.
const MAX_STALE_AFTER_MINUTES: i64 = 60 * 24 * 365;

fn default_stale_after_minutes() -> i64 {
    60
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_stale_after_minutes")]
    pub stale_after_minutes: i64,
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub database: Option<DatabaseConfig>,
    pub metrics: Option<MetricsConfig>,
    #[serde(default)]
    pub billing: BillingRates,
    #[serde(default)]
    pub alerts: AlertThresholds,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub meters: Vec<MeterOverride>,
    #[serde(default)]
    pub stream: StreamConfig,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        use std::env;

        let path =
            env::var("DASHBOARD_CONFIG").unwrap_or_else(|_| "dashboard-config.toml".to_string());
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file {path}"))?;
        Self::from_toml_str(&contents).with_context(|| format!("invalid config file {path}"))
    }

    pub fn from_toml_str(contents: &str) -> anyhow::Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> anyhow::Result<()> {
        match self.store.kind {
            StoreKind::Postgres if self.database.is_none() => {
                bail!("store.kind = \"postgres\" requires a [database] section")
            }
            StoreKind::CsvSnapshot if self.store.csv_path.is_none() => {
                bail!("store.kind = \"csv_snapshot\" requires store.csv_path")
            }
            _ => {}
        }
        if self.billing.energy_rate < 0.0 || self.billing.demand_rate < 0.0 {
            bail!("billing rates must be non-negative");
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.auth.session_ttl_hours) {
            bail!("auth.session_ttl_hours must be between 1 and {MAX_SESSION_TTL_HOURS}");
        }
        if self.auth.hash_iterations == 0 {
            bail!("auth.hash_iterations must be positive");
        }
        if self.stream.interval_seconds == 0 || self.stream.window_seconds <= 0 {
            bail!("stream.interval_seconds and stream.window_seconds must be positive");
        }
        if !(1..=MAX_STALE_AFTER_MINUTES).contains(&self.stale_after_minutes) {
            bail!("stale_after_minutes must be between 1 and {MAX_STALE_AFTER_MINUTES}");
        }
        Ok(())
    }
}
