use std::sync::Arc;

use meter_client::domain::MeterReading;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use crate::auth::hash_password_with_iterations;
use crate::config::{AppConfig, SeedUser};
use crate::state::{AppState, Clock};
use crate::store::{CsvSnapshotStore, MemoryAccountStore};

pub const NOW: OffsetDateTime = datetime!(2024-03-15 12:00:00 UTC);

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const ADMIN_PASSWORD: &str = "admin-password";
pub const USER_EMAIL: &str = "user@example.com";
pub const USER_PASSWORD: &str = "user-password";

const TEST_ITERATIONS: u32 = 1_000;

pub fn test_config() -> AppConfig {
    AppConfig::from_toml_str(
        r#"
        [http]
        bind_addr = "127.0.0.1:0"

        [store]
        kind = "csv_snapshot"
        csv_path = "unused.csv"

        [auth]
        hash_iterations = 1000

        [[meters]]
        id = "MTR-001"
        name = "Main Building"
        location = "Basement"
        "#,
    )
    .expect("test config")
}

fn healthy(meter: &str, ts: OffsetDateTime, kwt: f64, kwh: f64) -> MeterReading {
    let mut r = MeterReading::empty(meter, ts);
    r.v1 = Some(230.0);
    r.v2 = Some(231.0);
    r.v3 = Some(229.0);
    r.i1 = Some(40.0);
    r.i2 = Some(41.0);
    r.i3 = Some(39.0);
    r.pf1 = Some(0.95);
    r.pf2 = Some(0.95);
    r.pf3 = Some(0.95);
    r.kwt = Some(kwt);
    r.kwh = Some(kwh);
    r
}

/// Three meters around [`NOW`]:
/// - MTR-001: ten daily readings from 2024-03-05, then a low power factor
///   reading five minutes before now.
/// - MTR-002: a single fresh reading with high power and a 15 V imbalance.
/// - MTR-003: one healthy reading two weeks old.
pub fn test_readings() -> Vec<MeterReading> {
    let mut readings = Vec::new();
    let mut id = 0;
    let mut next_id = || {
        id += 1;
        id
    };

    for day in 0..10 {
        let ts = datetime!(2024-03-05 12:00:00 UTC) + Duration::days(day);
        let mut r = healthy("MTR-001", ts, 100.0 + 10.0 * day as f64, 5_000.0 + 100.0 * day as f64);
        r.id = next_id();
        readings.push(r);
    }

    let mut low_pf = healthy("MTR-001", NOW - Duration::minutes(5), 150.0, 6_000.0);
    low_pf.id = next_id();
    low_pf.pf1 = Some(0.80);
    readings.push(low_pf);

    let mut hot = healthy("MTR-002", NOW - Duration::seconds(30), 60_000.0, 90_000.0);
    hot.id = next_id();
    hot.v2 = Some(215.0);
    hot.v3 = Some(230.0);
    readings.push(hot);

    let mut old = healthy("MTR-003", datetime!(2024-03-01 08:00:00 UTC), 20.0, 300.0);
    old.id = next_id();
    readings.push(old);

    readings
}

pub fn test_users() -> Vec<SeedUser> {
    let seed = |email: &str, role: &str, password: &str, customer_id: Option<&str>| SeedUser {
        email: email.to_string(),
        role: role.to_string(),
        password_hash: hash_password_with_iterations(password, TEST_ITERATIONS).expect("hash"),
        customer_id: customer_id.map(str::to_string),
    };
    vec![
        seed(ADMIN_EMAIL, "admin", ADMIN_PASSWORD, None),
        seed(USER_EMAIL, "user", USER_PASSWORD, Some("CUST-1")),
    ]
}

/// Snapshot-backed state with a fixed clock. Each call is independent.
pub fn test_state() -> AppState {
    let config = test_config();
    let readings = Arc::new(CsvSnapshotStore::from_readings(test_readings()));
    let accounts = Arc::new(MemoryAccountStore::from_seed(&test_users()));
    AppState::new(config, readings, accounts, Clock::Fixed(NOW))
}
