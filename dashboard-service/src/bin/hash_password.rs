use anyhow::{Context, Result};
use dashboard_service::{
    auth::{hash_password, hash_password_with_iterations},
    config::AppConfig,
};
use std::env;

/// Print a password hash for `[[auth.users]]` seed entries.
///
/// Reads the password from `DASHBOARD_USER_PASSWORD`. Uses the configured
/// iteration count when a config file is present.
fn main() -> Result<()> {
    let password = env::var("DASHBOARD_USER_PASSWORD")
        .context("DASHBOARD_USER_PASSWORD must hold the password to hash")?;

    let hash = match AppConfig::load() {
        Ok(cfg) => hash_password_with_iterations(&password, cfg.auth.hash_iterations)?,
        Err(_) => hash_password(&password)?,
    };
    println!("{hash}");
    Ok(())
}
