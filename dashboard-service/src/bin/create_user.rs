use anyhow::{bail, Context, Result};
use dashboard_service::{
    auth::{hash_password_with_iterations, Role},
    config::AppConfig,
    observability,
    store::{AccountStore, PgStore},
};
use meter_client::domain::NewUser;
use std::env;

/// Create a dashboard account in the Postgres store.
///
/// The password comes from `DASHBOARD_USER_PASSWORD` so it stays out of the
/// process list.
#[tokio::main]
async fn main() -> Result<()> {
    observability::init_tracing();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 {
        bail!("usage: create_user <email> <admin|user> [customer_id]");
    }
    let email = args[1].trim().to_lowercase();
    if !email.contains('@') {
        bail!("invalid email {email}");
    }
    let role = Role::parse(&args[2]).with_context(|| format!("unknown role {}", args[2]))?;
    let customer_id = args.get(3).cloned();

    let password = env::var("DASHBOARD_USER_PASSWORD")
        .context("DASHBOARD_USER_PASSWORD must hold the new user's password")?;
    if password.trim().chars().count() < 8 {
        bail!("password must be at least 8 characters");
    }

    let cfg = AppConfig::load()?;
    let db = cfg
        .database
        .as_ref()
        .context("create_user needs a [database] section")?;
    let store = PgStore::connect(db).await?;

    let password_hash = hash_password_with_iterations(&password, cfg.auth.hash_iterations)?;
    let user = store
        .create_user(NewUser {
            email,
            role: role.as_str().to_string(),
            customer_id,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = user.id, email = %user.email, role = %user.role, "user created");
    Ok(())
}
