mod password;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use tokio::sync::RwLock;

use crate::error::ApiError;
use crate::store::AccountStore;

pub use password::{hash_password, hash_password_with_iterations, verify_password, PasswordHash};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    /// Accepts the spellings found in older user tables.
    pub fn parse(role: &str) -> Option<Self> {
        match role.trim().to_lowercase().as_str() {
            "admin" | "administrator" => Some(Role::Admin),
            "user" | "customer" | "viewer" => Some(Role::User),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

#[derive(Debug)]
struct SessionEntry {
    user_id: i64,
    expires_at: OffsetDateTime,
}

/// Bearer tokens issued at login. Sessions live only in memory, so a restart
/// logs everyone out.
#[derive(Debug)]
pub struct SessionManager {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn issue(&self, user_id: i64) -> String {
        let mut buf = [0u8; 32];
        OsRng.fill_bytes(&mut buf);
        let token = URL_SAFE_NO_PAD.encode(buf);

        let entry = SessionEntry {
            user_id,
            expires_at: OffsetDateTime::now_utc() + self.ttl,
        };
        self.sessions.write().await.insert(token.clone(), entry);
        token
    }

    pub async fn resolve(&self, token: &str) -> Option<i64> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get(token)?;
        if entry.expires_at <= OffsetDateTime::now_utc() {
            sessions.remove(token);
            return None;
        }
        Some(entry.user_id)
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop every session of a user except `keep`, e.g. after a password
    /// change.
    pub async fn revoke_user(&self, user_id: i64, keep: Option<&str>) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|token, entry| entry.user_id != user_id || Some(token.as_str()) == keep);
        before - sessions.len()
    }

    pub async fn prune_expired(&self) -> usize {
        let now = OffsetDateTime::now_utc();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, entry| entry.expires_at > now);
        before - sessions.len()
    }
}

/// The authenticated caller, resolved from the `Authorization: Bearer` header.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub email: String,
    pub role: Role,
    pub customer_id: Option<String>,
}

impl Session {
    pub fn require_admin(&self) -> Result<(), ApiError> {
        match self.role {
            Role::Admin => Ok(()),
            Role::User => Err(ApiError::forbidden("Admin role required")),
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    Arc<SessionManager>: FromRef<S>,
    Arc<dyn AccountStore>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let sessions = Arc::<SessionManager>::from_ref(state);
        let accounts = Arc::<dyn AccountStore>::from_ref(state);

        let token = bearer_token(parts)
            .ok_or_else(|| ApiError::unauthorized("Missing or invalid token"))?;
        let user_id = sessions
            .resolve(&token)
            .await
            .ok_or_else(|| ApiError::unauthorized("Missing or invalid token"))?;
        let user = accounts
            .find_user(user_id)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Missing or invalid token"))?;
        let role = Role::parse(&user.role).ok_or_else(|| {
            tracing::warn!(user_id, role = %user.role, "user has an unknown role");
            ApiError::forbidden("Unknown role")
        })?;

        Ok(Session {
            token,
            user_id,
            email: user.email,
            role,
            customer_id: user.customer_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_are_canonicalized() {
        assert_eq!(Role::parse(" Admin "), Some(Role::Admin));
        assert_eq!(Role::parse("administrator"), Some(Role::Admin));
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("root"), None);
    }

    #[tokio::test]
    async fn issued_tokens_resolve_until_revoked() {
        let manager = SessionManager::new(Duration::hours(1));
        let token = manager.issue(7).await;

        assert_eq!(manager.resolve(&token).await, Some(7));
        assert!(manager.revoke(&token).await);
        assert_eq!(manager.resolve(&token).await, None);
        assert!(!manager.revoke(&token).await);
    }

    #[tokio::test]
    async fn expired_sessions_are_pruned() {
        let manager = SessionManager::new(Duration::ZERO);
        let token = manager.issue(1).await;
        manager.issue(2).await;

        assert_eq!(manager.prune_expired().await, 2);
        assert_eq!(manager.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn revoke_user_drops_their_other_tokens() {
        let manager = SessionManager::new(Duration::hours(1));
        let a = manager.issue(1).await;
        let b = manager.issue(1).await;
        let c = manager.issue(1).await;
        let other = manager.issue(2).await;

        assert_eq!(manager.revoke_user(1, Some(&c)).await, 2);
        assert_eq!(manager.resolve(&a).await, None);
        assert_eq!(manager.resolve(&b).await, None);
        assert_eq!(manager.resolve(&c).await, Some(1));
        assert_eq!(manager.resolve(&other).await, Some(2));

        assert_eq!(manager.revoke_user(1, None).await, 1);
    }

    #[test]
    fn only_admins_pass_the_admin_check() {
        let mut session = Session {
            token: "t".to_string(),
            user_id: 1,
            email: "ops@example.com".to_string(),
            role: Role::User,
            customer_id: None,
        };
        assert!(session.require_admin().is_err());

        session.role = Role::Admin;
        assert!(session.require_admin().is_ok());
    }
}
