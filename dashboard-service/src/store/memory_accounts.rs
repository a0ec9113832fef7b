use std::collections::HashMap;

use meter_client::domain::{AlertStateRecord, NewUser, UserRecord, UserSettings};
use time::OffsetDateTime;
use tokio::sync::RwLock;

use super::{AccountStore, StoreError};
use crate::config::SeedUser;

/// Accounts, settings and alert states kept in process memory. Paired with
/// the CSV snapshot store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryAccountStore {
    users: RwLock<Vec<UserRecord>>,
    settings: RwLock<HashMap<i64, UserSettings>>,
    alert_states: RwLock<HashMap<String, AlertStateRecord>>,
}

impl MemoryAccountStore {
    pub fn from_seed(seed: &[SeedUser]) -> Self {
        let created_at = OffsetDateTime::now_utc();
        let users = seed
            .iter()
            .zip(1..)
            .map(|(u, id)| UserRecord {
                id,
                email: u.email.trim().to_lowercase(),
                role: u.role.clone(),
                customer_id: u.customer_id.clone(),
                password_hash: u.password_hash.clone(),
                created_at,
            })
            .collect();

        Self {
            users: RwLock::new(users),
            ..Self::default()
        }
    }
}

#[async_trait::async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, StoreError> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<UserRecord>, StoreError> {
        Ok(self.users.read().await.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self.users.read().await.clone())
    }

    async fn create_user(&self, user: NewUser) -> Result<UserRecord, StoreError> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Conflict(format!("user {} already exists", user.email)));
        }

        let record = UserRecord {
            id: users.iter().map(|u| u.id).max().unwrap_or(0) + 1,
            email: user.email,
            role: user.role,
            customer_id: user.customer_id,
            password_hash: user.password_hash,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(record.clone());
        Ok(record)
    }

    async fn update_password(&self, user_id: i64, password_hash: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| StoreError::InvalidData(format!("user {user_id} does not exist")))?;
        user.password_hash = password_hash.to_string();
        Ok(())
    }

    async fn user_settings(&self, user_id: i64) -> Result<Option<UserSettings>, StoreError> {
        Ok(self.settings.read().await.get(&user_id).cloned())
    }

    async fn save_user_settings(
        &self,
        user_id: i64,
        settings: &UserSettings,
    ) -> Result<(), StoreError> {
        self.settings.write().await.insert(user_id, settings.clone());
        Ok(())
    }

    async fn alert_states(&self) -> Result<Vec<AlertStateRecord>, StoreError> {
        let mut states: Vec<_> = self.alert_states.read().await.values().cloned().collect();
        states.sort_by(|a, b| a.alert_id.cmp(&b.alert_id));
        Ok(states)
    }

    async fn set_alert_state(&self, state: &AlertStateRecord) -> Result<(), StoreError> {
        self.alert_states
            .write()
            .await
            .insert(state.alert_id.clone(), state.clone());
        Ok(())
    }

    async fn clear_alert_states(&self, alert_ids: &[String]) -> Result<(), StoreError> {
        let mut states = self.alert_states.write().await;
        for id in alert_ids {
            states.remove(id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn seed() -> Vec<SeedUser> {
        vec![SeedUser {
            email: "Admin@Example.com".to_string(),
            role: "admin".to_string(),
            password_hash: "pbkdf2_sha256$1000$c2FsdA$aGFzaA".to_string(),
            customer_id: None,
        }]
    }

    #[tokio::test]
    async fn seeded_users_are_found_case_insensitively() {
        let store = MemoryAccountStore::from_seed(&seed());

        let user = store.find_user_by_email("ADMIN@example.com").await.unwrap().unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.email, "admin@example.com");
        assert!(store.find_user_by_email("nobody@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_a_conflict() {
        let store = MemoryAccountStore::from_seed(&seed());
        let err = store
            .create_user(NewUser {
                email: "admin@example.com".to_string(),
                role: "user".to_string(),
                customer_id: None,
                password_hash: "x".to_string(),
            })
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn new_users_get_the_next_id() {
        let store = MemoryAccountStore::from_seed(&seed());
        let created = store
            .create_user(NewUser {
                email: "ops@example.com".to_string(),
                role: "user".to_string(),
                customer_id: Some("C-7".to_string()),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(created.id, 2);
        assert_eq!(store.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn alert_states_can_be_set_and_cleared() {
        let store = MemoryAccountStore::default();
        let state = AlertStateRecord {
            alert_id: "pf_MTR-001".to_string(),
            status: "acknowledged".to_string(),
            updated_by: "admin@example.com".to_string(),
            updated_at: datetime!(2024-03-01 10:00:00 UTC),
        };

        store.set_alert_state(&state).await.unwrap();
        assert_eq!(store.alert_states().await.unwrap(), vec![state]);

        store
            .clear_alert_states(&["pf_MTR-001".to_string()])
            .await
            .unwrap();
        assert!(store.alert_states().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn settings_round_trip_per_user() {
        let store = MemoryAccountStore::default();
        assert!(store.user_settings(1).await.unwrap().is_none());

        let settings = UserSettings {
            theme: "light".to_string(),
            ..UserSettings::default()
        };
        store.save_user_settings(1, &settings).await.unwrap();

        assert_eq!(store.user_settings(1).await.unwrap(), Some(settings));
        assert!(store.user_settings(2).await.unwrap().is_none());
    }
}
