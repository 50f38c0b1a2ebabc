//! Credential management for the remote backend
//!
//! Holds exactly one bearer credential pair, proactively refreshed behind a
//! single-flight gate so concurrent callers collapse into one network round
//! trip.

mod store;

pub use store::CredentialStore;

use crate::backend::BackendClient;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

/// Bearer credential pair for the backend. Single-writer; persisted
/// encrypted at rest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: UserIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: String,
    pub username: String,
}

/// Default safety margin: tokens inside this window before expiry are
/// refreshed before use.
pub const DEFAULT_REFRESH_MARGIN_MINS: i64 = 5;

pub struct CredentialManager {
    backend: Arc<BackendClient>,
    store: CredentialStore,
    pair: RwLock<Option<CredentialPair>>,
    /// Single-flight gate for refresh; holders re-check the margin first.
    refresh_gate: Mutex<()>,
    margin: ChronoDuration,
}

impl CredentialManager {
    /// Creates the manager and reloads any persisted pair; a corrupt store
    /// was already cleared by the store itself.
    pub fn new(backend: Arc<BackendClient>, store: CredentialStore) -> Self {
        let pair = store.load();
        if pair.is_some() {
            info!("restored persisted credentials");
        }
        Self {
            backend,
            store,
            pair: RwLock::new(pair),
            refresh_gate: Mutex::new(()),
            margin: ChronoDuration::minutes(DEFAULT_REFRESH_MARGIN_MINS),
        }
    }

    pub fn with_margin(mut self, margin: ChronoDuration) -> Self {
        self.margin = margin;
        self
    }

    pub async fn is_logged_in(&self) -> bool {
        self.pair.read().await.is_some()
    }

    pub async fn current_user(&self) -> Option<UserIdentity> {
        self.pair.read().await.as_ref().map(|p| p.user.clone())
    }

    pub async fn login(&self, username: &str, password: &str) -> anyhow::Result<()> {
        let pair = self.backend.login(username, password).await?;
        self.install(pair).await;
        Ok(())
    }

    pub async fn register(&self, username: &str, password: &str) -> anyhow::Result<()> {
        let pair = self.backend.register(username, password).await?;
        self.install(pair).await;
        Ok(())
    }

    pub async fn logout(&self) {
        let pair = self.pair.write().await.take();
        self.store.clear();
        if let Some(pair) = pair {
            // Best effort; local state is already gone.
            if let Err(err) = self.backend.logout(&pair.refresh_token).await {
                warn!(error = %err, "backend logout failed");
            }
        }
    }

    /// Returns a token valid beyond the safety margin, refreshing first if
    /// needed. `None` means the caller must prompt for login.
    pub async fn get_valid_access_token(&self) -> Option<String> {
        {
            let pair = self.pair.read().await;
            match pair.as_ref() {
                Some(pair) if !self.inside_margin(pair) => {
                    return Some(pair.access_token.clone());
                }
                Some(_) => {}
                None => return None,
            }
        }

        if !self.refresh().await {
            return None;
        }
        self.pair
            .read()
            .await
            .as_ref()
            .map(|p| p.access_token.clone())
    }

    /// Refreshes the pair behind the single-flight gate. A caller that
    /// acquires the gate re-checks the margin first: if another caller
    /// already refreshed while it waited, no second round trip happens.
    ///
    /// Rejection and transient failure are treated identically here: the
    /// credentials are cleared and the higher-level operation must be
    /// retried after re-login.
    pub async fn refresh(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;

        let refresh_token = {
            let pair = self.pair.read().await;
            match pair.as_ref() {
                Some(pair) if !self.inside_margin(pair) => return true,
                Some(pair) => pair.refresh_token.clone(),
                None => return false,
            }
        };

        match self.backend.refresh(&refresh_token).await {
            Ok(fresh) => {
                self.install(fresh).await;
                info!("credentials refreshed");
                true
            }
            Err(err) => {
                warn!(error = %err, "credential refresh failed, clearing credentials");
                self.pair.write().await.take();
                self.store.clear();
                false
            }
        }
    }

    fn inside_margin(&self, pair: &CredentialPair) -> bool {
        pair.expires_at - self.margin <= Utc::now()
    }

    async fn install(&self, pair: CredentialPair) {
        if let Err(err) = self.store.save(&pair) {
            warn!(error = %err, "failed to persist credentials");
        }
        *self.pair.write().await = Some(pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn manager(server_url: &str, dir: &TempDir, pair: Option<CredentialPair>) -> CredentialManager {
        let store = CredentialStore::new(dir.path().join("credentials.enc"));
        if let Some(pair) = pair {
            store.save(&pair).unwrap();
        }
        let backend = Arc::new(BackendClient::new(server_url).unwrap());
        CredentialManager::new(backend, store)
    }

    fn pair_expiring_in(minutes: i64) -> CredentialPair {
        CredentialPair {
            access_token: "stale-access".to_string(),
            refresh_token: "refresh-1".to_string(),
            expires_at: Utc::now() + ChronoDuration::minutes(minutes),
            user: UserIdentity {
                id: "u-1".to_string(),
                username: "tester".to_string(),
            },
        }
    }

    fn fresh_auth_body() -> String {
        serde_json::json!({
            "accessToken": "fresh-access",
            "refreshToken": "refresh-2",
            "expiresAt": Utc::now() + ChronoDuration::hours(1),
            "user": {"id": "u-1", "username": "tester"}
        })
        .to_string()
    }

    #[tokio::test]
    async fn token_outside_margin_is_returned_without_refresh() {
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/api/auth/refresh")
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let manager = manager(&server.url(), &dir, Some(pair_expiring_in(60)));

        let token = manager.get_valid_access_token().await;
        assert_eq!(token.as_deref(), Some("stale-access"));
        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn concurrent_callers_collapse_into_one_refresh() {
        let mut server = mockito::Server::new_async().await;
        let refresh_mock = server
            .mock("POST", "/api/auth/refresh")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(fresh_auth_body())
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let manager = Arc::new(manager(&server.url(), &dir, Some(pair_expiring_in(1))));

        let callers: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                tokio::spawn(async move { manager.get_valid_access_token().await })
            })
            .collect();

        for caller in callers {
            let token = caller.await.unwrap();
            assert_eq!(token.as_deref(), Some("fresh-access"));
        }
        refresh_mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_refresh_clears_credentials() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/auth/refresh")
            .with_status(401)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let manager = manager(&server.url(), &dir, Some(pair_expiring_in(1)));

        assert!(manager.get_valid_access_token().await.is_none());
        assert!(!manager.is_logged_in().await);
        // The persisted copy is gone too.
        let store = CredentialStore::new(dir.path().join("credentials.enc"));
        assert!(store.load().is_none());
    }

    #[tokio::test]
    async fn no_credentials_means_no_token() {
        let dir = TempDir::new().unwrap();
        let manager = manager("http://127.0.0.1:9", &dir, None);
        assert!(manager.get_valid_access_token().await.is_none());
    }
}
