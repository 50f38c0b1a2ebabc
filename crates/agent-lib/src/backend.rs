//! Remote backend client
//!
//! Bearer JSON over HTTPS: the auth lifecycle, profile lookup-or-create,
//! and match submission. Any success status code counts as success.

use crate::auth::{CredentialPair, UserIdentity};
use crate::error::{Result, SyncError};
use crate::models::{MatchRecord, SummonerInfo};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

const PROFILE_ID_HEADER: &str = "X-Profile-Id";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    access_token: String,
    refresh_token: String,
    expires_at: chrono::DateTime<chrono::Utc>,
    user: UserIdentity,
}

impl From<AuthResponse> for CredentialPair {
    fn from(response: AuthResponse) -> Self {
        CredentialPair {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_at,
            user: response.user,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProfileLookup<'a> {
    display_name: &'a str,
    tag_line: &'a str,
    puuid: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: String,
}

/// HTTP client for the tracker backend.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = url::Url::parse(base_url)
            .map_err(|e| SyncError::Transient(format!("invalid backend URL: {}", e)))?;

        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(SyncError::from)?;

        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<CredentialPair> {
        let response: AuthResponse = self
            .post_json(
                "/api/auth/login",
                &serde_json::json!({"username": username, "password": password}),
                None,
            )
            .await?;
        info!(username, "logged in");
        Ok(response.into())
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<CredentialPair> {
        let response: AuthResponse = self
            .post_json(
                "/api/auth/register",
                &serde_json::json!({"username": username, "password": password}),
                None,
            )
            .await?;
        info!(username, "registered");
        Ok(response.into())
    }

    pub async fn refresh(&self, refresh_token: &str) -> Result<CredentialPair> {
        let response: AuthResponse = self
            .post_json(
                "/api/auth/refresh",
                &serde_json::json!({"refreshToken": refresh_token}),
                None,
            )
            .await?;
        Ok(response.into())
    }

    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/api/auth/logout", self.base_url))
            .json(&serde_json::json!({"refreshToken": refresh_token}))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(SyncError::Transient(format!(
                "logout rejected: {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Case-insensitive lookup-or-create; the backend returns a stable
    /// profile id for (display name, tag, opaque player id).
    pub async fn lookup_or_create_profile(
        &self,
        token: &str,
        summoner: &SummonerInfo,
    ) -> Result<String> {
        let body = ProfileLookup {
            display_name: &summoner.display_name,
            tag_line: &summoner.tag_line,
            puuid: &summoner.puuid,
        };
        let profile: ProfileResponse = self
            .post_json("/api/profiles/lookup", &body, Some(token))
            .await?;
        debug!(profile_id = %profile.id, "profile resolved");
        Ok(profile.id)
    }

    /// Submits one match record. Uniqueness per profile is the backend's
    /// concern (upsert-or-reject on the game id); any success status is
    /// treated as success.
    pub async fn submit_match(
        &self,
        token: &str,
        profile_id: &str,
        record: &MatchRecord,
    ) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/api/matches", self.base_url))
            .bearer_auth(token)
            .header(PROFILE_ID_HEADER, profile_id)
            .json(record)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SyncError::Transient(format!(
                "match submission rejected: {}",
                response.status()
            )));
        }
        debug!(game_id = record.game_id, "match submitted");
        Ok(())
    }

    async fn post_json<T, B>(&self, path: &str, body: &B, token: Option<&str>) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize,
    {
        let mut request = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SyncError::Transient(format!(
                "backend {} on {}",
                response.status(),
                path
            )));
        }
        Ok(response.json().await?)
    }
}
