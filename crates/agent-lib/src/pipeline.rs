//! Sync pipeline orchestration
//!
//! Consumes GameEnded signals and drives de-duplication, policy checks,
//! reconstruction, and authenticated upload. Reports a short rotating
//! status string; nothing here ever crashes the background loop.

use crate::auth::CredentialManager;
use crate::backend::BackendClient;
use crate::client::ClientRest;
use crate::error::SyncError;
use crate::models::{EndOfGamePayload, RankInfo, SummonerInfo};
use crate::reconstruct::{self, queues};
use dashmap::DashSet;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

const STATUS_IDLE: &str = "Waiting for games";
const SKIP_NOT_RANKED: &str = "Not Ranked Solo/Duo";
const ERROR_NO_PROFILE: &str = "Could not setup profile";
const ERROR_NOT_LOGGED_IN: &str = "Not logged in";
const ERROR_UPLOAD: &str = "Upload failed";
const ERROR_INCOMPLETE: &str = "Incomplete match data";

/// Terminal outcome of one game-ended signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Synced { champion: String, win: bool },
    Skipped(String),
    Failed(String),
}

impl SyncOutcome {
    /// The user-visible status string.
    pub fn status(&self) -> String {
        match self {
            SyncOutcome::Synced { champion, win } => {
                format!("Synced: {} ({})", champion, if *win { "Win" } else { "Loss" })
            }
            SyncOutcome::Skipped(reason) => format!("Skipped: {}", reason),
            SyncOutcome::Failed(reason) => format!("Error: {}", reason),
        }
    }
}

/// Orchestrates discovery output into authenticated uploads.
pub struct SyncPipeline {
    backend: Arc<BackendClient>,
    credentials: Arc<CredentialManager>,
    /// De-duplication scoped to this pipeline instance; the local client
    /// can raise the same end-of-game signal more than once, possibly
    /// concurrently.
    seen_games: DashSet<i64>,
    profile_id: RwLock<Option<String>>,
    identity: RwLock<Option<SummonerInfo>>,
    rank: RwLock<RankInfo>,
    status_tx: watch::Sender<String>,
}

impl SyncPipeline {
    pub fn new(
        backend: Arc<BackendClient>,
        credentials: Arc<CredentialManager>,
    ) -> (Arc<Self>, watch::Receiver<String>) {
        let (status_tx, status_rx) = watch::channel(STATUS_IDLE.to_string());
        (
            Arc::new(Self {
                backend,
                credentials,
                seen_games: DashSet::new(),
                profile_id: RwLock::new(None),
                identity: RwLock::new(None),
                rank: RwLock::new(RankInfo::default()),
                status_tx,
            }),
            status_rx,
        )
    }

    /// Handles one end-of-game signal. Returns `None` when the game id was
    /// already seen; duplicates drop silently, without touching the
    /// status string.
    pub async fn on_game_ended(
        &self,
        payload: EndOfGamePayload,
        client: Option<&ClientRest>,
    ) -> Option<SyncOutcome> {
        // Atomic check-and-insert; concurrent duplicate arrivals are a real
        // race, not a single-threaded assumption.
        if !self.seen_games.insert(payload.game_id) {
            debug!(game_id = payload.game_id, "duplicate game-ended signal dropped");
            return None;
        }

        let outcome = self.process(payload, client).await;
        self.status_tx.send_replace(outcome.status());
        Some(outcome)
    }

    async fn process(
        &self,
        payload: EndOfGamePayload,
        client: Option<&ClientRest>,
    ) -> SyncOutcome {
        // Secondary detail for role backfill; its absence is tolerated.
        let detail = match client {
            Some(client) => match client.match_detail(payload.game_id).await {
                Ok(detail) => Some(detail),
                Err(err) => {
                    debug!(error = %err, "match detail unavailable, continuing without backfill");
                    None
                }
            },
            None => None,
        };

        // Game-mode allow-list: only the primary ranked queue proceeds.
        if payload.queue_id != queues::RANKED_SOLO_QUEUE_ID {
            info!(
                queue_id = payload.queue_id,
                mode = queues::game_mode_label(payload.queue_id),
                "game excluded by mode policy"
            );
            return SyncOutcome::Skipped(SKIP_NOT_RANKED.to_string());
        }

        // Unknown active profile aborts with a reported error, never a
        // silent drop.
        let Some(profile_id) = self.profile_id.read().await.clone() else {
            return SyncOutcome::Failed(ERROR_NO_PROFILE.to_string());
        };

        let rank = self.rank.read().await.clone();
        let record = match reconstruct::map(&payload, &rank, detail.as_ref()) {
            Ok(record) => record,
            Err(SyncError::DataIncomplete(what)) => {
                // The event will not recur; abandon it.
                warn!(game_id = payload.game_id, what, "payload incomplete, abandoning event");
                return SyncOutcome::Failed(ERROR_INCOMPLETE.to_string());
            }
            Err(err) => {
                warn!(error = %err, "reconstruction failed");
                return SyncOutcome::Failed(ERROR_UPLOAD.to_string());
            }
        };

        let Some(token) = self.credentials.get_valid_access_token().await else {
            return SyncOutcome::Failed(ERROR_NOT_LOGGED_IN.to_string());
        };

        // No automatic retry on failure: the id is already marked seen, an
        // accepted trade-off against unbounded reprocessing.
        match self
            .backend
            .submit_match(&token, &profile_id, &record)
            .await
        {
            Ok(()) => {
                info!(game_id = record.game_id, champion = %record.champion_name, "match synced");
                SyncOutcome::Synced {
                    champion: record.champion_name,
                    win: record.win,
                }
            }
            Err(err) => {
                warn!(game_id = record.game_id, error = %err, "match submission failed");
                SyncOutcome::Failed(ERROR_UPLOAD.to_string())
            }
        }
    }

    /// Identity watcher: on a changed signed-in identity, re-resolves or
    /// creates the backend profile. Independent of match submission.
    pub async fn update_identity(&self, summoner: SummonerInfo) {
        {
            let identity = self.identity.read().await;
            if identity.as_ref() == Some(&summoner) {
                return;
            }
        }
        info!(name = %summoner.display_name, tag = %summoner.tag_line, "active identity changed");

        // The installed profile belongs to the previous identity; drop it
        // now so submissions abort until the new lookup succeeds.
        *self.profile_id.write().await = None;

        let Some(token) = self.credentials.get_valid_access_token().await else {
            self.status_tx
                .send_replace(format!("Error: {}", ERROR_NOT_LOGGED_IN));
            return;
        };

        match self.backend.lookup_or_create_profile(&token, &summoner).await {
            Ok(profile_id) => {
                *self.profile_id.write().await = Some(profile_id);
                *self.identity.write().await = Some(summoner);
            }
            Err(err) => {
                warn!(error = %err, "profile lookup-or-create failed");
                self.status_tx
                    .send_replace(format!("Error: {}", ERROR_NO_PROFILE));
            }
        }
    }

    pub async fn set_rank(&self, rank: RankInfo) {
        *self.rank.write().await = rank;
    }

    pub async fn set_profile_id(&self, profile_id: String) {
        *self.profile_id.write().await = Some(profile_id);
    }

    pub async fn profile_id(&self) -> Option<String> {
        self.profile_id.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{CredentialPair, CredentialStore, UserIdentity};
    use crate::models::{EogPlayer, EogStats, EogTeam};
    use chrono::{Duration as ChronoDuration, Utc};
    use tempfile::TempDir;

    fn logged_in_pipeline(
        server_url: &str,
        dir: &TempDir,
    ) -> (Arc<SyncPipeline>, watch::Receiver<String>) {
        let store = CredentialStore::new(dir.path().join("credentials.enc"));
        store
            .save(&CredentialPair {
                access_token: "tok".to_string(),
                refresh_token: "ref".to_string(),
                expires_at: Utc::now() + ChronoDuration::hours(2),
                user: UserIdentity {
                    id: "u-1".to_string(),
                    username: "tester".to_string(),
                },
            })
            .unwrap();

        let backend = Arc::new(BackendClient::new(server_url).unwrap());
        let credentials = Arc::new(CredentialManager::new(Arc::clone(&backend), store));
        SyncPipeline::new(backend, credentials)
    }

    fn player(index: usize, team_id: i64, local: bool) -> EogPlayer {
        EogPlayer {
            champion_id: team_id * 10 + index as i64,
            champion_name: format!("Champ{}{}", team_id, index),
            summoner_name: format!("sum{}", index),
            is_local_player: local,
            position: String::new(),
            lane: if local { "BOTTOM".to_string() } else { String::new() },
            role: String::new(),
            player_position: String::new(),
            stats: EogStats {
                win: false,
                ..Default::default()
            },
        }
    }

    fn ranked_payload(game_id: i64) -> EndOfGamePayload {
        EndOfGamePayload {
            game_id,
            queue_id: queues::RANKED_SOLO_QUEUE_ID,
            teams: vec![
                EogTeam {
                    team_id: 100,
                    is_winning_team: true,
                    players: (0..5).map(|i| player(i, 100, i == 3)).collect(),
                },
                EogTeam {
                    team_id: 200,
                    is_winning_team: false,
                    players: (0..5).map(|i| player(i, 200, false)).collect(),
                },
            ],
        }
    }

    #[tokio::test]
    async fn same_game_id_twice_yields_one_upload_attempt() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/api/matches")
            .with_status(200)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let (pipeline, _status) = logged_in_pipeline(&server.url(), &dir);
        pipeline.set_profile_id("p-1".to_string()).await;

        let first = pipeline.on_game_ended(ranked_payload(900), None).await;
        assert!(matches!(first, Some(SyncOutcome::Synced { .. })));

        // Duplicate drops silently.
        let second = pipeline.on_game_ended(ranked_payload(900), None).await;
        assert!(second.is_none());

        submit.assert_async().await;
    }

    #[tokio::test]
    async fn non_ranked_queue_is_skipped_and_never_submitted() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/api/matches")
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let (pipeline, status) = logged_in_pipeline(&server.url(), &dir);
        pipeline.set_profile_id("p-1".to_string()).await;

        let mut payload = ranked_payload(901);
        payload.queue_id = 450;

        let outcome = pipeline.on_game_ended(payload, None).await;
        assert_eq!(
            outcome,
            Some(SyncOutcome::Skipped("Not Ranked Solo/Duo".to_string()))
        );
        assert_eq!(*status.borrow(), "Skipped: Not Ranked Solo/Duo");
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn unknown_profile_reports_error_not_silent_drop() {
        let server = mockito::Server::new_async().await;
        let dir = TempDir::new().unwrap();
        let (pipeline, status) = logged_in_pipeline(&server.url(), &dir);

        let outcome = pipeline.on_game_ended(ranked_payload(902), None).await;
        assert_eq!(
            outcome,
            Some(SyncOutcome::Failed("Could not setup profile".to_string()))
        );
        assert_eq!(*status.borrow(), "Error: Could not setup profile");
    }

    #[tokio::test]
    async fn failed_submission_reports_failed_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/api/matches")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let (pipeline, status) = logged_in_pipeline(&server.url(), &dir);
        pipeline.set_profile_id("p-1".to_string()).await;

        let outcome = pipeline.on_game_ended(ranked_payload(903), None).await;
        assert!(matches!(outcome, Some(SyncOutcome::Failed(_))));
        assert_eq!(*status.borrow(), "Error: Upload failed");

        // The id is marked seen; a duplicate does not re-attempt.
        let retry = pipeline.on_game_ended(ranked_payload(903), None).await;
        assert!(retry.is_none());
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn synced_status_names_champion_and_outcome() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/matches")
            .with_status(200)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let (pipeline, status) = logged_in_pipeline(&server.url(), &dir);
        pipeline.set_profile_id("p-1".to_string()).await;

        pipeline.on_game_ended(ranked_payload(904), None).await;
        // Local player sits at winning-team index 3.
        assert_eq!(*status.borrow(), "Synced: Champ1003 (Win)");
    }

    #[tokio::test]
    async fn payload_without_local_player_reports_incomplete_data() {
        let mut server = mockito::Server::new_async().await;
        let submit = server
            .mock("POST", "/api/matches")
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let (pipeline, status) = logged_in_pipeline(&server.url(), &dir);
        pipeline.set_profile_id("p-1".to_string()).await;

        let mut payload = ranked_payload(905);
        payload.teams[0].players[3].is_local_player = false;

        let outcome = pipeline.on_game_ended(payload, None).await;
        assert_eq!(
            outcome,
            Some(SyncOutcome::Failed("Incomplete match data".to_string()))
        );
        assert_eq!(*status.borrow(), "Error: Incomplete match data");
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn failed_profile_lookup_never_submits_under_previous_profile() {
        let mut server = mockito::Server::new_async().await;
        let alice_lookup = server
            .mock("POST", "/api/profiles/lookup")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"puuid": "puuid-alice"}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "p-alice"}"#)
            .create_async()
            .await;
        let bob_lookup = server
            .mock("POST", "/api/profiles/lookup")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"puuid": "puuid-bob"}"#.to_string(),
            ))
            .with_status(500)
            .create_async()
            .await;
        let submit = server
            .mock("POST", "/api/matches")
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let (pipeline, status) = logged_in_pipeline(&server.url(), &dir);

        let identity = |name: &str, puuid: &str| SummonerInfo {
            display_name: name.to_string(),
            tag_line: "EUW".to_string(),
            profile_icon_id: 1,
            puuid: puuid.to_string(),
        };

        pipeline.update_identity(identity("Alice", "puuid-alice")).await;
        assert_eq!(pipeline.profile_id().await.as_deref(), Some("p-alice"));

        // The account changes but the new lookup fails: the previous
        // profile id must not survive into the next submission.
        pipeline.update_identity(identity("Bob", "puuid-bob")).await;
        assert_eq!(*status.borrow(), "Error: Could not setup profile");
        assert!(pipeline.profile_id().await.is_none());

        let outcome = pipeline.on_game_ended(ranked_payload(906), None).await;
        assert_eq!(
            outcome,
            Some(SyncOutcome::Failed("Could not setup profile".to_string()))
        );
        alice_lookup.assert_async().await;
        bob_lookup.assert_async().await;
        submit.assert_async().await;
    }

    #[tokio::test]
    async fn identity_change_resolves_profile() {
        let mut server = mockito::Server::new_async().await;
        let lookup = server
            .mock("POST", "/api/profiles/lookup")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"id": "p-77"}"#)
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let (pipeline, _status) = logged_in_pipeline(&server.url(), &dir);

        let summoner = SummonerInfo {
            display_name: "Tester".to_string(),
            tag_line: "EUW".to_string(),
            profile_icon_id: 1,
            puuid: "puuid-1".to_string(),
        };
        pipeline.update_identity(summoner.clone()).await;
        assert_eq!(pipeline.profile_id().await.as_deref(), Some("p-77"));

        // Same identity again must not re-resolve.
        pipeline.update_identity(summoner).await;
        lookup.assert_async().await;
    }
}
