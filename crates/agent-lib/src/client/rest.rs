//! REST surface of the local client control plane
//!
//! Loopback-only, self-signed TLS, HTTP Basic auth with the fixed `riot`
//! username and the discovered shared secret as password.

use crate::error::{Result, SyncError};
use crate::models::{ConnectionInfo, EndOfGamePayload, MatchDetail, RankInfo, SummonerInfo};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const BASIC_AUTH_USER: &str = "riot";
const PRIMARY_RANKED_QUEUE: &str = "RANKED_SOLO_5x5";

/// Per-queue ranked standings as the client reports them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStatsDto {
    #[serde(default)]
    pub queues: Vec<RankedQueueDto>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedQueueDto {
    #[serde(default)]
    pub queue_type: String,
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub league_points: i64,
}

/// HTTP client toward the local game client.
pub struct ClientRest {
    http: reqwest::Client,
    base_url: String,
    secret: String,
}

impl ClientRest {
    pub fn new(info: &ConnectionInfo, timeout: Duration) -> Result<Self> {
        // The endpoint is loopback-only and presents a self-signed cert, so
        // trust validation is disabled for this client alone.
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(timeout)
            .build()
            .map_err(SyncError::from)?;

        Ok(Self {
            http,
            base_url: format!("{}://127.0.0.1:{}", info.scheme, info.port),
            secret: info.secret.clone(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .basic_auth(BASIC_AUTH_USER, Some(&self.secret))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(SyncError::Transient(format!(
                "client API {} on {}",
                status, path
            )));
        }

        Ok(response.json().await?)
    }

    /// Identity of the currently signed-in player.
    pub async fn current_summoner(&self) -> Result<SummonerInfo> {
        self.get("/lol-summoner/v1/current-summoner").await
    }

    /// Tier/division/LP; only the primary ranked entry is retained.
    pub async fn current_rank(&self) -> Result<RankInfo> {
        let stats: RankedStatsDto = self.get("/lol-ranked/v1/current-ranked-stats").await?;
        Ok(primary_rank(&stats))
    }

    /// Polling fallback for the same data the event stream pushes.
    pub async fn eog_stats_block(&self) -> Result<EndOfGamePayload> {
        self.get("/lol-end-of-game/v1/eog-stats-block").await
    }

    /// Secondary detail for role backfill; callers tolerate its absence.
    pub async fn match_detail(&self, game_id: i64) -> Result<MatchDetail> {
        debug!(game_id, "fetching match-history detail");
        self.get(&format!("/lol-match-history/v1/games/{}", game_id))
            .await
    }
}

fn primary_rank(stats: &RankedStatsDto) -> RankInfo {
    stats
        .queues
        .iter()
        .find(|q| q.queue_type == PRIMARY_RANKED_QUEUE)
        .map(|q| RankInfo {
            tier: q.tier.clone(),
            division: q.division.clone(),
            league_points: q.league_points,
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_rank_keeps_only_solo_queue() {
        let stats = RankedStatsDto {
            queues: vec![
                RankedQueueDto {
                    queue_type: "RANKED_FLEX_SR".to_string(),
                    tier: "GOLD".to_string(),
                    division: "II".to_string(),
                    league_points: 40,
                },
                RankedQueueDto {
                    queue_type: "RANKED_SOLO_5x5".to_string(),
                    tier: "PLATINUM".to_string(),
                    division: "IV".to_string(),
                    league_points: 17,
                },
            ],
        };

        let rank = primary_rank(&stats);
        assert_eq!(rank.tier, "PLATINUM");
        assert_eq!(rank.division, "IV");
        assert_eq!(rank.league_points, 17);
    }

    #[test]
    fn missing_solo_queue_yields_empty_rank() {
        let rank = primary_rank(&RankedStatsDto::default());
        assert!(rank.tier.is_empty());
        assert_eq!(rank.league_points, 0);
    }

    fn connection_to(server: &mockito::Server) -> ConnectionInfo {
        let port = server
            .host_with_port()
            .rsplit(':')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        ConnectionInfo {
            port,
            secret: "sekrit".to_string(),
            scheme: "http".to_string(),
        }
    }

    #[tokio::test]
    async fn eog_stats_block_fetches_pending_payload_with_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/lol-end-of-game/v1/eog-stats-block")
            .match_header("authorization", "Basic cmlvdDpzZWtyaXQ=")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"gameId": 7, "queueId": 420, "teams": []}"#)
            .create_async()
            .await;

        let rest = ClientRest::new(&connection_to(&server), Duration::from_secs(5)).unwrap();
        let payload = rest.eog_stats_block().await.unwrap();
        assert_eq!(payload.game_id, 7);
        assert_eq!(payload.queue_id, 420);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn no_pending_block_is_a_transient_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/lol-end-of-game/v1/eog-stats-block")
            .with_status(404)
            .create_async()
            .await;

        let rest = ClientRest::new(&connection_to(&server), Duration::from_secs(5)).unwrap();
        let result = rest.eog_stats_block().await;
        assert!(matches!(result, Err(SyncError::Transient(_))));
    }
}
