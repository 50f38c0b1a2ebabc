//! Core data models for the sync agent

use serde::{Deserialize, Serialize};

/// Control-plane coordinates discovered from the client lockfile.
///
/// Immutable; a reconnect replaces the whole value. Equality on port and
/// secret drives connected-transition suppression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub port: u16,
    pub secret: String,
    pub scheme: String,
}

/// Opaque event envelope from the client's event bus. Transient, never
/// persisted.
#[derive(Debug, Clone)]
pub struct RawGameEvent {
    pub kind: String,
    pub uri: String,
    pub data: serde_json::Value,
}

/// The client's own summary of a just-finished game.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndOfGamePayload {
    pub game_id: i64,
    pub queue_id: i64,
    #[serde(default)]
    pub teams: Vec<EogTeam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EogTeam {
    pub team_id: i64,
    /// Aggregate outcome for the whole team. Authoritative over the
    /// per-player flag when the two disagree.
    #[serde(default)]
    pub is_winning_team: bool,
    #[serde(default)]
    pub players: Vec<EogPlayer>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EogPlayer {
    pub champion_id: i64,
    #[serde(default)]
    pub champion_name: String,
    #[serde(default)]
    pub summoner_name: String,
    #[serde(default)]
    pub is_local_player: bool,
    /// The four ambiguous positional signals, any of which may be blank or
    /// a sentinel ("NONE"/"UNKNOWN"). Evaluated in this priority order.
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub lane: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub player_position: String,
    #[serde(default)]
    pub stats: EogStats,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EogStats {
    #[serde(default)]
    pub kills: i64,
    #[serde(default)]
    pub deaths: i64,
    #[serde(default)]
    pub assists: i64,
    #[serde(default)]
    pub gold_earned: i64,
    #[serde(default)]
    pub minions_killed: i64,
    #[serde(default)]
    pub neutral_minions_killed: i64,
    #[serde(default)]
    pub vision_score: i64,
    #[serde(default)]
    pub win: bool,
}

/// Secondary match-history detail used to backfill blank lane/role strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchDetail {
    #[serde(default)]
    pub participants: Vec<DetailParticipant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailParticipant {
    pub team_id: i64,
    pub champion_id: i64,
    #[serde(default)]
    pub lane: String,
    #[serde(default)]
    pub role: String,
}

/// Canonical match record submitted to the backend. Created once, submitted
/// once (idempotent retry keyed by game id), then owned by the backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    pub game_id: i64,
    pub champion_id: i64,
    pub champion_name: String,
    pub role: String,
    /// Lane-relationship fields from the static role->index table. Empty
    /// for non-conventional modes or malformed teams.
    pub lane: String,
    pub ally_champion: String,
    pub enemy_champion: String,
    pub enemy_ally_champion: String,
    pub kills: i64,
    pub deaths: i64,
    pub assists: i64,
    pub gold_earned: i64,
    /// Creep score; vision score substitutes for the support role.
    pub creep_score: i64,
    pub vision_score: i64,
    pub win: bool,
    pub game_mode: String,
    pub rank_tier: String,
    pub rank_division: String,
    pub league_points: i64,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}

/// Identity of the currently signed-in player on the local client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummonerInfo {
    #[serde(alias = "gameName", default)]
    pub display_name: String,
    #[serde(default)]
    pub tag_line: String,
    #[serde(default)]
    pub profile_icon_id: i64,
    #[serde(default)]
    pub puuid: String,
}

/// Tier/division/LP for the primary ranked queue.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankInfo {
    #[serde(default)]
    pub tier: String,
    #[serde(default)]
    pub division: String,
    #[serde(default)]
    pub league_points: i64,
}
