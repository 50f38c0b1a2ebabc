//! Match reconstruction
//!
//! Converts one raw end-of-game payload into the canonical match record.
//! Deterministic apart from wall-clock timestamping. The hard part is that
//! per-player positional fields may be blank or sentinels, so role and
//! lane-opponent identity go through the fallback chain in [`roles`].

pub mod queues;
pub mod roles;

use crate::error::{Result, SyncError};
use crate::models::{EndOfGamePayload, EogPlayer, EogTeam, MatchDetail, MatchRecord, RankInfo};
use roles::Role;
use tracing::debug;

const TEAM_SIZE: usize = 5;

/// Maps an end-of-game payload onto a canonical record.
///
/// `detail`, when present, backfills blank lane/role strings before role
/// resolution. A missing local player is a hard error; a malformed team
/// degrades to empty lane fields instead of failing the record.
pub fn map(
    payload: &EndOfGamePayload,
    rank: &RankInfo,
    detail: Option<&MatchDetail>,
) -> Result<MatchRecord> {
    let mut teams = payload.teams.clone();
    if let Some(detail) = detail {
        backfill_from_detail(&mut teams, detail);
    }

    let (team_idx, player_idx) = find_local_player(&teams)
        .ok_or(SyncError::DataIncomplete("local player missing from payload"))?;

    let team = &teams[team_idx];
    let player = &team.players[player_idx];

    let ordinal = (team.players.len() == TEAM_SIZE).then_some(player_idx);
    let resolution = roles::resolve_role(player, ordinal);
    let role = roles::apply_carry_correction(resolution, player.champion_id);
    debug!(
        champion = %player.champion_name,
        role = role.label(),
        source = ?resolution.source,
        "resolved local player role"
    );

    let enemy_team = teams.iter().enumerate().find_map(|(i, t)| {
        (i != team_idx).then_some(t)
    });

    let (lane, ally, enemy, enemy_ally) =
        lane_relationships(role, payload.queue_id, team, enemy_team);

    let stats = &player.stats;
    // Different resource signal for the support role.
    let creep_score = if role == Role::Support {
        stats.vision_score
    } else {
        stats.minions_killed + stats.neutral_minions_killed
    };

    Ok(MatchRecord {
        game_id: payload.game_id,
        champion_id: player.champion_id,
        champion_name: player.champion_name.clone(),
        role: role.label().to_string(),
        lane,
        ally_champion: ally,
        enemy_champion: enemy,
        enemy_ally_champion: enemy_ally,
        kills: stats.kills,
        deaths: stats.deaths,
        assists: stats.assists,
        gold_earned: stats.gold_earned,
        creep_score,
        vision_score: stats.vision_score,
        // The team's aggregate flag is authoritative over the player's own.
        win: team.is_winning_team,
        game_mode: queues::game_mode_label(payload.queue_id).to_string(),
        rank_tier: rank.tier.clone(),
        rank_division: rank.division.clone(),
        league_points: rank.league_points,
        recorded_at: chrono::Utc::now(),
    })
}

/// Backfills missing lane/role strings onto players matched by team id and
/// champion id.
fn backfill_from_detail(teams: &mut [EogTeam], detail: &MatchDetail) {
    for team in teams.iter_mut() {
        for player in team.players.iter_mut() {
            let Some(participant) = detail
                .participants
                .iter()
                .find(|p| p.team_id == team.team_id && p.champion_id == player.champion_id)
            else {
                continue;
            };
            if is_blank(&player.lane) && !is_blank(&participant.lane) {
                player.lane = participant.lane.clone();
            }
            if is_blank(&player.role) && !is_blank(&participant.role) {
                player.role = participant.role.clone();
            }
        }
    }
}

fn is_blank(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("NONE")
        || trimmed.eq_ignore_ascii_case("UNKNOWN")
}

fn find_local_player(teams: &[EogTeam]) -> Option<(usize, usize)> {
    teams.iter().enumerate().find_map(|(ti, team)| {
        team.players
            .iter()
            .position(|p| p.is_local_player)
            .map(|pi| (ti, pi))
    })
}

/// Lane relationships from the static role->index table; empty for
/// non-five-role modes and for teams not of exactly five players.
fn lane_relationships(
    role: Role,
    queue_id: i64,
    own_team: &EogTeam,
    enemy_team: Option<&EogTeam>,
) -> (String, String, String, String) {
    let empty = || {
        (
            String::new(),
            String::new(),
            String::new(),
            String::new(),
        )
    };

    if !queues::is_five_role_queue(queue_id) {
        return empty();
    }
    let Some(enemy_team) = enemy_team else {
        return empty();
    };
    if own_team.players.len() != TEAM_SIZE || enemy_team.players.len() != TEAM_SIZE {
        return empty();
    }

    let (ally_idx, enemy_idx, enemy_ally_idx) = roles::lane_partners(role);
    (
        role.lane_label().to_string(),
        champion_at(own_team, ally_idx),
        champion_at(enemy_team, enemy_idx),
        champion_at(enemy_team, enemy_ally_idx),
    )
}

fn champion_at(team: &EogTeam, index: usize) -> String {
    team.players
        .get(index)
        .map(|p: &EogPlayer| p.champion_name.clone())
        .unwrap_or_default()
}
