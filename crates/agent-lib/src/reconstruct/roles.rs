//! Role resolution heuristics
//!
//! Per-player positional fields in the end-of-game payload are frequently
//! blank or sentinel values, so role identity runs through an ordered chain
//! of resolvers, each returning an opinion or passing, stopping at the
//! first resolution.

use crate::models::EogPlayer;

/// The five canonical roles of the conventional map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Top,
    Jungle,
    Mid,
    Carry,
    Support,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::Top => "Top",
            Role::Jungle => "Jungle",
            Role::Mid => "Mid",
            Role::Carry => "Carry",
            Role::Support => "Support",
        }
    }

    pub fn lane_label(self) -> &'static str {
        match self {
            Role::Top => "TOP_LANE",
            Role::Jungle => "JUNGLE",
            Role::Mid => "MID_LANE",
            Role::Carry | Role::Support => "BOT_LANE",
        }
    }
}

/// Fixed index->role ordering used as the last-resort fallback and as the
/// basis of the lane-relationship table.
pub const INDEX_ROLE_ORDER: [Role; 5] = [
    Role::Top,
    Role::Jungle,
    Role::Mid,
    Role::Carry,
    Role::Support,
];

/// Champion ids conventionally played as the bot-lane carry. Used by the
/// targeted support-to-carry correction.
pub const KNOWN_CARRY_CHAMPIONS: &[i64] = &[
    15,  // Sivir
    18,  // Tristana
    21,  // Miss Fortune
    22,  // Ashe
    29,  // Twitch
    51,  // Caitlyn
    67,  // Vayne
    81,  // Ezreal
    96,  // Kog'Maw
    110, // Varus
    119, // Draven
    145, // Kai'Sa
    202, // Jhin
    221, // Zeri
    222, // Jinx
    236, // Lucian
    360, // Samira
    429, // Kalista
    498, // Xayah
    895, // Nilah
];

/// How a role was decided; drives the ambiguous-signal carry correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    /// An explicit positional string resolved it.
    Signal,
    /// Ordinal index within the team's player list.
    IndexFallback,
    /// Nothing was available at all; hard default. Known accuracy
    /// limitation: non-bot-lane players can be misclassified.
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub role: Role,
    pub source: ResolutionSource,
}

/// Resolves a player's role through the full fallback chain.
///
/// `team_index` is the player's ordinal index (0..4) within their team, or
/// `None` when the team is not exactly five players.
pub fn resolve_role(player: &EogPlayer, team_index: Option<usize>) -> Resolution {
    if let Some(role) = from_signals(player) {
        return Resolution {
            role,
            source: ResolutionSource::Signal,
        };
    }

    if let Some(role) = team_index.and_then(|i| INDEX_ROLE_ORDER.get(i).copied()) {
        return Resolution {
            role,
            source: ResolutionSource::IndexFallback,
        };
    }

    Resolution {
        role: Role::Carry,
        source: ResolutionSource::Default,
    }
}

/// Support resolved under ambiguous signals with a known-carry champion is
/// reclassified to carry.
pub fn apply_carry_correction(resolution: Resolution, champion_id: i64) -> Role {
    if resolution.role == Role::Support
        && resolution.source != ResolutionSource::Signal
        && KNOWN_CARRY_CHAMPIONS.contains(&champion_id)
    {
        return Role::Carry;
    }
    resolution.role
}

/// Lane-relationship indices for a role: (ally on own team, enemy on the
/// enemy team, enemy's ally on the enemy team). A static table, not
/// positional proximity.
pub fn lane_partners(role: Role) -> (usize, usize, usize) {
    match role {
        Role::Top => (1, 0, 1),
        Role::Jungle => (2, 1, 2),
        Role::Mid => (1, 2, 1),
        Role::Carry => (4, 3, 4),
        Role::Support => (3, 4, 3),
    }
}

/// Candidate fields in fixed priority order; first non-empty, non-sentinel
/// value that normalizes wins.
fn from_signals(player: &EogPlayer) -> Option<Role> {
    [
        player.position.as_str(),
        player.lane.as_str(),
        player.role.as_str(),
        player.player_position.as_str(),
    ]
    .into_iter()
    .filter(|candidate| !is_sentinel(candidate))
    .find_map(normalize)
}

fn is_sentinel(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("NONE")
        || trimmed.eq_ignore_ascii_case("UNKNOWN")
}

/// Normalizes the many spellings the client uses for the five roles.
fn normalize(candidate: &str) -> Option<Role> {
    match candidate.trim().to_ascii_uppercase().as_str() {
        "TOP" | "TOPLANE" | "TOP_LANE" => Some(Role::Top),
        "JUNGLE" | "JGL" | "JUNGLER" | "NONE_JUNGLE" => Some(Role::Jungle),
        "MID" | "MIDDLE" | "MID_LANE" | "MIDLANE" => Some(Role::Mid),
        "BOT" | "BOTTOM" | "BOT_LANE" | "ADC" | "CARRY" | "DUO_CARRY" => Some(Role::Carry),
        "SUP" | "SUPP" | "SUPPORT" | "UTILITY" | "DUO_SUPPORT" => Some(Role::Support),
        _ => None,
    }
}
