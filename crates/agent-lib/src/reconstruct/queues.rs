//! Queue-id to game-mode label table

/// Numeric queue id of the primary ranked queue; the only mode the sync
/// pipeline submits.
pub const RANKED_SOLO_QUEUE_ID: i64 = 420;

/// Fallback label for queue ids the table does not know.
pub const FALLBACK_MODE: &str = "Other";

const QUEUE_LABELS: &[(i64, &str)] = &[
    (400, "Normal Draft"),
    (420, "Ranked Solo/Duo"),
    (430, "Normal Blind"),
    (440, "Ranked Flex"),
    (450, "ARAM"),
    (490, "Quickplay"),
    (700, "Clash"),
    (1700, "Arena"),
];

/// Queue ids played on the conventional five-role map. Only these modes get
/// lane-relationship fields.
const FIVE_ROLE_QUEUES: &[i64] = &[400, 420, 430, 440, 490, 700];

/// Maps a queue id to its display label; unrecognized ids map to a generic
/// fallback rather than failing.
pub fn game_mode_label(queue_id: i64) -> &'static str {
    QUEUE_LABELS
        .iter()
        .find(|(id, _)| *id == queue_id)
        .map(|(_, label)| *label)
        .unwrap_or(FALLBACK_MODE)
}

pub fn is_five_role_queue(queue_id: i64) -> bool {
    FIVE_ROLE_QUEUES.contains(&queue_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_queues_map_to_labels() {
        assert_eq!(game_mode_label(420), "Ranked Solo/Duo");
        assert_eq!(game_mode_label(450), "ARAM");
    }

    #[test]
    fn unknown_queue_maps_to_fallback() {
        assert_eq!(game_mode_label(99999), FALLBACK_MODE);
    }

    #[test]
    fn aram_is_not_a_five_role_mode() {
        assert!(is_five_role_queue(420));
        assert!(!is_five_role_queue(450));
        assert!(!is_five_role_queue(1700));
    }
}
