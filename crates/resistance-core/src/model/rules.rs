//! Fixed mission schedule of the five-round game.

/// Missions in a full game.
pub const ROUNDS_PER_GAME: usize = 5;
/// Failed missions the saboteurs need to win.
pub const FAILURES_TO_WIN: usize = 3;

pub const MIN_PLAYERS: usize = 5;
pub const MAX_PLAYERS: usize = 10;

const TEAM_SIZES: [[usize; ROUNDS_PER_GAME]; MAX_PLAYERS - MIN_PLAYERS + 1] = [
    [2, 3, 2, 3, 3],
    [2, 3, 4, 3, 4],
    [2, 3, 3, 4, 4],
    [3, 4, 4, 5, 5],
    [3, 4, 4, 5, 5],
    [3, 4, 4, 5, 5],
];

/// Team size of mission `round` (0-based) for a game of `number_of_players`.
pub fn team_size(number_of_players: usize, round: usize) -> Option<usize> {
    let row = number_of_players.checked_sub(MIN_PLAYERS)?;
    TEAM_SIZES.get(row)?.get(round).copied()
}

/// Betrayals needed to fail mission `round` (0-based).
pub fn betrayals_required(number_of_players: usize, round: usize) -> Option<usize> {
    team_size(number_of_players, round)?;
    if round == 3 && number_of_players >= 7 {
        Some(2)
    } else {
        Some(1)
    }
}

/// True when the saboteurs cannot afford to let this mission pass.
///
/// `played` and `failed` count missions already resolved this game.
pub fn mission_is_critical(played: usize, failed: usize) -> bool {
    let remaining = ROUNDS_PER_GAME.saturating_sub(played);
    let needed = FAILURES_TO_WIN.saturating_sub(failed);
    needed >= remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn five_player_schedule() {
        let sizes: Vec<_> = (0..5).filter_map(|r| team_size(5, r)).collect();
        assert_eq!(sizes, vec![2, 3, 2, 3, 3]);
    }

    #[test]
    fn fourth_mission_needs_two_betrayals_in_large_games() {
        assert_eq!(betrayals_required(6, 3), Some(1));
        assert_eq!(betrayals_required(7, 3), Some(2));
        assert_eq!(betrayals_required(10, 2), Some(1));
    }

    #[test]
    fn unsupported_sizes_have_no_schedule() {
        assert_eq!(team_size(4, 0), None);
        assert_eq!(team_size(11, 0), None);
        assert_eq!(betrayals_required(5, 5), None);
    }

    #[test]
    fn criticality_tracks_remaining_margin() {
        assert!(!mission_is_critical(0, 0));
        assert!(!mission_is_critical(2, 1));
        assert!(mission_is_critical(3, 1));
        assert!(mission_is_critical(4, 2));
    }
}
