use core::fmt;
use serde::{Deserialize, Serialize};

/// Seat identity within a single game, in `[0, number_of_players)`.
///
/// The range is not enforced on construction: identities arriving from an
/// untrusted strategy are checked against the game size with [`PlayerId::in_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(u8);

impl PlayerId {
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    pub fn from_index(index: usize) -> Option<Self> {
        u8::try_from(index).ok().map(Self)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn in_range(self, number_of_players: usize) -> bool {
        self.index() < number_of_players
    }

    /// All identities of a game with `number_of_players` seats, ascending.
    pub fn all(number_of_players: usize) -> impl Iterator<Item = PlayerId> {
        (0..number_of_players.min(u8::MAX as usize + 1)).map(|idx| PlayerId(idx as u8))
    }
}

impl From<u8> for PlayerId {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Convenience for literals in tests and scripts.
pub fn players(ids: &[u8]) -> Vec<PlayerId> {
    ids.iter().copied().map(PlayerId::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_roundtrip() {
        for idx in 0..10 {
            let id = PlayerId::from_index(idx).unwrap();
            assert_eq!(id.index(), idx);
        }
    }

    #[test]
    fn from_index_rejects_wide_values() {
        assert!(PlayerId::from_index(256).is_none());
    }

    #[test]
    fn range_check_is_exclusive() {
        assert!(PlayerId::new(4).in_range(5));
        assert!(!PlayerId::new(5).in_range(5));
    }

    #[test]
    fn all_enumerates_ascending() {
        let ids: Vec<_> = PlayerId::all(3).collect();
        assert_eq!(ids, players(&[0, 1, 2]));
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(PlayerId::new(3).to_string(), "P3");
    }
}
