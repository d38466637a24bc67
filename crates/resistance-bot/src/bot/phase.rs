use core::fmt;

/// Where a [`super::BeliefAgent`] is within the game protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GamePhase {
    #[default]
    Uninitialized,
    Configured,
    Proposal,
    Vote,
    Betrayal,
    Outcome,
    GameEnded,
}

impl GamePhase {
    pub const fn as_str(self) -> &'static str {
        match self {
            GamePhase::Uninitialized => "uninitialized",
            GamePhase::Configured => "configured",
            GamePhase::Proposal => "proposal",
            GamePhase::Vote => "vote",
            GamePhase::Betrayal => "betrayal",
            GamePhase::Outcome => "outcome",
            GamePhase::GameEnded => "game_ended",
        }
    }
}

impl fmt::Display for GamePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
