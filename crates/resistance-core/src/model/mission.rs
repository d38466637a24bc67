use core::fmt;
use serde::{Deserialize, Serialize};

use super::player::PlayerId;

/// One completed mission as reported by the referee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissionRecord {
    team: Vec<PlayerId>,
    proposer: PlayerId,
    betrayals: usize,
    success: bool,
}

impl MissionRecord {
    pub fn new(team: Vec<PlayerId>, proposer: PlayerId, betrayals: usize, success: bool) -> Self {
        Self {
            team,
            proposer,
            betrayals,
            success,
        }
    }

    pub fn team(&self) -> &[PlayerId] {
        &self.team
    }

    pub fn proposer(&self) -> PlayerId {
        self.proposer
    }

    pub fn betrayals(&self) -> usize {
        self.betrayals
    }

    pub fn succeeded(&self) -> bool {
        self.success
    }

    /// Fraction of the team that betrayed; `0.0` for an empty team.
    pub fn betrayal_factor(&self) -> f64 {
        ratio(self.betrayals as f64, self.team.len())
    }
}

/// Append-only log of missions played in the current game.
#[derive(Debug, Clone, Default)]
pub struct MissionLog {
    records: Vec<MissionRecord>,
}

impl MissionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: MissionRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&MissionRecord> {
        self.records.last()
    }

    pub fn failures(&self) -> usize {
        self.records.iter().filter(|m| !m.succeeded()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &MissionRecord> {
        self.records.iter()
    }
}

/// Structural problems with a proposed team.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TeamError {
    WrongSize { expected: usize, found: usize },
    Duplicate(PlayerId),
    OutOfRange { player: PlayerId, players: usize },
}

impl fmt::Display for TeamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamError::WrongSize { expected, found } => {
                write!(f, "expected {expected} members, found {found}")
            }
            TeamError::Duplicate(player) => write!(f, "{player} listed more than once"),
            TeamError::OutOfRange { player, players } => {
                write!(f, "{player} outside a {players}-player game")
            }
        }
    }
}

impl std::error::Error for TeamError {}

/// Checks that `team` holds exactly `team_size` distinct players of a
/// `number_of_players` game.
pub fn validate_team(
    team: &[PlayerId],
    team_size: usize,
    number_of_players: usize,
) -> Result<(), TeamError> {
    if team.len() != team_size {
        return Err(TeamError::WrongSize {
            expected: team_size,
            found: team.len(),
        });
    }
    let mut seen = vec![false; number_of_players];
    for &player in team {
        if !player.in_range(number_of_players) {
            return Err(TeamError::OutOfRange {
                player,
                players: number_of_players,
            });
        }
        if std::mem::replace(&mut seen[player.index()], true) {
            return Err(TeamError::Duplicate(player));
        }
    }
    Ok(())
}

pub(crate) fn ratio(numerator: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator / denominator as f64
    }
}
