use resistance_bot::Agent;
use resistance_core::model::player::PlayerId;
use serde::Serialize;

/// One strategy operation with its arguments.
///
/// Serializes to the external wire format: a JSON object tagged by
/// `"action"` with fields named after the operation arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Call {
    NewGame {
        number_of_players: usize,
        player: PlayerId,
        saboteurs: Vec<PlayerId>,
    },
    ProposeMission {
        team_size: usize,
        betrayals_required: usize,
    },
    Vote {
        mission: Vec<PlayerId>,
        proposer: PlayerId,
        betrayals_required: usize,
    },
    VoteOutcome {
        mission: Vec<PlayerId>,
        proposer: PlayerId,
        approvers: Vec<PlayerId>,
    },
    Betray {
        mission: Vec<PlayerId>,
        proposer: PlayerId,
        betrayals_required: usize,
    },
    MissionOutcome {
        mission: Vec<PlayerId>,
        proposer: PlayerId,
        betrayals: usize,
        success: bool,
    },
    RoundOutcome {
        rounds_complete: usize,
        missions_failed: usize,
    },
    GameOutcome {
        saboteurs_win: bool,
        saboteurs: Vec<PlayerId>,
    },
}

impl Call {
    pub const fn operation(&self) -> &'static str {
        match self {
            Call::NewGame { .. } => "new_game",
            Call::ProposeMission { .. } => "propose_mission",
            Call::Vote { .. } => "vote",
            Call::VoteOutcome { .. } => "vote_outcome",
            Call::Betray { .. } => "betray",
            Call::MissionOutcome { .. } => "mission_outcome",
            Call::RoundOutcome { .. } => "round_outcome",
            Call::GameOutcome { .. } => "game_outcome",
        }
    }

    /// Calls whose return value is ignored.
    pub const fn is_notification(&self) -> bool {
        !matches!(
            self,
            Call::ProposeMission { .. } | Call::Vote { .. } | Call::Betray { .. }
        )
    }

    /// Runs the operation on `agent`.
    pub fn apply<A: Agent + ?Sized>(&self, agent: &mut A) -> Reply {
        match self {
            Call::NewGame {
                number_of_players,
                player,
                saboteurs,
            } => {
                agent.new_game(*number_of_players, *player, saboteurs);
                Reply::Ack
            }
            Call::ProposeMission {
                team_size,
                betrayals_required,
            } => Reply::Team(agent.propose_mission(*team_size, *betrayals_required)),
            Call::Vote {
                mission,
                proposer,
                betrayals_required,
            } => Reply::Decision(agent.vote(mission, *proposer, *betrayals_required)),
            Call::VoteOutcome {
                mission,
                proposer,
                approvers,
            } => {
                agent.vote_outcome(mission, *proposer, approvers);
                Reply::Ack
            }
            Call::Betray {
                mission,
                proposer,
                betrayals_required,
            } => Reply::Decision(agent.betray(mission, *proposer, *betrayals_required)),
            Call::MissionOutcome {
                mission,
                proposer,
                betrayals,
                success,
            } => {
                agent.mission_outcome(mission, *proposer, *betrayals, *success);
                Reply::Ack
            }
            Call::RoundOutcome {
                rounds_complete,
                missions_failed,
            } => {
                agent.round_outcome(*rounds_complete, *missions_failed);
                Reply::Ack
            }
            Call::GameOutcome {
                saboteurs_win,
                saboteurs,
            } => {
                agent.game_outcome(*saboteurs_win, saboteurs);
                Reply::Ack
            }
        }
    }
}

/// What a strategy handed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    Team(Vec<PlayerId>),
    Decision(bool),
    Ack,
}

impl Reply {
    pub fn into_team(self) -> Vec<PlayerId> {
        match self {
            Reply::Team(team) => team,
            _ => Vec::new(),
        }
    }

    pub fn decision(&self) -> bool {
        matches!(self, Reply::Decision(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resistance_core::model::player::players;

    #[test]
    fn wire_format_is_tagged_by_action() {
        let call = Call::Vote {
            mission: players(&[0, 2]),
            proposer: PlayerId::new(2),
            betrayals_required: 1,
        };
        let json = serde_json::to_value(&call).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "action": "vote",
                "mission": [0, 2],
                "proposer": 2,
                "betrayals_required": 1
            })
        );
    }

    #[test]
    fn only_decisions_are_not_notifications() {
        assert!(!Call::ProposeMission { team_size: 2, betrayals_required: 1 }.is_notification());
        assert!(Call::RoundOutcome { rounds_complete: 1, missions_failed: 0 }.is_notification());
        assert_eq!(
            Call::GameOutcome { saboteurs_win: false, saboteurs: Vec::new() }.operation(),
            "game_outcome"
        );
    }

    #[test]
    fn replies_serialize_bare() {
        assert_eq!(serde_json::to_string(&Reply::Team(players(&[1, 3]))).unwrap(), "[1,3]");
        assert_eq!(serde_json::to_string(&Reply::Decision(true)).unwrap(), "true");
        assert_eq!(serde_json::to_string(&Reply::Ack).unwrap(), "null");
    }
}
