mod betray;
mod params;
mod phase;
mod propose;
mod vote;

pub use betray::BetrayalPlanner;
pub use params::BotParams;
pub use phase::GamePhase;
pub use propose::ProposalPlanner;
pub use vote::{VotePlanner, VoteReason};

use crate::policy::Agent;
use resistance_core::belief::{ProposalHistory, RoundEvidence, SuspicionModel, VoteHistory, apply_round};
use resistance_core::model::mission::{MissionLog, MissionRecord};
use resistance_core::model::player::PlayerId;
use resistance_core::model::session::GameSession;
use tracing::{Level, event};

/// Read-only view the planners decide from.
#[derive(Debug, Clone, Copy)]
pub struct BotContext<'a> {
    pub session: &'a GameSession,
    pub suspicion: &'a SuspicionModel,
    pub missions: &'a MissionLog,
    pub params: &'a BotParams,
}

/// Everything that lives for exactly one game.
#[derive(Debug, Clone)]
struct GameState {
    session: GameSession,
    suspicion: SuspicionModel,
    missions: MissionLog,
    votes: VoteHistory,
    proposals: ProposalHistory,
}

impl GameState {
    fn new(session: GameSession) -> Self {
        let suspicion = SuspicionModel::new(session.number_of_players(), session.player());
        Self {
            session,
            suspicion,
            missions: MissionLog::new(),
            votes: VoteHistory::new(),
            proposals: ProposalHistory::new(),
        }
    }

    fn context<'a>(&'a self, params: &'a BotParams) -> BotContext<'a> {
        BotContext {
            session: &self.session,
            suspicion: &self.suspicion,
            missions: &self.missions,
            params,
        }
    }
}

/// Suspicion-tracking strategy.
#[derive(Debug, Clone)]
pub struct BeliefAgent {
    name: String,
    params: BotParams,
    phase: GamePhase,
    game: Option<GameState>,
}

impl Default for BeliefAgent {
    fn default() -> Self {
        Self::new("belief", BotParams::default())
    }
}

impl BeliefAgent {
    pub fn new(name: impl Into<String>, params: BotParams) -> Self {
        Self {
            name: name.into(),
            params,
            phase: GamePhase::Uninitialized,
            game: None,
        }
    }

    pub fn from_env(name: impl Into<String>) -> Self {
        Self::new(name, BotParams::from_env())
    }

    pub fn params(&self) -> &BotParams {
        &self.params
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn session(&self) -> Option<&GameSession> {
        self.game.as_ref().map(|g| &g.session)
    }

    pub fn suspicion(&self) -> Option<&SuspicionModel> {
        self.game.as_ref().map(|g| &g.suspicion)
    }

    pub fn missions(&self) -> Option<&MissionLog> {
        self.game.as_ref().map(|g| &g.missions)
    }

    pub fn votes(&self) -> Option<&VoteHistory> {
        self.game.as_ref().map(|g| &g.votes)
    }

    pub fn proposals(&self) -> Option<&ProposalHistory> {
        self.game.as_ref().map(|g| &g.proposals)
    }

    fn game_or_warn(&self, operation: &'static str) -> Option<&GameState> {
        if self.game.is_none() {
            tracing::warn!(
                target: "resistance_bot::phase",
                agent = %self.name,
                operation,
                phase = %self.phase,
                "decision requested with no game in progress"
            );
        }
        self.game.as_ref()
    }
}

impl Agent for BeliefAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn new_game(&mut self, number_of_players: usize, player: PlayerId, saboteurs: &[PlayerId]) {
        let session = GameSession::new(number_of_players, player, saboteurs);
        event!(
            target: "resistance_bot::game",
            Level::DEBUG,
            agent = %self.name,
            players = number_of_players,
            player = %player,
            role = %session.role(),
            saboteur_count = session.saboteur_count(),
        );
        self.game = Some(GameState::new(session));
        self.phase = GamePhase::Configured;
    }

    fn propose_mission(&mut self, team_size: usize, betrayals_required: usize) -> Vec<PlayerId> {
        let Some(game) = self.game_or_warn("propose_mission") else {
            return Vec::new();
        };
        let team = ProposalPlanner::choose(&game.context(&self.params), team_size, betrayals_required);
        log_team(&self.name, game, &team, team_size, betrayals_required);
        self.phase = GamePhase::Proposal;
        team
    }

    fn vote(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals_required: usize) -> bool {
        let Some(game) = self.game_or_warn("vote") else {
            return false;
        };
        let (approve, reason) = VotePlanner::choose(&game.context(&self.params), mission, betrayals_required);
        if tracing::enabled!(Level::INFO) {
            let (mean, max) = game.suspicion.team_profile(mission);
            event!(
                target: "resistance_bot::vote",
                Level::INFO,
                agent = %self.name,
                proposer = %proposer,
                team = %format_team(mission),
                mean_suspicion = mean,
                max_suspicion = max,
                missions_played = game.missions.len(),
                approve,
                reason = ?reason,
            );
        }
        self.phase = GamePhase::Vote;
        approve
    }

    fn vote_outcome(&mut self, mission: &[PlayerId], proposer: PlayerId, approvers: &[PlayerId]) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let round = game.missions.len();
        for voter in game.session.players() {
            game.votes.record(voter, approvers.contains(&voter), round);
        }
        game.proposals.record(proposer, mission);
    }

    fn betray(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals_required: usize) -> bool {
        let Some(game) = self.game_or_warn("betray") else {
            return false;
        };
        let betray = BetrayalPlanner::choose(&game.context(&self.params), mission, betrayals_required);
        event!(
            target: "resistance_bot::betray",
            Level::INFO,
            agent = %self.name,
            proposer = %proposer,
            team = %format_team(mission),
            own_suspicion = game.suspicion.score(game.session.player()),
            missions_played = game.missions.len(),
            missions_failed = game.missions.failures(),
            betray,
        );
        self.phase = GamePhase::Betrayal;
        betray
    }

    fn mission_outcome(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals: usize, success: bool) {
        let Some(game) = self.game.as_mut() else {
            return;
        };
        let round = game.missions.len();
        game.missions
            .push(MissionRecord::new(mission.to_vec(), proposer, betrayals, success));

        if let Some(record) = game.missions.last() {
            let evidence = RoundEvidence {
                mission: record,
                votes: &game.votes,
                proposals: &game.proposals,
                round,
            };
            apply_round(&mut game.suspicion, &evidence, &self.params.update);
        }

        if tracing::enabled!(target: "resistance_bot::belief", Level::DEBUG) {
            let scores = game
                .suspicion
                .iter()
                .map(|(player, score)| format!("{player}={score:.3}"))
                .collect::<Vec<_>>()
                .join(",");
            event!(
                target: "resistance_bot::belief",
                Level::DEBUG,
                agent = %self.name,
                round,
                success,
                betrayals,
                scores = %scores,
            );
        }
        self.phase = GamePhase::Outcome;
    }

    fn round_outcome(&mut self, rounds_complete: usize, missions_failed: usize) {
        let Some(game) = self.game.as_ref() else {
            return;
        };
        let played = game.missions.len();
        let failed = game.missions.failures();
        if played != rounds_complete || failed != missions_failed {
            tracing::warn!(
                target: "resistance_bot::game",
                agent = %self.name,
                rounds_complete,
                missions_failed,
                logged_rounds = played,
                logged_failures = failed,
                "referee tally disagrees with mission log"
            );
        }
    }

    fn game_outcome(&mut self, saboteurs_win: bool, saboteurs: &[PlayerId]) {
        if let Some(game) = self.game.take() {
            event!(
                target: "resistance_bot::game",
                Level::INFO,
                agent = %self.name,
                role = %game.session.role(),
                saboteurs_win,
                saboteurs = %format_team(saboteurs),
                missions = game.missions.len(),
            );
        }
        self.phase = GamePhase::GameEnded;
    }
}

fn log_team(name: &str, game: &GameState, team: &[PlayerId], team_size: usize, betrayals_required: usize) {
    if !tracing::enabled!(Level::INFO) {
        return;
    }
    event!(
        target: "resistance_bot::propose",
        Level::INFO,
        agent = %name,
        role = %game.session.role(),
        team_size,
        betrayals_required,
        team = %format_team(team),
    );
}

pub(crate) fn format_team(team: &[PlayerId]) -> String {
    team.iter()
        .map(|p| p.index().to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use resistance_core::model::player::players;

    #[test]
    fn phase_follows_the_game() {
        let mut agent = BeliefAgent::default();
        assert_eq!(agent.phase(), GamePhase::Uninitialized);
        agent.new_game(5, PlayerId::new(0), &[]);
        assert_eq!(agent.phase(), GamePhase::Configured);
        agent.propose_mission(2, 1);
        assert_eq!(agent.phase(), GamePhase::Proposal);
        agent.vote(&players(&[0, 1]), PlayerId::new(0), 1);
        assert_eq!(agent.phase(), GamePhase::Vote);
        agent.mission_outcome(&players(&[0, 1]), PlayerId::new(0), 0, true);
        assert_eq!(agent.phase(), GamePhase::Outcome);
        agent.game_outcome(false, &players(&[2, 4]));
        assert_eq!(agent.phase(), GamePhase::GameEnded);
        assert!(agent.session().is_none());
    }

    #[test]
    fn decisions_without_a_game_are_empty() {
        let mut agent = BeliefAgent::default();
        assert!(agent.propose_mission(3, 1).is_empty());
        assert!(!agent.vote(&players(&[0, 1]), PlayerId::new(1), 1));
        assert!(!agent.betray(&players(&[0, 1]), PlayerId::new(1), 1));
        agent.mission_outcome(&players(&[0, 1]), PlayerId::new(1), 1, false);
        assert!(agent.missions().is_none());
    }

    #[test]
    fn vote_outcome_records_every_player() {
        let mut agent = BeliefAgent::default();
        agent.new_game(5, PlayerId::new(0), &[]);
        agent.vote_outcome(&players(&[1, 2]), PlayerId::new(1), &players(&[1, 2, 3]));

        let votes = agent.votes().unwrap();
        for id in 0..5u8 {
            let latest = votes.latest(PlayerId::new(id)).unwrap();
            assert_eq!(latest.approved, (1..=3).contains(&id));
            assert_eq!(latest.round, 0);
        }
        assert_eq!(agent.proposals().unwrap().teams(PlayerId::new(1)), &[players(&[1, 2])]);
    }

    #[test]
    fn mission_outcome_feeds_the_suspicion_model() {
        let mut agent = BeliefAgent::default();
        agent.new_game(5, PlayerId::new(0), &[]);
        agent.mission_outcome(&players(&[1, 2, 3]), PlayerId::new(4), 1, false);

        let suspicion = agent.suspicion().unwrap();
        assert!((suspicion.score(PlayerId::new(1)) - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(agent.missions().unwrap().failures(), 1);
    }
}
