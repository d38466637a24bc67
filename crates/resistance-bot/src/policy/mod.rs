use resistance_core::model::player::PlayerId;

/// Capability set every strategy exposes to the game referee.
///
/// Calls arrive strictly in sequence for one game:
/// `new_game`, then per round any number of `propose_mission` / `vote` /
/// `vote_outcome`, optionally `betray`, then `mission_outcome` and
/// `round_outcome`, and finally `game_outcome`.
pub trait Agent: Send {
    /// Label used in diagnostics.
    fn name(&self) -> &str;

    /// Start a game of `number_of_players`. `saboteurs` is the full roster
    /// when this player is one of them and empty otherwise.
    fn new_game(&mut self, number_of_players: usize, player: PlayerId, saboteurs: &[PlayerId]);

    /// Team of `team_size` distinct players for the next mission.
    fn propose_mission(&mut self, team_size: usize, betrayals_required: usize) -> Vec<PlayerId>;

    /// Approve (`true`) or reject the proposed `mission`.
    fn vote(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals_required: usize) -> bool;

    /// Result of a vote; `approvers` lists every player who voted for the team.
    fn vote_outcome(&mut self, mission: &[PlayerId], proposer: PlayerId, approvers: &[PlayerId]);

    /// Only asked of mission members; `true` sabotages the mission.
    fn betray(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals_required: usize) -> bool;

    fn mission_outcome(
        &mut self,
        mission: &[PlayerId],
        proposer: PlayerId,
        betrayals: usize,
        success: bool,
    );

    fn round_outcome(&mut self, rounds_complete: usize, missions_failed: usize);

    fn game_outcome(&mut self, saboteurs_win: bool, saboteurs: &[PlayerId]);
}

impl<A: Agent + ?Sized> Agent for Box<A> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn new_game(&mut self, number_of_players: usize, player: PlayerId, saboteurs: &[PlayerId]) {
        (**self).new_game(number_of_players, player, saboteurs)
    }

    fn propose_mission(&mut self, team_size: usize, betrayals_required: usize) -> Vec<PlayerId> {
        (**self).propose_mission(team_size, betrayals_required)
    }

    fn vote(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals_required: usize) -> bool {
        (**self).vote(mission, proposer, betrayals_required)
    }

    fn vote_outcome(&mut self, mission: &[PlayerId], proposer: PlayerId, approvers: &[PlayerId]) {
        (**self).vote_outcome(mission, proposer, approvers)
    }

    fn betray(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals_required: usize) -> bool {
        (**self).betray(mission, proposer, betrayals_required)
    }

    fn mission_outcome(
        &mut self,
        mission: &[PlayerId],
        proposer: PlayerId,
        betrayals: usize,
        success: bool,
    ) {
        (**self).mission_outcome(mission, proposer, betrayals, success)
    }

    fn round_outcome(&mut self, rounds_complete: usize, missions_failed: usize) {
        (**self).round_outcome(rounds_complete, missions_failed)
    }

    fn game_outcome(&mut self, saboteurs_win: bool, saboteurs: &[PlayerId]) {
        (**self).game_outcome(saboteurs_win, saboteurs)
    }
}
