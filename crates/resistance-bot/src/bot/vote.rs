use super::BotContext;
use resistance_core::model::player::PlayerId;

pub struct VotePlanner;

/// Why a vote came out the way it did; carried into the decision log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteReason {
    EnoughSaboteurs,
    TooFewSaboteurs,
    SuspectOnTeam,
    BelowThreshold,
    AboveThreshold,
}

impl VotePlanner {
    pub fn choose(ctx: &BotContext<'_>, mission: &[PlayerId], betrayals_required: usize) -> (bool, VoteReason) {
        if ctx.session.is_saboteur() {
            return if ctx.session.saboteurs_on(mission) >= betrayals_required {
                (true, VoteReason::EnoughSaboteurs)
            } else {
                (false, VoteReason::TooFewSaboteurs)
            };
        }

        let (mean, max) = ctx.suspicion.team_profile(mission);
        if max > ctx.params.reject_ceiling {
            return (false, VoteReason::SuspectOnTeam);
        }
        let threshold = ctx.params.vote_threshold(ctx.missions.len());
        if mean < threshold {
            (true, VoteReason::BelowThreshold)
        } else {
            (false, VoteReason::AboveThreshold)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::BotParams;
    use resistance_core::belief::SuspicionModel;
    use resistance_core::model::mission::{MissionLog, MissionRecord};
    use resistance_core::model::player::players;
    use resistance_core::model::session::GameSession;

    struct Fixture {
        session: GameSession,
        suspicion: SuspicionModel,
        missions: MissionLog,
        params: BotParams,
    }

    impl Fixture {
        fn new(saboteurs: &[u8]) -> Self {
            let me = PlayerId::new(0);
            Self {
                session: GameSession::new(5, me, &players(saboteurs)),
                suspicion: SuspicionModel::new(5, me),
                missions: MissionLog::new(),
                params: BotParams::default(),
            }
        }

        fn vote(&self, team: &[u8], required: usize) -> (bool, VoteReason) {
            let ctx = BotContext {
                session: &self.session,
                suspicion: &self.suspicion,
                missions: &self.missions,
                params: &self.params,
            };
            VotePlanner::choose(&ctx, &players(team), required)
        }
    }

    #[test]
    fn loyal_rejects_team_with_suspect() {
        let mut fx = Fixture::new(&[]);
        fx.suspicion.set(PlayerId::new(2), 0.85);
        assert_eq!(fx.vote(&[0, 1, 2], 1), (false, VoteReason::SuspectOnTeam));
    }

    #[test]
    fn loyal_threshold_loosens_as_game_goes_on() {
        let mut fx = Fixture::new(&[]);
        fx.suspicion.set(PlayerId::new(1), 0.42);
        fx.suspicion.set(PlayerId::new(2), 0.42);
        assert_eq!(fx.vote(&[1, 2], 1), (false, VoteReason::AboveThreshold));

        for _ in 0..2 {
            fx.missions
                .push(MissionRecord::new(players(&[3, 4]), PlayerId::new(3), 0, true));
        }
        // 0.4 + 0.1 * 2/5 = 0.44
        assert_eq!(fx.vote(&[1, 2], 1), (true, VoteReason::BelowThreshold));
    }

    #[test]
    fn loyal_ignores_own_score() {
        let mut fx = Fixture::new(&[]);
        fx.suspicion.set(PlayerId::new(0), 1.0);
        assert_eq!(fx.vote(&[0, 3], 1), (true, VoteReason::BelowThreshold));
    }

    #[test]
    fn saboteur_counts_known_allies() {
        let fx = Fixture::new(&[0, 3]);
        assert_eq!(fx.vote(&[1, 3], 1), (true, VoteReason::EnoughSaboteurs));
        assert_eq!(fx.vote(&[1, 2], 1), (false, VoteReason::TooFewSaboteurs));
        assert_eq!(fx.vote(&[0, 1], 2), (false, VoteReason::TooFewSaboteurs));
    }
}
