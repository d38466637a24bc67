use super::BotContext;
use resistance_core::model::player::PlayerId;
use resistance_core::model::rules;

pub struct BetrayalPlanner;

impl BetrayalPlanner {
    pub fn choose(ctx: &BotContext<'_>, mission: &[PlayerId], betrayals_required: usize) -> bool {
        let me = ctx.session.player();
        if !ctx.session.is_saboteur() || !mission.contains(&me) {
            return false;
        }
        if ctx.session.saboteurs_on(mission) < betrayals_required {
            return false;
        }

        let played = ctx.missions.len();
        let failed = ctx.missions.failures();
        if rules::mission_is_critical(played, failed) {
            return true;
        }
        let exposure = ctx.suspicion.score(me) + ctx.params.betrayal_exposure;
        exposure < ctx.params.detection_ceiling
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

    fn betray(
        session: &GameSession,
        suspicion: &SuspicionModel,
        missions: &MissionLog,
        team: &[u8],
        required: usize,
    ) -> bool {
        let params = BotParams::default();
        let ctx = BotContext {
            session,
            suspicion,
            missions,
            params: &params,
        };
        BetrayalPlanner::choose(&ctx, &players(team), required)
    }

    #[test]
    fn loyal_never_betrays() {
        let session = GameSession::new(5, PlayerId::new(0), &[]);
        let suspicion = SuspicionModel::new(5, PlayerId::new(0));
        assert!(!betray(&session, &suspicion, &MissionLog::new(), &[0, 1], 1));
    }

    #[test]
    fn saboteur_off_team_or_short_handed_holds() {
        let session = GameSession::new(5, PlayerId::new(0), &players(&[0, 2]));
        let suspicion = SuspicionModel::new(5, PlayerId::new(0));
        let log = MissionLog::new();
        assert!(!betray(&session, &suspicion, &log, &[1, 2, 3], 1));
        assert!(!betray(&session, &suspicion, &log, &[0, 1, 3], 2));
        assert!(betray(&session, &suspicion, &log, &[0, 2, 3], 1));
    }

    #[test]
    fn exposed_saboteur_waits_unless_critical() {
        let session = GameSession::new(5, PlayerId::new(0), &players(&[0, 2]));
        let mut suspicion = SuspicionModel::new(5, PlayerId::new(0));
        suspicion.set(PlayerId::new(0), 0.6);
        let mut log = MissionLog::new();
        assert!(!betray(&session, &suspicion, &log, &[0, 1], 1));

        // two successes: three failures still needed with three missions left
        for _ in 0..2 {
            log.push(MissionRecord::new(players(&[1, 3]), PlayerId::new(1), 0, true));
        }
        assert!(betray(&session, &suspicion, &log, &[0, 1], 1));
    }
}
