use super::BotContext;
use resistance_core::model::player::PlayerId;

pub struct ProposalPlanner;

impl ProposalPlanner {
    /// Picks a team of at most `team_size` players, always starting with self.
    pub fn choose(ctx: &BotContext<'_>, team_size: usize, betrayals_required: usize) -> Vec<PlayerId> {
        if team_size == 0 {
            return Vec::new();
        }

        let me = ctx.session.player();
        let mut team = Vec::with_capacity(team_size);
        team.push(me);

        let ranked = ctx.suspicion.least_suspicious(ctx.session.others());
        if ctx.session.is_saboteur() {
            let (allies, outsiders): (Vec<PlayerId>, Vec<PlayerId>) = ranked
                .into_iter()
                .partition(|p| ctx.session.is_known_saboteur(*p));
            let wanted = betrayals_required.min(team_size);

            let mut allies = allies.into_iter();
            while team.len() < wanted {
                match allies.next() {
                    Some(ally) => team.push(ally),
                    None => break,
                }
            }
            // Leftover allies only fill seats the outsiders cannot.
            let fill = outsiders.into_iter().chain(allies);
            team.extend(fill.take(team_size - team.len()));
        } else {
            team.extend(ranked.into_iter().take(team_size - 1));
        }

        team
    }
}
