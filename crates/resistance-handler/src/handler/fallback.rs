use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use resistance_core::model::player::PlayerId;

use crate::config::HandlerConfig;

/// Safe substitute answers used whenever a strategy call fails.
#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    rng: StdRng,
    approve_probability: f64,
    betray_probability: f64,
}

impl FallbackPolicy {
    pub fn new(config: &HandlerConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng,
            approve_probability: config.vote_approval_probability.clamp(0.0, 1.0),
            betray_probability: config.betray_probability.clamp(0.0, 1.0),
        }
    }

    /// Uniformly random distinct players. Short when `team_size` exceeds the table.
    pub fn team(&mut self, number_of_players: usize, team_size: usize) -> Vec<PlayerId> {
        let amount = team_size.min(number_of_players);
        sample(&mut self.rng, number_of_players, amount)
            .into_iter()
            .filter_map(PlayerId::from_index)
            .collect()
    }

    pub fn vote(&mut self) -> bool {
        self.rng.gen_bool(self.approve_probability)
    }

    pub fn betray(&mut self) -> bool {
        self.rng.gen_bool(self.betray_probability)
    }
}
