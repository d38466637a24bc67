use crate::model::player::PlayerId;

/// Continuous belief, per player, that the player is a saboteur.
///
/// Scores start at `0.0` and are clamped into `[0.0, 1.0]` at the end of every
/// update cycle; between the individual rules of one cycle they may leave
/// that range.
#[derive(Debug, Clone, PartialEq)]
pub struct SuspicionModel {
    perspective: PlayerId,
    scores: Vec<f64>,
}

impl SuspicionModel {
    pub fn new(number_of_players: usize, perspective: PlayerId) -> Self {
        Self {
            perspective,
            scores: vec![0.0; number_of_players],
        }
    }

    /// The player holding this belief.
    pub fn perspective(&self) -> PlayerId {
        self.perspective
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Score for `player`; unknown players read as `0.0`.
    pub fn score(&self, player: PlayerId) -> f64 {
        self.scores.get(player.index()).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, player: PlayerId, value: f64) {
        if let Some(slot) = self.scores.get_mut(player.index()) {
            *slot = value;
        }
    }

    pub fn add(&mut self, player: PlayerId, delta: f64) {
        if let Some(slot) = self.scores.get_mut(player.index()) {
            *slot += delta;
        }
    }

    pub fn clamp_all(&mut self) {
        for score in &mut self.scores {
            *score = if score.is_finite() {
                score.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, f64)> + '_ {
        PlayerId::all(self.scores.len()).zip(self.scores.iter().copied())
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.scores
    }

    /// Mean and maximum score over the members of `team` other than the
    /// perspective player; `(0.0, 0.0)` when there are none.
    pub fn team_profile(&self, team: &[PlayerId]) -> (f64, f64) {
        let mut total = 0.0;
        let mut max = 0.0f64;
        let mut count = 0usize;
        for &player in team.iter().filter(|p| **p != self.perspective) {
            let score = self.score(player);
            total += score;
            max = max.max(score);
            count += 1;
        }
        if count == 0 {
            (0.0, 0.0)
        } else {
            (total / count as f64, max)
        }
    }

    /// `candidates` ordered by ascending suspicion. Ties keep candidate order.
    pub fn least_suspicious<I>(&self, candidates: I) -> Vec<PlayerId>
    where
        I: IntoIterator<Item = PlayerId>,
    {
        let mut ranked: Vec<PlayerId> = candidates.into_iter().collect();
        ranked.sort_by(|a, b| self.score(*a).total_cmp(&self.score(*b)));
        ranked
    }
}
