use resistance_core::belief::UpdateParams;

/// Decision thresholds for [`super::BeliefAgent`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BotParams {
    pub update: UpdateParams,
    /// A loyal player rejects any team holding someone above this score.
    pub reject_ceiling: f64,
    pub vote_threshold_base: f64,
    /// Added to the vote threshold once per `vote_threshold_period` missions.
    pub vote_threshold_step: f64,
    pub vote_threshold_period: f64,
    /// Assumed suspicion gain from betraying a mission.
    pub betrayal_exposure: f64,
    /// A saboteur holds back when expected suspicion would reach this.
    pub detection_ceiling: f64,
}

impl Default for BotParams {
    fn default() -> Self {
        Self {
            update: UpdateParams::default(),
            reject_ceiling: 0.8,
            vote_threshold_base: 0.4,
            vote_threshold_step: 0.1,
            vote_threshold_period: 5.0,
            betrayal_exposure: 0.2,
            detection_ceiling: 0.7,
        }
    }
}

impl BotParams {
    pub fn from_env() -> Self {
        Self::from_reader(|key| std::env::var(key).ok())
    }

    pub fn from_reader<F>(mut read: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let base = Self::default();
        let update = UpdateParams::from_reader(&mut read);
        let reject_ceiling = parse_unit(read("RST_REJECT_CEILING"), base.reject_ceiling);
        let detection_ceiling = parse_unit(read("RST_DETECTION_CEILING"), base.detection_ceiling);

        Self {
            update,
            reject_ceiling,
            detection_ceiling,
            ..base
        }
    }

    /// Mean suspicion a loyal player tolerates after `missions_played`.
    pub fn vote_threshold(&self, missions_played: usize) -> f64 {
        if self.vote_threshold_period <= 0.0 {
            return self.vote_threshold_base;
        }
        self.vote_threshold_base
            + self.vote_threshold_step * (missions_played as f64 / self.vote_threshold_period)
    }
}

fn parse_unit(raw: Option<String>, fallback: f64) -> f64 {
    raw.and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && (0.0..=1.0).contains(value))
        .unwrap_or(fallback)
}
