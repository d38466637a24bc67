//! Per-mission suspicion updates.
//!
//! Three rules run in a fixed order once a mission resolves: outcome, vote
//! pattern, proposal pattern. Each rule reads the scores left by the previous
//! one; the whole vector is clamped at the end. The perspective player is
//! never a target unless `track_self_exposure` is set, and even then the
//! outcome rule leaves it alone.

use std::str::FromStr;

use super::history::{ProposalHistory, VoteHistory, VoteRecord};
use super::suspicion::SuspicionModel;
use crate::model::mission::{MissionRecord, ratio};
use crate::model::player::PlayerId;

/// Which recorded votes feed the vote-pattern rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoteSignal {
    /// Only each player's latest vote, whatever round it came from.
    #[default]
    MostRecent,
    /// Every vote cast since the previous mission resolved.
    CurrentRound,
}

impl FromStr for VoteSignal {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "recent" | "most_recent" | "latest" => Ok(VoteSignal::MostRecent),
            "round" | "current_round" => Ok(VoteSignal::CurrentRound),
            other => Err(format!("unknown vote signal '{other}'")),
        }
    }
}

/// Tunable constants for [`apply_round`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpdateParams {
    /// Share of the betrayal factor charged to the proposer of a failed mission.
    pub proposer_blame: f64,
    /// Total relief spread over the members of a successful mission.
    pub success_relief: f64,
    pub approved_failure_penalty: f64,
    pub rejected_failure_relief: f64,
    pub rejected_success_penalty: f64,
    /// Members above this score make their proposer look bad.
    pub high_suspicion: f64,
    pub high_suspicion_penalty: f64,
    pub risky_proposer_average: f64,
    pub risky_proposer_penalty: f64,
    pub safe_proposer_average: f64,
    pub safe_proposer_relief: f64,
    pub vote_signal: VoteSignal,
    /// Let the vote and proposal rules score the perspective player too, so
    /// its own score estimates how exposed it looks to the table.
    pub track_self_exposure: bool,
}

impl Default for UpdateParams {
    fn default() -> Self {
        Self {
            proposer_blame: 0.3,
            success_relief: 0.1,
            approved_failure_penalty: 0.1,
            rejected_failure_relief: 0.05,
            rejected_success_penalty: 0.05,
            high_suspicion: 0.7,
            high_suspicion_penalty: 0.05,
            risky_proposer_average: 0.6,
            risky_proposer_penalty: 0.05,
            safe_proposer_average: 0.3,
            safe_proposer_relief: 0.02,
            vote_signal: VoteSignal::MostRecent,
            track_self_exposure: false,
        }
    }
}

impl UpdateParams {
    pub fn from_env() -> Self {
        Self::from_reader(|key| std::env::var(key).ok())
    }

    pub fn from_reader<F>(mut read: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let base = Self::default();
        let vote_signal = read("RST_VOTE_SIGNAL")
            .and_then(|raw| raw.parse::<VoteSignal>().ok())
            .unwrap_or(base.vote_signal);
        let proposer_blame = read_unit(&mut read, "RST_PROPOSER_BLAME", base.proposer_blame);
        let high_suspicion = read_unit(&mut read, "RST_HIGH_SUSPICION", base.high_suspicion);
        let track_self_exposure = read("RST_TRACK_SELF_EXPOSURE")
            .map(|raw| matches!(raw.trim(), "1" | "true" | "TRUE" | "on" | "ON"))
            .unwrap_or(base.track_self_exposure);

        Self {
            proposer_blame,
            high_suspicion,
            vote_signal,
            track_self_exposure,
            ..base
        }
    }
}

fn read_unit<F>(read: &mut F, key: &str, fallback: f64) -> f64
where
    F: FnMut(&str) -> Option<String>,
{
    read(key)
        .and_then(|raw| raw.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite() && (0.0..=1.0).contains(value))
        .unwrap_or(fallback)
}

/// Everything the update rules read about the mission that just resolved.
#[derive(Debug, Clone, Copy)]
pub struct RoundEvidence<'a> {
    pub mission: &'a MissionRecord,
    pub votes: &'a VoteHistory,
    pub proposals: &'a ProposalHistory,
    /// Missions resolved before `mission`.
    pub round: usize,
}

/// Runs the outcome, vote-pattern and proposal-pattern rules, then clamps.
pub fn apply_round(model: &mut SuspicionModel, evidence: &RoundEvidence<'_>, params: &UpdateParams) {
    apply_outcome(model, evidence.mission, params);
    apply_vote_pattern(model, evidence, params);
    apply_proposal_pattern(model, evidence.proposals, params);
    model.clamp_all();
}

fn apply_outcome(model: &mut SuspicionModel, mission: &MissionRecord, params: &UpdateParams) {
    let me = model.perspective();
    let team = mission.team();

    if mission.succeeded() {
        let relief = ratio(params.success_relief, team.len());
        for &player in team.iter().filter(|p| **p != me) {
            let lowered = (model.score(player) - relief).max(0.0);
            model.set(player, lowered);
        }
        return;
    }

    let factor = mission.betrayal_factor();
    for &player in team.iter().filter(|p| **p != me) {
        let bump = factor * (1.0 + model.score(player));
        model.add(player, bump);
    }
    if mission.proposer() != me {
        model.add(mission.proposer(), params.proposer_blame * factor);
    }
}

fn apply_vote_pattern(model: &mut SuspicionModel, evidence: &RoundEvidence<'_>, params: &UpdateParams) {
    let me = model.perspective();
    let failed = !evidence.mission.succeeded();
    let include_me = params.track_self_exposure;

    for (voter, votes) in evidence
        .votes
        .iter()
        .filter(|(voter, _)| include_me || *voter != me)
    {
        for vote in signal_votes(votes, evidence.round, params.vote_signal) {
            let delta = match (failed, vote.approved) {
                (true, true) => params.approved_failure_penalty,
                (true, false) => -params.rejected_failure_relief,
                (false, false) => params.rejected_success_penalty,
                (false, true) => 0.0,
            };
            model.add(voter, delta);
        }
    }
}

fn signal_votes(votes: &[VoteRecord], round: usize, signal: VoteSignal) -> Vec<VoteRecord> {
    match signal {
        VoteSignal::MostRecent => votes.last().copied().into_iter().collect(),
        VoteSignal::CurrentRound => votes.iter().copied().filter(|v| v.round == round).collect(),
    }
}

fn apply_proposal_pattern(
    model: &mut SuspicionModel,
    proposals: &ProposalHistory,
    params: &UpdateParams,
) {
    let me = model.perspective();
    let target = |proposer: PlayerId| params.track_self_exposure || proposer != me;

    for (proposer, teams) in proposals.iter() {
        let mut total = 0.0;
        for team in teams {
            let (mean, _) = model.team_profile(team);
            total += mean;

            let flagged = team
                .iter()
                .filter(|p| **p != me && model.score(**p) > params.high_suspicion)
                .count();
            if flagged > 0 && target(proposer) {
                model.add(proposer, params.high_suspicion_penalty * flagged as f64);
            }
        }

        if !target(proposer) {
            continue;
        }
        let average = ratio(total, teams.len());
        if average > params.risky_proposer_average {
            model.add(proposer, params.risky_proposer_penalty);
        } else if average < params.safe_proposer_average {
            model.add(proposer, -params.safe_proposer_relief);
        }
    }
}
