use std::collections::BTreeMap;

use crate::model::player::PlayerId;

/// A single vote on a proposed team.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteRecord {
    pub approved: bool,
    /// Missions already resolved when the vote was cast.
    pub round: usize,
}

/// Votes per voter, in the order they were cast.
#[derive(Debug, Clone, Default)]
pub struct VoteHistory {
    by_voter: BTreeMap<PlayerId, Vec<VoteRecord>>,
}

impl VoteHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, voter: PlayerId, approved: bool, round: usize) {
        self.by_voter
            .entry(voter)
            .or_default()
            .push(VoteRecord { approved, round });
    }

    pub fn votes(&self, voter: PlayerId) -> &[VoteRecord] {
        self.by_voter.get(&voter).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn latest(&self, voter: PlayerId) -> Option<VoteRecord> {
        self.votes(voter).last().copied()
    }

    /// Voters with at least one recorded vote, ascending.
    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &[VoteRecord])> {
        self.by_voter
            .iter()
            .filter(|(_, votes)| !votes.is_empty())
            .map(|(voter, votes)| (*voter, votes.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.by_voter.is_empty()
    }
}

/// Teams per proposer, in the order they were proposed.
#[derive(Debug, Clone, Default)]
pub struct ProposalHistory {
    by_proposer: BTreeMap<PlayerId, Vec<Vec<PlayerId>>>,
}

impl ProposalHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, proposer: PlayerId, team: &[PlayerId]) {
        self.by_proposer
            .entry(proposer)
            .or_default()
            .push(team.to_vec());
    }

    pub fn teams(&self, proposer: PlayerId) -> &[Vec<PlayerId>] {
        self.by_proposer
            .get(&proposer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlayerId, &[Vec<PlayerId>])> {
        self.by_proposer
            .iter()
            .map(|(proposer, teams)| (*proposer, teams.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.by_proposer.is_empty()
    }
}
