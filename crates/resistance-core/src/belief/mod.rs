//! Suspicion tracking for hidden saboteurs.
//!
//! This module is composed of:
//! - `suspicion`: the per-player score vector (`SuspicionModel`).
//! - `history`: append-only vote and proposal records.
//! - `update`: the per-mission update rules and their tunables.

mod history;
mod suspicion;
pub mod update;

pub use history::{ProposalHistory, VoteHistory, VoteRecord};
pub use suspicion::SuspicionModel;
pub use update::{RoundEvidence, UpdateParams, VoteSignal, apply_round};
