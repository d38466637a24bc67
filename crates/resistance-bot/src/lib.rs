pub mod bot;
pub mod policy;

pub use bot::{BeliefAgent, BotParams, GamePhase};
pub use policy::Agent;
