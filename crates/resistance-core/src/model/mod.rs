pub mod mission;
pub mod player;
pub mod role;
pub mod rules;
pub mod session;
