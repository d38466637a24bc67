pub mod config;
pub mod handler;
pub mod logging;
pub mod scenario;

pub use handler::{AgentHandler, Call, CallOutcome, InvokeError, Reply};
