//! Bounded invocation of untrusted strategies.
//!
//! Every call made through an [`AgentHandler`] returns within the configured
//! deadline with a well-formed answer. Timeouts, panics, process failures and
//! malformed replies are counted, logged at WARN and replaced by the
//! [`FallbackPolicy`] answer for that operation.

mod call;
mod external;
mod fallback;
mod worker;

pub use call::{Call, Reply};
pub use external::{ExternalBackend, ExternalOptions, ExternalParamError, GameContext};
pub use fallback::FallbackPolicy;
pub use worker::{AgentFactory, WorkerBackend};

use std::time::{Duration, Instant};

use resistance_bot::Agent;
use resistance_core::model::mission::validate_team;
use resistance_core::model::player::PlayerId;
use thiserror::Error;
use tracing::{Level, event};

use crate::config::HandlerConfig;

/// Why a strategy call produced no usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    #[error("{operation} timed out after {deadline_ms} ms")]
    TimedOut {
        operation: &'static str,
        deadline_ms: u64,
    },
    #[error("{operation} panicked: {message}")]
    Panicked {
        operation: &'static str,
        message: String,
    },
    #[error("{operation} returned a malformed result: {reason}")]
    Malformed {
        operation: &'static str,
        reason: String,
    },
    #[error("failed to spawn process: {0}")]
    Spawn(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("{operation}: strategy worker is gone")]
    Disconnected { operation: &'static str },
}

/// Something that can carry a [`Call`] to a strategy and bring back its reply.
pub trait Backend: Send {
    fn label(&self) -> &str;

    /// Must return by `deadline`.
    fn call(&mut self, call: &Call, deadline: Duration) -> Result<Reply, InvokeError>;

    /// Hook run before each `new_game` is forwarded.
    fn before_new_game(&mut self) {}
}

/// Result of one call made through the handler.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub reply: Reply,
    pub fallback_used: bool,
    pub elapsed: Duration,
    pub error: Option<InvokeError>,
}

/// Wraps a strategy so every operation is bounded in time and always valid.
pub struct AgentHandler {
    backend: Box<dyn Backend>,
    deadline: Duration,
    fallback: FallbackPolicy,
    errors: u64,
    number_of_players: usize,
}

impl AgentHandler {
    /// Runs `agent` on a worker thread for the handler's whole life.
    pub fn new(agent: Box<dyn Agent>, config: &HandlerConfig) -> Self {
        Self::from_backend(Box::new(WorkerBackend::new(agent)), config)
    }

    /// Like [`AgentHandler::new`], but can replace a stalled strategy with a
    /// fresh one from `factory` when the next game starts.
    pub fn with_factory(factory: AgentFactory, config: &HandlerConfig) -> Self {
        Self::from_backend(Box::new(WorkerBackend::with_factory(factory)), config)
    }

    pub fn external(name: impl Into<String>, options: ExternalOptions, config: &HandlerConfig) -> Self {
        Self::from_backend(Box::new(ExternalBackend::new(name, options)), config)
    }

    pub fn from_backend(backend: Box<dyn Backend>, config: &HandlerConfig) -> Self {
        Self {
            backend,
            deadline: config.deadline(),
            fallback: FallbackPolicy::new(config),
            errors: 0,
            number_of_players: 0,
        }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Failed, timed-out or invalid calls since the last reset.
    pub fn error_count(&self) -> u64 {
        self.errors
    }

    pub fn reset_error_counter(&mut self) {
        self.errors = 0;
    }

    /// Runs `call` on the strategy and checks the reply.
    ///
    /// Every `Err` has already been counted and logged.
    pub fn invoke(&mut self, call: &Call) -> Result<Reply, InvokeError> {
        let result = self
            .backend
            .call(call, self.deadline)
            .and_then(|reply| self.check(call, reply));

        if let Err(err) = &result {
            self.errors += 1;
            event!(
                target: "resistance_handler::invoke",
                Level::WARN,
                agent = %self.backend.label(),
                operation = call.operation(),
                error = %err,
                error_count = self.errors,
                "strategy call failed; using fallback"
            );
        }
        result
    }

    /// Runs `call` and substitutes the fallback answer on failure.
    pub fn dispatch(&mut self, call: Call) -> CallOutcome {
        if let Call::NewGame {
            number_of_players, ..
        } = &call
        {
            self.number_of_players = *number_of_players;
            self.backend.before_new_game();
        }

        let started = Instant::now();
        let result = self.invoke(&call);
        let elapsed = started.elapsed();
        match result {
            Ok(reply) => CallOutcome {
                reply,
                fallback_used: false,
                elapsed,
                error: None,
            },
            Err(error) => CallOutcome {
                reply: self.fallback_for(&call),
                fallback_used: !call.is_notification(),
                elapsed,
                error: Some(error),
            },
        }
    }

    fn check(&self, call: &Call, reply: Reply) -> Result<Reply, InvokeError> {
        if call.is_notification() {
            return Ok(Reply::Ack);
        }
        let operation = call.operation();
        match (call, reply) {
            (Call::ProposeMission { team_size, .. }, Reply::Team(team)) => {
                validate_team(&team, *team_size, self.number_of_players).map_err(|err| {
                    InvokeError::Malformed {
                        operation,
                        reason: err.to_string(),
                    }
                })?;
                Ok(Reply::Team(team))
            }
            (Call::Vote { .. } | Call::Betray { .. }, Reply::Decision(decision)) => {
                Ok(Reply::Decision(decision))
            }
            (_, other) => Err(InvokeError::Malformed {
                operation,
                reason: format!("unexpected reply {other:?}"),
            }),
        }
    }

    fn fallback_for(&mut self, call: &Call) -> Reply {
        match call {
            Call::ProposeMission { team_size, .. } => {
                Reply::Team(self.fallback.team(self.number_of_players, *team_size))
            }
            Call::Vote { .. } => Reply::Decision(self.fallback.vote()),
            Call::Betray { .. } => Reply::Decision(self.fallback.betray()),
            _ => Reply::Ack,
        }
    }
}

impl Agent for AgentHandler {
    fn name(&self) -> &str {
        self.backend.label()
    }

    fn new_game(&mut self, number_of_players: usize, player: PlayerId, saboteurs: &[PlayerId]) {
        self.dispatch(Call::NewGame {
            number_of_players,
            player,
            saboteurs: saboteurs.to_vec(),
        });
    }

    fn propose_mission(&mut self, team_size: usize, betrayals_required: usize) -> Vec<PlayerId> {
        self.dispatch(Call::ProposeMission {
            team_size,
            betrayals_required,
        })
        .reply
        .into_team()
    }

    fn vote(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals_required: usize) -> bool {
        self.dispatch(Call::Vote {
            mission: mission.to_vec(),
            proposer,
            betrayals_required,
        })
        .reply
        .decision()
    }

    fn vote_outcome(&mut self, mission: &[PlayerId], proposer: PlayerId, approvers: &[PlayerId]) {
        self.dispatch(Call::VoteOutcome {
            mission: mission.to_vec(),
            proposer,
            approvers: approvers.to_vec(),
        });
    }

    fn betray(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals_required: usize) -> bool {
        self.dispatch(Call::Betray {
            mission: mission.to_vec(),
            proposer,
            betrayals_required,
        })
        .reply
        .decision()
    }

    fn mission_outcome(&mut self, mission: &[PlayerId], proposer: PlayerId, betrayals: usize, success: bool) {
        self.dispatch(Call::MissionOutcome {
            mission: mission.to_vec(),
            proposer,
            betrayals,
            success,
        });
    }

    fn round_outcome(&mut self, rounds_complete: usize, missions_failed: usize) {
        self.dispatch(Call::RoundOutcome {
            rounds_complete,
            missions_failed,
        });
    }

    fn game_outcome(&mut self, saboteurs_win: bool, saboteurs: &[PlayerId]) {
        self.dispatch(Call::GameOutcome {
            saboteurs_win,
            saboteurs: saboteurs.to_vec(),
        });
    }
}
