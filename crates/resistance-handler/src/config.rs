use resistance_core::model::player::PlayerId;
use resistance_core::model::rules::{MAX_PLAYERS, MIN_PLAYERS};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

const DEFAULT_DEADLINE_MS: u64 = 1_000;
const DEFAULT_APPROVAL_PROBABILITY: f64 = 0.5;
const DEFAULT_BETRAY_PROBABILITY: f64 = 0.3;
const RUN_ID_ALLOWED: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789._-";

/// Root scenario configuration loaded from YAML.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ScenarioConfig {
    pub run_id: String,
    #[serde(default)]
    pub handler: HandlerConfig,
    pub agent: AgentConfig,
    pub games: Vec<GameScript>,
    pub outputs: OutputsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ScenarioConfig {
    /// Load configuration from a YAML file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let path_buf = path.to_path_buf();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            source,
            path: path_buf.clone(),
        })?;
        let reader = BufReader::new(file);
        let mut cfg: ScenarioConfig =
            serde_yaml::from_reader(reader).map_err(|source| ConfigError::Parse {
                source,
                path: path_buf.clone(),
            })?;
        cfg.validate().map_err(|source| ConfigError::Invalid {
            path: path_buf,
            source,
        })?;
        Ok(cfg)
    }

    /// Validate the configuration without performing I/O.
    pub fn validate(&mut self) -> Result<(), ValidationError> {
        validate_run_id(&self.run_id)?;
        self.handler.validate()?;
        self.agent.validate()?;
        self.outputs.validate(&self.run_id)?;
        self.logging.normalize();
        validate_games(&self.games)?;
        Ok(())
    }

    /// Resolve `{run_id}` placeholders into concrete paths.
    pub fn resolved_outputs(&self) -> ResolvedOutputs {
        ResolvedOutputs {
            jsonl: resolve_template(&self.run_id, &self.outputs.jsonl),
            summary_md: resolve_template(&self.run_id, &self.outputs.summary_md),
        }
    }
}

/// Deadline and fallback settings for an [`crate::handler::AgentHandler`].
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct HandlerConfig {
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    #[serde(default = "default_approval_probability")]
    pub vote_approval_probability: f64,
    #[serde(default = "default_betray_probability")]
    pub betray_probability: f64,
    /// Fixed seed for fallback randomness; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE_MS,
            vote_approval_probability: DEFAULT_APPROVAL_PROBABILITY,
            betray_probability: DEFAULT_BETRAY_PROBABILITY,
            seed: None,
        }
    }
}

impl HandlerConfig {
    pub fn with_deadline_ms(mut self, deadline_ms: u64) -> Self {
        self.deadline_ms = deadline_ms;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.deadline_ms == 0 {
            return Err(ValidationError::InvalidField {
                field: "handler.deadline_ms".to_string(),
                message: "deadline must be greater than zero".to_string(),
            });
        }
        for (label, value) in [
            ("handler.vote_approval_probability", self.vote_approval_probability),
            ("handler.betray_probability", self.betray_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: format!("probability {value} is outside [0, 1]"),
                });
            }
        }
        Ok(())
    }
}

fn default_deadline_ms() -> u64 {
    DEFAULT_DEADLINE_MS
}

fn default_approval_probability() -> f64 {
    DEFAULT_APPROVAL_PROBABILITY
}

fn default_betray_probability() -> f64 {
    DEFAULT_BETRAY_PROBABILITY
}

/// The strategy under test.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub name: String,
    pub kind: AgentKind,
    #[serde(default)]
    pub params: serde_yaml::Value,
}

impl AgentConfig {
    fn validate(&mut self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::InvalidField {
                field: "agent.name".to_string(),
                message: "agent name must not be empty".to_string(),
            });
        }
        if !self
            .name
            .chars()
            .all(|c| RUN_ID_ALLOWED.contains(c) || c == '/')
        {
            return Err(ValidationError::InvalidField {
                field: "agent.name".to_string(),
                message: format!("agent name '{}' contains invalid characters", self.name),
            });
        }
        if self.params.is_null() {
            self.params = serde_yaml::Value::Mapping(Default::default());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Belief,
    External,
}

/// One scripted game: the `new_game` arguments plus the calls that follow.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct GameScript {
    pub players: usize,
    pub player: PlayerId,
    #[serde(default)]
    pub saboteurs: Vec<PlayerId>,
    pub steps: Vec<Step>,
}

/// A scripted call. Omitted sizes and tallies are filled from the rules
/// table and the replay's own bookkeeping.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    ProposeMission {
        team_size: Option<usize>,
        betrayals_required: Option<usize>,
    },
    Vote {
        mission: Vec<PlayerId>,
        proposer: PlayerId,
        betrayals_required: Option<usize>,
    },
    VoteOutcome {
        mission: Vec<PlayerId>,
        proposer: PlayerId,
        approvers: Vec<PlayerId>,
    },
    Betray {
        mission: Vec<PlayerId>,
        proposer: PlayerId,
        betrayals_required: Option<usize>,
    },
    MissionOutcome {
        mission: Vec<PlayerId>,
        proposer: PlayerId,
        betrayals: usize,
        success: Option<bool>,
    },
    RoundOutcome {
        rounds_complete: Option<usize>,
        missions_failed: Option<usize>,
    },
    GameOutcome {
        saboteurs_win: bool,
        #[serde(default)]
        saboteurs: Vec<PlayerId>,
    },
}

impl Step {
    fn players(&self) -> Vec<PlayerId> {
        match self {
            Step::Vote {
                mission, proposer, ..
            }
            | Step::Betray {
                mission, proposer, ..
            }
            | Step::MissionOutcome {
                mission, proposer, ..
            } => mission.iter().copied().chain([*proposer]).collect(),
            Step::VoteOutcome {
                mission,
                proposer,
                approvers,
            } => mission
                .iter()
                .chain(approvers)
                .copied()
                .chain([*proposer])
                .collect(),
            Step::GameOutcome { saboteurs, .. } => saboteurs.clone(),
            Step::ProposeMission { .. } | Step::RoundOutcome { .. } => Vec::new(),
        }
    }
}

/// Output artifact configuration.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct OutputsConfig {
    pub jsonl: String,
    pub summary_md: String,
}

impl OutputsConfig {
    fn validate(&self, run_id: &str) -> Result<(), ValidationError> {
        for (label, value) in [
            ("outputs.jsonl", &self.jsonl),
            ("outputs.summary_md", &self.summary_md),
        ] {
            if value.trim().is_empty() {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "path must not be empty".to_string(),
                });
            }

            let resolved = resolve_template(run_id, value);
            if resolved.components().count() == 0 {
                return Err(ValidationError::InvalidField {
                    field: label.to_string(),
                    message: "resolved path is invalid".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Structured logging is off unless asked for.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default)]
    pub enable_structured: bool,
    #[serde(default = "default_tracing_level")]
    pub tracing_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enable_structured: false,
            tracing_level: default_tracing_level(),
        }
    }
}

impl LoggingConfig {
    fn normalize(&mut self) {
        if self.tracing_level.trim().is_empty() {
            self.tracing_level = default_tracing_level();
        }
    }

    pub fn level(&self) -> Option<Level> {
        match self.tracing_level.to_ascii_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" | "warning" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }
}

fn default_tracing_level() -> String {
    "info".to_string()
}

fn validate_run_id(run_id: &str) -> Result<(), ValidationError> {
    if run_id.trim().is_empty() {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id must not be empty".to_string(),
        });
    }

    if !run_id.chars().all(|c| RUN_ID_ALLOWED.contains(c)) {
        return Err(ValidationError::InvalidField {
            field: "run_id".to_string(),
            message: "run_id may only contain alphanumeric characters, '.', '_' or '-'".to_string(),
        });
    }

    Ok(())
}

fn validate_games(games: &[GameScript]) -> Result<(), ValidationError> {
    if games.is_empty() {
        return Err(ValidationError::InvalidField {
            field: "games".to_string(),
            message: "at least one game must be scripted".to_string(),
        });
    }

    for (index, game) in games.iter().enumerate() {
        let field = |name: &str| format!("games[{index}].{name}");
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&game.players) {
            return Err(ValidationError::InvalidField {
                field: field("players"),
                message: format!(
                    "{} players is outside {MIN_PLAYERS}..={MAX_PLAYERS}",
                    game.players
                ),
            });
        }
        if !game.player.in_range(game.players) {
            return Err(ValidationError::InvalidField {
                field: field("player"),
                message: format!("{} is not seated in a {}-player game", game.player, game.players),
            });
        }

        let mut seen = HashSet::new();
        for saboteur in &game.saboteurs {
            if !saboteur.in_range(game.players) || !seen.insert(*saboteur) {
                return Err(ValidationError::InvalidField {
                    field: field("saboteurs"),
                    message: format!("{saboteur} is out of range or listed twice"),
                });
            }
        }

        for (step_index, step) in game.steps.iter().enumerate() {
            if let Some(stray) = step.players().into_iter().find(|p| !p.in_range(game.players)) {
                return Err(ValidationError::InvalidField {
                    field: field(&format!("steps[{step_index}]")),
                    message: format!("{stray} is not seated in a {}-player game", game.players),
                });
            }
        }
    }

    Ok(())
}

fn resolve_template(run_id: &str, template: &str) -> PathBuf {
    PathBuf::from(template.replace("{run_id}", run_id))
}

/// Fully resolved output paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOutputs {
    pub jsonl: PathBuf,
    pub summary_md: PathBuf,
}

/// Errors surfaced when loading configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("failed to parse config {path:?}: {source}")]
    Parse {
        #[source]
        source: serde_yaml::Error,
        path: PathBuf,
    },
    #[error("invalid configuration in {path:?}: {source}")]
    Invalid {
        path: PathBuf,
        source: ValidationError,
    },
}

/// Validation failures tagged with the offending field.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field}: {message}")]
    InvalidField { field: String, message: String },
}
