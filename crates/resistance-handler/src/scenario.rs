//! Scripted replay of games through an [`AgentHandler`].
//!
//! The driver does not referee. It forwards the scripted calls, filling
//! omitted team sizes and tallies from the rules table and its own count of
//! resolved missions, and logs one JSONL row per call.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use resistance_bot::{Agent, BeliefAgent, BotParams};
use resistance_core::belief::VoteSignal;
use resistance_core::model::rules;
use serde::Serialize;
use thiserror::Error;
use tracing::{Level, event};

use crate::config::{AgentConfig, AgentKind, GameScript, HandlerConfig, ResolvedOutputs, ScenarioConfig, Step};
use crate::handler::{AgentHandler, Call, ExternalOptions, ExternalParamError, Reply};

/// Primary entry point for replaying a scenario file.
pub struct ScenarioRunner {
    config: ScenarioConfig,
    outputs: ResolvedOutputs,
    blueprint: AgentBlueprint,
}

/// Summary details returned after a run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub games_played: usize,
    pub calls: usize,
    pub fallbacks: usize,
    pub errors: u64,
    pub jsonl_path: PathBuf,
    pub summary_path: PathBuf,
}

impl ScenarioRunner {
    /// Build a runner from a validated configuration.
    pub fn new(config: ScenarioConfig, outputs: ResolvedOutputs) -> Result<Self, ScenarioError> {
        let blueprint = AgentBlueprint::from_config(&config.agent)?;
        Ok(Self {
            config,
            outputs,
            blueprint,
        })
    }

    /// Replay every game, streaming JSONL rows to disk.
    pub fn run(&self) -> Result<RunSummary, ScenarioError> {
        ensure_parent(self.outputs.jsonl.parent())?;
        ensure_parent(self.outputs.summary_md.parent())?;

        let mut writer = BufWriter::new(File::create(&self.outputs.jsonl)?);
        let mut handler = self.blueprint.build(&self.config.handler);
        let mut stats = RunStats::default();

        for (game_index, game) in self.config.games.iter().enumerate() {
            let errors_before = handler.error_count();
            let mut progress = Progress::default();
            let mut calls = vec![Call::NewGame {
                number_of_players: game.players,
                player: game.player,
                saboteurs: game.saboteurs.clone(),
            }];

            for (step_index, step) in game.steps.iter().enumerate() {
                calls.push(resolve_step(step, game, &mut progress).map_err(|field| {
                    ScenarioError::Unresolved {
                        game: game_index,
                        step: step_index,
                        field,
                        round: progress.played,
                        players: game.players,
                    }
                })?);
            }

            for (call_index, call) in calls.into_iter().enumerate() {
                let action = call.operation();
                let outcome = handler.dispatch(call);
                stats.record(action, outcome.elapsed, outcome.fallback_used, outcome.error.is_some());

                let row = CallLogRow {
                    run_id: &self.config.run_id,
                    agent: handler.name(),
                    game: game_index,
                    call: call_index,
                    action,
                    result: &outcome.reply,
                    elapsed_ms: outcome.elapsed.as_secs_f64() * 1000.0,
                    fallback_used: outcome.fallback_used,
                    error: outcome.error.as_ref().map(ToString::to_string),
                    error_count: handler.error_count(),
                };
                serde_json::to_writer(&mut writer, &row)?;
                writer.write_all(b"\n")?;
            }

            let game_errors = handler.error_count() - errors_before;
            event!(
                target: "resistance_handler::scenario",
                Level::INFO,
                run_id = %self.config.run_id,
                game = game_index,
                players = game.players,
                missions = progress.played,
                errors = game_errors,
            );
            stats.games.push(GameLine {
                players: game.players,
                player: game.player.index(),
                missions: progress.played,
                failures: progress.failed,
                errors: game_errors,
            });
        }

        writer.flush()?;
        let markdown = stats.render_markdown(&self.config, &self.blueprint);
        fs::write(&self.outputs.summary_md, markdown)?;

        Ok(RunSummary {
            games_played: self.config.games.len(),
            calls: stats.calls(),
            fallbacks: stats.fallbacks(),
            errors: handler.error_count(),
            jsonl_path: self.outputs.jsonl.clone(),
            summary_path: self.outputs.summary_md.clone(),
        })
    }
}

fn ensure_parent(path: Option<&Path>) -> Result<(), ScenarioError> {
    if let Some(dir) = path.filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Missions resolved so far in the current game.
#[derive(Debug, Default, Clone, Copy)]
struct Progress {
    played: usize,
    failed: usize,
}

fn resolve_step(step: &Step, game: &GameScript, progress: &mut Progress) -> Result<Call, &'static str> {
    let players = game.players;
    let round = progress.played;
    let required = |given: Option<usize>| {
        given
            .or_else(|| rules::betrayals_required(players, round))
            .ok_or("betrayals_required")
    };

    let call = match step {
        Step::ProposeMission {
            team_size,
            betrayals_required,
        } => Call::ProposeMission {
            team_size: team_size
                .or_else(|| rules::team_size(players, round))
                .ok_or("team_size")?,
            betrayals_required: required(*betrayals_required)?,
        },
        Step::Vote {
            mission,
            proposer,
            betrayals_required,
        } => Call::Vote {
            mission: mission.clone(),
            proposer: *proposer,
            betrayals_required: required(*betrayals_required)?,
        },
        Step::VoteOutcome {
            mission,
            proposer,
            approvers,
        } => Call::VoteOutcome {
            mission: mission.clone(),
            proposer: *proposer,
            approvers: approvers.clone(),
        },
        Step::Betray {
            mission,
            proposer,
            betrayals_required,
        } => Call::Betray {
            mission: mission.clone(),
            proposer: *proposer,
            betrayals_required: required(*betrayals_required)?,
        },
        Step::MissionOutcome {
            mission,
            proposer,
            betrayals,
            success,
        } => {
            let success = match success {
                Some(success) => *success,
                None => *betrayals < required(None)?,
            };
            progress.played += 1;
            if !success {
                progress.failed += 1;
            }
            Call::MissionOutcome {
                mission: mission.clone(),
                proposer: *proposer,
                betrayals: *betrayals,
                success,
            }
        }
        Step::RoundOutcome {
            rounds_complete,
            missions_failed,
        } => Call::RoundOutcome {
            rounds_complete: rounds_complete.unwrap_or(progress.played),
            missions_failed: missions_failed.unwrap_or(progress.failed),
        },
        Step::GameOutcome {
            saboteurs_win,
            saboteurs,
        } => Call::GameOutcome {
            saboteurs_win: *saboteurs_win,
            saboteurs: saboteurs.clone(),
        },
    };
    Ok(call)
}

#[derive(Serialize)]
struct CallLogRow<'a> {
    run_id: &'a str,
    agent: &'a str,
    game: usize,
    call: usize,
    action: &'static str,
    result: &'a Reply,
    elapsed_ms: f64,
    fallback_used: bool,
    error: Option<String>,
    error_count: u64,
}

#[derive(Default)]
struct ActionStats {
    calls: usize,
    fallbacks: usize,
    errors: usize,
    total: Duration,
    max: Duration,
}

struct GameLine {
    players: usize,
    player: usize,
    missions: usize,
    failures: usize,
    errors: u64,
}

#[derive(Default)]
struct RunStats {
    actions: BTreeMap<&'static str, ActionStats>,
    games: Vec<GameLine>,
}

impl RunStats {
    fn record(&mut self, action: &'static str, elapsed: Duration, fallback_used: bool, failed: bool) {
        let entry = self.actions.entry(action).or_default();
        entry.calls += 1;
        entry.fallbacks += usize::from(fallback_used);
        entry.errors += usize::from(failed);
        entry.total += elapsed;
        entry.max = entry.max.max(elapsed);
    }

    fn calls(&self) -> usize {
        self.actions.values().map(|s| s.calls).sum()
    }

    fn fallbacks(&self) -> usize {
        self.actions.values().map(|s| s.fallbacks).sum()
    }

    fn render_markdown(&self, config: &ScenarioConfig, blueprint: &AgentBlueprint) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# Scenario `{}`\n", config.run_id);
        let _ = writeln!(
            out,
            "Agent `{}` ({}), deadline {} ms.\n",
            blueprint.name(),
            blueprint.kind_label(),
            config.handler.deadline_ms
        );

        let _ = writeln!(out, "| action | calls | fallbacks | errors | mean ms | max ms |");
        let _ = writeln!(out, "|---|---:|---:|---:|---:|---:|");
        for (action, stats) in &self.actions {
            let mean_ms = if stats.calls == 0 {
                0.0
            } else {
                stats.total.as_secs_f64() * 1000.0 / stats.calls as f64
            };
            let _ = writeln!(
                out,
                "| {action} | {} | {} | {} | {mean_ms:.3} | {:.3} |",
                stats.calls,
                stats.fallbacks,
                stats.errors,
                stats.max.as_secs_f64() * 1000.0
            );
        }

        let _ = writeln!(out, "\n## Games\n");
        for (index, game) in self.games.iter().enumerate() {
            let _ = writeln!(
                out,
                "- game {index}: {} players, seat {}, {} missions ({} failed), {} errors",
                game.players, game.player, game.missions, game.failures, game.errors
            );
        }
        out
    }
}

/// How to build the handler-wrapped strategy named in the config.
enum AgentBlueprint {
    Belief { name: String, params: BotParams },
    External { name: String, options: ExternalOptions },
}

impl AgentBlueprint {
    fn from_config(config: &AgentConfig) -> Result<Self, AgentError> {
        match config.kind {
            AgentKind::Belief => Ok(AgentBlueprint::Belief {
                name: config.name.clone(),
                params: belief_params(&config.name, &config.params)?,
            }),
            AgentKind::External => Ok(AgentBlueprint::External {
                name: config.name.clone(),
                options: ExternalOptions::from_params(&config.name, &config.params)?,
            }),
        }
    }

    fn name(&self) -> &str {
        match self {
            AgentBlueprint::Belief { name, .. } | AgentBlueprint::External { name, .. } => name,
        }
    }

    fn kind_label(&self) -> &'static str {
        match self {
            AgentBlueprint::Belief { .. } => "belief",
            AgentBlueprint::External { .. } => "external",
        }
    }

    fn build(&self, config: &HandlerConfig) -> AgentHandler {
        match self {
            AgentBlueprint::Belief { name, params } => {
                let name = name.clone();
                let params = *params;
                AgentHandler::with_factory(
                    Box::new(move || Box::new(BeliefAgent::new(name.clone(), params)) as Box<dyn Agent>),
                    config,
                )
            }
            AgentBlueprint::External { name, options } => {
                AgentHandler::external(name.clone(), options.clone(), config)
            }
        }
    }
}

/// Environment defaults, then any overrides from the agent's `params` block.
fn belief_params(name: &str, params: &serde_yaml::Value) -> Result<BotParams, AgentError> {
    let mut out = BotParams::from_env();
    if params.is_null() {
        return Ok(out);
    }
    let invalid = |message: String| AgentError::InvalidBeliefParam {
        name: name.to_string(),
        message,
    };
    let mapping = params
        .as_mapping()
        .ok_or_else(|| invalid("expected mapping for belief params".to_string()))?;

    for (key, value) in mapping {
        let Some(key) = key.as_str() else {
            continue;
        };
        let number = || {
            value
                .as_f64()
                .filter(|v| v.is_finite())
                .ok_or_else(|| invalid(format!("{key} must be a number")))
        };
        match key {
            "reject_ceiling" => out.reject_ceiling = number()?,
            "vote_threshold_base" => out.vote_threshold_base = number()?,
            "vote_threshold_step" => out.vote_threshold_step = number()?,
            "vote_threshold_period" => out.vote_threshold_period = number()?,
            "betrayal_exposure" => out.betrayal_exposure = number()?,
            "detection_ceiling" => out.detection_ceiling = number()?,
            "proposer_blame" => out.update.proposer_blame = number()?,
            "high_suspicion" => out.update.high_suspicion = number()?,
            "vote_signal" => {
                out.update.vote_signal = value
                    .as_str()
                    .ok_or_else(|| invalid("vote_signal must be a string".to_string()))?
                    .parse::<VoteSignal>()
                    .map_err(invalid)?;
            }
            "track_self_exposure" => {
                out.update.track_self_exposure = value
                    .as_bool()
                    .ok_or_else(|| invalid("track_self_exposure must be a boolean".to_string()))?;
            }
            other => {
                return Err(invalid(format!("unknown parameter '{other}'")));
            }
        }
    }
    Ok(out)
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("{0}")]
    Agent(#[from] AgentError),
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("failed to serialize log row: {source}")]
    Serialize {
        #[from]
        source: serde_json::Error,
    },
    #[error("game {game} step {step}: no {field} for round {round} of a {players}-player game")]
    Unresolved {
        game: usize,
        step: usize,
        field: &'static str,
        round: usize,
        players: usize,
    },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid belief parameter for agent '{name}': {message}")]
    InvalidBeliefParam { name: String, message: String },
    #[error(transparent)]
    External(#[from] ExternalParamError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use resistance_core::model::player::{PlayerId, players};

    fn game(steps: Vec<Step>) -> GameScript {
        GameScript {
            players: 7,
            player: PlayerId::new(0),
            saboteurs: Vec::new(),
            steps,
        }
    }

    #[test]
    fn omitted_sizes_come_from_rules_table() {
        let script = game(Vec::new());
        let mut progress = Progress {
            played: 3,
            failed: 1,
        };
        let step = Step::ProposeMission {
            team_size: None,
            betrayals_required: None,
        };
        assert_eq!(
            resolve_step(&step, &script, &mut progress),
            Ok(Call::ProposeMission {
                team_size: 4,
                betrayals_required: 2
            })
        );
    }

    #[test]
    fn mission_outcome_infers_success_and_advances() {
        let script = game(Vec::new());
        let mut progress = Progress::default();
        let step = Step::MissionOutcome {
            mission: players(&[1, 2]),
            proposer: PlayerId::new(1),
            betrayals: 1,
            success: None,
        };
        let call = resolve_step(&step, &script, &mut progress).expect("resolves");
        assert!(matches!(call, Call::MissionOutcome { success: false, .. }));
        assert_eq!((progress.played, progress.failed), (1, 1));

        let tally = Step::RoundOutcome {
            rounds_complete: None,
            missions_failed: None,
        };
        assert_eq!(
            resolve_step(&tally, &script, &mut progress),
            Ok(Call::RoundOutcome {
                rounds_complete: 1,
                missions_failed: 1
            })
        );
    }

    #[test]
    fn past_the_last_round_sizes_must_be_given() {
        let script = game(Vec::new());
        let mut progress = Progress {
            played: 5,
            failed: 2,
        };
        let step = Step::ProposeMission {
            team_size: None,
            betrayals_required: Some(1),
        };
        assert_eq!(resolve_step(&step, &script, &mut progress), Err("team_size"));
    }

    #[test]
    fn belief_params_apply_overrides() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("reject_ceiling: 0.9\nvote_signal: current_round\ntrack_self_exposure: true")
                .unwrap();
        let params = belief_params("b", &yaml).expect("params");
        assert!((params.reject_ceiling - 0.9).abs() < f64::EPSILON);
        assert_eq!(params.update.vote_signal, VoteSignal::CurrentRound);
        assert!(params.update.track_self_exposure);

        let bad: serde_yaml::Value = serde_yaml::from_str("mystery: 1").unwrap();
        assert!(belief_params("b", &bad).is_err());
    }
}
