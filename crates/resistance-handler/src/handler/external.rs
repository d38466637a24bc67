use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use resistance_core::model::player::PlayerId;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{Level, event};

use super::{Backend, Call, InvokeError, Reply};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// How to launch an out-of-process strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalOptions {
    pub command: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ExternalOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Reads `command`, `args` and `working_dir` from an agent `params` block.
    pub fn from_params(name: &str, params: &serde_yaml::Value) -> Result<Self, ExternalParamError> {
        let invalid = |message: &str| ExternalParamError {
            name: name.to_string(),
            message: message.to_string(),
        };
        let mapping = params
            .as_mapping()
            .ok_or_else(|| invalid("expected mapping for external params"))?;

        let mut command = None;
        let mut args = Vec::new();
        let mut working_dir = None;
        for (key, value) in mapping {
            match key.as_str() {
                Some("command") => {
                    command = value.as_str().map(str::to_string);
                    if command.is_none() {
                        return Err(invalid("command must be a string"));
                    }
                }
                Some("args") => {
                    let seq = value
                        .as_sequence()
                        .ok_or_else(|| invalid("args must be an array of strings"))?;
                    args = seq
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect();
                }
                Some("working_dir") => {
                    working_dir = value.as_str().map(PathBuf::from);
                }
                _ => {}
            }
        }

        let command = command
            .filter(|cmd| !cmd.trim().is_empty())
            .ok_or_else(|| invalid("an external agent needs a command"))?;
        Ok(Self {
            command,
            args,
            working_dir,
        })
    }
}

#[derive(Debug, Error)]
#[error("invalid external parameter for agent '{name}': {message}")]
pub struct ExternalParamError {
    pub name: String,
    pub message: String,
}

/// What a fresh process needs to know about the game it is playing.
///
/// Sent as `"game"` with every request, since nothing survives between calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GameContext {
    pub number_of_players: usize,
    pub player: Option<PlayerId>,
    pub saboteurs: Vec<PlayerId>,
    pub missions_played: usize,
    pub missions_failed: usize,
}

impl GameContext {
    /// Folds `call` in. Outcomes count as played once they are reported.
    pub fn observe(&mut self, call: &Call) {
        match call {
            Call::NewGame {
                number_of_players,
                player,
                saboteurs,
            } => {
                *self = Self {
                    number_of_players: *number_of_players,
                    player: Some(*player),
                    saboteurs: saboteurs.clone(),
                    ..Self::default()
                };
            }
            Call::MissionOutcome { success, .. } => {
                self.missions_played += 1;
                if !success {
                    self.missions_failed += 1;
                }
            }
            Call::RoundOutcome {
                rounds_complete,
                missions_failed,
            } => {
                self.missions_played = *rounds_complete;
                self.missions_failed = *missions_failed;
            }
            Call::GameOutcome { saboteurs, .. } => {
                self.saboteurs = saboteurs.clone();
            }
            _ => {}
        }
    }
}

/// The JSON line written to the child: the call plus its `"game"` context.
fn request_line(call: &Call, context: &GameContext) -> Result<Value, InvokeError> {
    let mut request =
        serde_json::to_value(call).map_err(|err| InvokeError::Protocol(err.to_string()))?;
    let game =
        serde_json::to_value(context).map_err(|err| InvokeError::Protocol(err.to_string()))?;
    match request.as_object_mut() {
        Some(fields) => {
            fields.insert("game".to_string(), game);
            Ok(request)
        }
        None => Err(InvokeError::Protocol(format!(
            "{} did not serialize to an object",
            call.operation()
        ))),
    }
}

/// Spawns the strategy command once per call and kills it at the deadline.
pub struct ExternalBackend {
    name: String,
    options: ExternalOptions,
    context: GameContext,
}

impl ExternalBackend {
    pub fn new(name: impl Into<String>, options: ExternalOptions) -> Self {
        Self {
            name: name.into(),
            options,
            context: GameContext::default(),
        }
    }

    fn spawn(&self) -> Result<Child, InvokeError> {
        let mut cmd = Command::new(&self.options.command);
        if !self.options.args.is_empty() {
            cmd.args(&self.options.args);
        }
        if let Some(dir) = &self.options.working_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        cmd.spawn()
            .map_err(|err| InvokeError::Spawn(err.to_string()))
    }

    fn exchange(&self, call: &Call, deadline: Duration) -> Result<Vec<u8>, InvokeError> {
        let operation = call.operation();
        let expires = Instant::now() + deadline;
        let request = request_line(call, &self.context)?;
        let mut child = self.spawn()?;

        let written = child
            .stdin
            .take()
            .ok_or_else(|| InvokeError::Io("stdin".into()))
            .and_then(|mut stdin| {
                serde_json::to_writer(&mut stdin, &request)
                    .map_err(|err| InvokeError::Protocol(err.to_string()))?;
                stdin
                    .write_all(b"\n")
                    .map_err(|err| InvokeError::Io(err.to_string()))
            });
        if let Err(err) = written {
            terminate(&mut child);
            return Err(err);
        }

        let Some(mut stdout) = child.stdout.take() else {
            terminate(&mut child);
            return Err(InvokeError::Io("stdout".into()));
        };
        let (sender, output) = mpsc::sync_channel(1);
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let result = stdout.read_to_end(&mut buffer).map(|_| buffer);
            let _ = sender.send(result);
        });

        let remaining = expires.saturating_duration_since(Instant::now());
        let bytes = match output.recv_timeout(remaining) {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => {
                terminate(&mut child);
                return Err(InvokeError::Io(err.to_string()));
            }
            Err(_) => {
                terminate(&mut child);
                return Err(timed_out(operation, deadline));
            }
        };

        loop {
            match child.try_wait() {
                Ok(Some(status)) if status.success() => return Ok(bytes),
                Ok(Some(status)) => {
                    return Err(InvokeError::Protocol(format!("exit status {status}")));
                }
                Ok(None) if Instant::now() >= expires => {
                    terminate(&mut child);
                    return Err(timed_out(operation, deadline));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(err) => {
                    terminate(&mut child);
                    return Err(InvokeError::Io(err.to_string()));
                }
            }
        }
    }
}

fn terminate(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn timed_out(operation: &'static str, deadline: Duration) -> InvokeError {
    InvokeError::TimedOut {
        operation,
        deadline_ms: deadline.as_millis() as u64,
    }
}

impl Backend for ExternalBackend {
    fn label(&self) -> &str {
        &self.name
    }

    fn call(&mut self, call: &Call, deadline: Duration) -> Result<Reply, InvokeError> {
        let started = Instant::now();
        self.context.observe(call);
        let bytes = self.exchange(call, deadline)?;
        event!(
            target: "resistance_handler::external",
            Level::DEBUG,
            agent = %self.name,
            action = call.operation(),
            elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
            bytes = bytes.len(),
        );

        if call.is_notification() {
            return Ok(Reply::Ack);
        }
        let response: Value = serde_json::from_slice(&bytes)
            .map_err(|err| InvokeError::Protocol(err.to_string()))?;
        parse_reply(call, &response)
    }
}

fn parse_reply(call: &Call, response: &Value) -> Result<Reply, InvokeError> {
    let operation = call.operation();
    let malformed = |reason: String| InvokeError::Malformed { operation, reason };

    match call {
        Call::ProposeMission { .. } => {
            let members = response
                .get("team")
                .and_then(Value::as_array)
                .ok_or_else(|| malformed("expected a \"team\" array".to_string()))?;
            members
                .iter()
                .map(|member| {
                    member
                        .as_u64()
                        .and_then(|id| usize::try_from(id).ok())
                        .and_then(PlayerId::from_index)
                        .ok_or_else(|| malformed(format!("{member} is not a player id")))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Reply::Team)
        }
        _ => response
            .get("decision")
            .and_then(Value::as_bool)
            .map(Reply::Decision)
            .ok_or_else(|| malformed("expected a boolean \"decision\"".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn propose() -> Call {
        Call::ProposeMission {
            team_size: 2,
            betrayals_required: 1,
        }
    }

    #[test]
    fn parses_team_and_decision_replies() {
        let team = parse_reply(&propose(), &json!({"team": [3, 1]})).expect("team");
        assert_eq!(team, Reply::Team(vec![PlayerId::new(3), PlayerId::new(1)]));

        let vote = Call::Vote {
            mission: vec![PlayerId::new(1)],
            proposer: PlayerId::new(1),
            betrayals_required: 1,
        };
        assert_eq!(parse_reply(&vote, &json!({"decision": true})), Ok(Reply::Decision(true)));
    }

    #[test]
    fn wrong_shapes_are_malformed() {
        for response in [json!({"team": "1,2"}), json!({"team": [1, -2]}), json!({"cards": []})] {
            let err = parse_reply(&propose(), &response).expect_err("malformed");
            assert!(matches!(err, InvokeError::Malformed { operation: "propose_mission", .. }));
        }
        let betray = Call::Betray {
            mission: vec![PlayerId::new(0)],
            proposer: PlayerId::new(0),
            betrayals_required: 1,
        };
        assert!(matches!(
            parse_reply(&betray, &json!({"decision": "yes"})),
            Err(InvokeError::Malformed { operation: "betray", .. })
        ));
    }

    #[test]
    fn params_require_a_command() {
        let params: serde_yaml::Value = serde_yaml::from_str("args: [\"--fast\"]").unwrap();
        assert!(ExternalOptions::from_params("ext", &params).is_err());

        let params: serde_yaml::Value =
            serde_yaml::from_str("command: ./agent\nargs: [\"--fast\"]\nworking_dir: /tmp").unwrap();
        let options = ExternalOptions::from_params("ext", &params).expect("options");
        assert_eq!(options.command, "./agent");
        assert_eq!(options.args, vec!["--fast".to_string()]);
        assert_eq!(options.working_dir, Some(PathBuf::from("/tmp")));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let mut backend = ExternalBackend::new("ghost", ExternalOptions::new("/nonexistent/agent-binary"));
        let err = backend
            .call(&propose(), Duration::from_millis(200))
            .expect_err("spawn fails");
        assert!(matches!(err, InvokeError::Spawn(_)));
    }

    #[test]
    fn every_request_carries_the_game() {
        let mut context = GameContext::default();
        context.observe(&Call::NewGame {
            number_of_players: 7,
            player: PlayerId::new(4),
            saboteurs: vec![PlayerId::new(4), PlayerId::new(6)],
        });
        context.observe(&Call::MissionOutcome {
            mission: vec![PlayerId::new(1), PlayerId::new(2)],
            proposer: PlayerId::new(1),
            betrayals: 1,
            success: false,
        });

        let request = request_line(&propose(), &context).expect("request");
        assert_eq!(
            request,
            json!({
                "action": "propose_mission",
                "team_size": 2,
                "betrayals_required": 1,
                "game": {
                    "number_of_players": 7,
                    "player": 4,
                    "saboteurs": [4, 6],
                    "missions_played": 1,
                    "missions_failed": 1
                }
            })
        );
    }

    #[test]
    fn round_tally_overrides_counted_outcomes() {
        let mut context = GameContext::default();
        context.observe(&Call::RoundOutcome {
            rounds_complete: 3,
            missions_failed: 2,
        });
        assert_eq!(context.missions_played, 3);
        assert_eq!(context.missions_failed, 2);

        context.observe(&Call::NewGame {
            number_of_players: 5,
            player: PlayerId::new(0),
            saboteurs: Vec::new(),
        });
        assert_eq!(context.missions_played, 0);
        assert_eq!(context.player, Some(PlayerId::new(0)));
    }

    #[cfg(unix)]
    #[test]
    fn stateless_script_proposes_from_its_seat() {
        // seat plus the next seat round the table
        let script = r#"read line
seat=$(printf '%s' "$line" | sed -n 's/.*"player":\([0-9]*\).*/\1/p')
size=$(printf '%s' "$line" | sed -n 's/.*"number_of_players":\([0-9]*\).*/\1/p')
echo "{\"team\": [$seat, $(( (seat + 1) % size ))]}""#;
        let options = ExternalOptions::new("sh").with_args(["-c", script]);
        let mut backend = ExternalBackend::new("seat", options);

        let new_game = Call::NewGame {
            number_of_players: 7,
            player: PlayerId::new(6),
            saboteurs: Vec::new(),
        };
        assert_eq!(backend.call(&new_game, Duration::from_secs(2)), Ok(Reply::Ack));
        let reply = backend.call(&propose(), Duration::from_secs(2)).expect("reply");
        assert_eq!(reply, Reply::Team(vec![PlayerId::new(6), PlayerId::new(0)]));
    }

    #[cfg(unix)]
    #[test]
    fn shell_agent_round_trip() {
        let options = ExternalOptions::new("sh").with_args(["-c", "cat > /dev/null; echo '{\"team\": [0, 4]}'"]);
        let mut backend = ExternalBackend::new("sh", options);
        let reply = backend.call(&propose(), Duration::from_secs(2)).expect("reply");
        assert_eq!(reply, Reply::Team(vec![PlayerId::new(0), PlayerId::new(4)]));
    }

    #[cfg(unix)]
    #[test]
    fn hung_process_is_killed_at_deadline() {
        let options = ExternalOptions::new("sh").with_args(["-c", "sleep 5"]);
        let mut backend = ExternalBackend::new("sleeper", options);
        let started = Instant::now();
        let err = backend
            .call(&propose(), Duration::from_millis(100))
            .expect_err("times out");
        assert!(matches!(err, InvokeError::TimedOut { .. }));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
