use std::path::PathBuf;

use clap::Parser;

use resistance_core::AppInfo;
use resistance_handler::config::{ResolvedOutputs, ScenarioConfig};
use resistance_handler::logging::init_logging;
use resistance_handler::scenario::ScenarioRunner;

/// Replays scripted games through a deadline-bounded strategy handler.
#[derive(Debug, Parser)]
#[command(
    name = "resistance-handler",
    author,
    version,
    about = "Bounded invocation harness for resistance strategies"
)]
struct Cli {
    /// Path to the YAML scenario file.
    #[arg(short, long, value_name = "FILE", default_value = "scenarios/demo.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the per-call deadline in milliseconds.
    #[arg(long, value_name = "MS")]
    deadline_ms: Option<u64>,

    /// Override the fallback RNG seed.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Write JSON telemetry next to the summary regardless of config.
    #[arg(long)]
    structured_logs: bool,

    /// Exit after validating the configuration (nothing is replayed).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = ScenarioConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(deadline_ms) = cli.deadline_ms {
        config.handler.deadline_ms = deadline_ms;
    }

    if let Some(seed) = cli.seed {
        config.handler.seed = Some(seed);
    }

    if cli.structured_logs {
        config.logging.enable_structured = true;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    let game_count = config.games.len();
    let agent = config.agent.name.clone();

    println!(
        "{} {} ({})",
        AppInfo::name(),
        AppInfo::version(),
        AppInfo::codename()
    );
    println!(
        "Loaded scenario '{run_id}' for agent '{agent}' with {game_count} game{} (deadline {} ms)",
        if game_count == 1 { "" } else { "s" },
        config.handler.deadline_ms
    );

    let logging_guard = init_logging(&config.logging, &outputs, &run_id)?;
    let runner = ScenarioRunner::new(config, outputs)?;

    if cli.validate_only {
        println!("Validation-only mode: replay skipped.");
        return Ok(());
    }

    let summary = runner.run()?;
    println!(
        "Replay complete for '{run_id}': {} games, {} calls, {} fallbacks, {} errors → {}",
        summary.games_played,
        summary.calls,
        summary.fallbacks,
        summary.errors,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(guard) = logging_guard.as_ref() {
        println!("Telemetry log: {}", guard.telemetry_path.display());
    }

    Ok(())
}
