//! Dialectic CLI
//!
//! Replays a recorded discussion through the progression engine and prints
//! the interventions it would have made, or inspects a saved state file.
//!
//! # Usage
//!
//! ```bash
//! # Replay a JSONL transcript ({"speaker": ..., "content": ...} per line)
//! dialectic replay transcript.jsonl --save state.json --report
//!
//! # Continue from a saved state with LLM-enhanced consequence tests
//! DIALECTIC_ENHANCER_URL=http://localhost:8000/v1/chat/completions \
//!     dialectic replay more.jsonl --resume state.json --enhancer
//!
//! # Print the status report of a saved state
//! dialectic inspect state.json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use dialectic::{
    ChatEnhancer, EnhancerConfig, IntegrityStatus, ProgressionConfig, ProgressionController,
    TurnContext,
};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (DIALECTIC_* environment variables apply when absent)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a JSONL transcript through the engine, printing interventions as JSON lines
    Replay {
        /// Transcript with one {"speaker", "content", "episode_summary"?} object per line
        transcript: PathBuf,

        /// Load progression state from this file before replaying
        #[arg(long)]
        resume: Option<PathBuf>,

        /// Save progression state to this file afterwards
        #[arg(long)]
        save: Option<PathBuf>,

        /// Print the status report as JSON to stderr when done
        #[arg(long, default_value_t = false)]
        report: bool,

        /// Enhance consequence tests via DIALECTIC_ENHANCER_* settings
        #[arg(long, default_value_t = false)]
        enhancer: bool,
    },
    /// Print the status report of a saved state file
    Inspect {
        state: PathBuf,

        /// Emit the full report as JSON instead of a summary
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

/// One line of a transcript.
#[derive(Debug, Deserialize)]
struct TranscriptTurn {
    speaker: String,
    content: String,
    #[serde(flatten)]
    context: TurnContext,
}

fn load_config(path: Option<&Path>) -> Result<ProgressionConfig> {
    match path {
        Some(p) => ProgressionConfig::from_toml_file(p)
            .with_context(|| format!("loading config from {}", p.display())),
        None => {
            let config = ProgressionConfig::from_env();
            config.validate().context("invalid DIALECTIC_* configuration")?;
            Ok(config)
        }
    }
}

fn parse_transcript(raw: &str) -> Result<Vec<TranscriptTurn>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).with_context(|| format!("transcript line {}", i + 1))
        })
        .collect()
}

async fn replay(
    mut controller: ProgressionController,
    transcript: &Path,
    resume: Option<&Path>,
    save: Option<&Path>,
    report: bool,
) -> Result<()> {
    if let Some(path) = resume {
        let status = controller
            .load_state(path)
            .with_context(|| format!("resuming from {}", path.display()))?;
        if let IntegrityStatus::Recoverable { warnings } = status {
            warn!(count = warnings.len(), "resumed from an inconsistent checkpoint");
        }
    }

    let raw = tokio::fs::read_to_string(transcript)
        .await
        .with_context(|| format!("reading transcript {}", transcript.display()))?;
    let turns = parse_transcript(&raw)?;
    info!(turns = turns.len(), path = %transcript.display(), "replaying transcript");

    for turn in &turns {
        let outcome = controller
            .process_turn(&turn.content, &turn.speaker, &turn.context)
            .await;
        for intervention in &outcome.interventions {
            println!("{}", serde_json::to_string(intervention)?);
        }
    }

    let metrics = controller.metrics();
    info!(
        turns = metrics.turns_processed,
        tests = metrics.tests_injected,
        pivots = metrics.pivots_forced,
        syntheses = metrics.syntheses_emitted,
        "replay finished"
    );

    if let Some(path) = save {
        controller
            .save_state(path)
            .with_context(|| format!("saving state to {}", path.display()))?;
    }
    if report {
        eprintln!("{}", controller.status_report().to_json()?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries interventions
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dialectic=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(args.config.as_deref())?;
    let controller = ProgressionController::new(config)?;

    match args.command {
        Command::Replay {
            transcript,
            resume,
            save,
            report,
            enhancer,
        } => {
            let controller = if enhancer {
                let enhancer_config = EnhancerConfig::from_env();
                info!(url = %enhancer_config.url, model = %enhancer_config.model, "consequence test enhancer enabled");
                controller.with_enhancer(Box::new(ChatEnhancer::new(enhancer_config)?))
            } else {
                controller
            };
            replay(
                controller,
                &transcript,
                resume.as_deref(),
                save.as_deref(),
                report,
            )
            .await
        }
        Command::Inspect { state, json } => {
            let mut controller = controller;
            let status = controller
                .load_state(&state)
                .with_context(|| format!("loading {}", state.display()))?;
            if json {
                println!("{}", controller.status_report().to_json()?);
            } else {
                println!("integrity: {:?}", status);
                for line in controller.status_report().summary_lines() {
                    println!("{}", line);
                }
            }
            Ok(())
        }
    }
}
