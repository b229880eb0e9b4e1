use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use opsgym::catalog::{self, DEFINITION_FILE};
use opsgym::lifecycle::{HintOutcome, ResetOptions, StartOptions};
use opsgym::progress::ExerciseState;
use opsgym::{Gym, GymConfig, GymError, SystemRunner};

#[derive(Parser)]
#[command(name = "opsgym", about = "Hands-on infrastructure training exercises", version)]
struct Cli {
    /// Directory containing exercise definitions
    #[arg(long, env = "OPSGYM_EXERCISES_DIR", global = true)]
    exercises_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available exercises
    List,
    /// Provision an exercise environment and begin working on it
    Start {
        name: String,
        /// Skip kind cluster creation and use the current kubectl context
        #[arg(long)]
        no_cluster: bool,
    },
    /// Run the checks for the current (or named) exercise
    Check {
        name: Option<String>,
        /// Show failure messages for each check
        #[arg(long, short)]
        verbose: bool,
    },
    /// Reveal the next hint
    Hint {
        name: Option<String>,
        /// Reveal all remaining hints at once
        #[arg(long)]
        reveal_all: bool,
    },
    /// Tear down the exercise environment
    Stop { name: Option<String> },
    /// Tear down and provision the environment again from scratch
    Reset {
        name: Option<String>,
        #[arg(long)]
        no_cluster: bool,
        /// Keep the work directory contents
        #[arg(long)]
        keep_work: bool,
    },
    /// Show progress across all exercises
    Status,
    /// Show the full description of an exercise
    Describe { name: String },
    /// Validate every definition file under a directory
    Validate {
        #[arg(default_value = "exercises")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Command::Validate { dir } = &cli.command {
        return validate(dir);
    }

    let config = GymConfig::resolve(cli.exercises_dir.clone())?;
    let gym = Gym::new(config, Arc::new(SystemRunner))?;

    match cli.command {
        Command::List => list(&gym),
        Command::Start { name, no_cluster } => start(&gym, &name, no_cluster).await,
        Command::Check { name, verbose } => check(&gym, name.as_deref(), verbose).await,
        Command::Hint { name, reveal_all } => hint(&gym, name.as_deref(), reveal_all),
        Command::Stop { name } => stop(&gym, name.as_deref()).await,
        Command::Reset {
            name,
            no_cluster,
            keep_work,
        } => reset(&gym, name.as_deref(), no_cluster, keep_work).await,
        Command::Status => status(&gym),
        Command::Describe { name } => describe(&gym, &name),
        Command::Validate { .. } => unreachable!("handled above"),
    }
}

fn list(gym: &Gym) -> Result<()> {
    let progress = gym.progress()?;
    let entries = gym.catalog().entries();
    if entries.is_empty() {
        println!("No exercises found in {}", gym.config().exercises_dir.display());
        return Ok(());
    }

    let mut completed = 0;
    for entry in entries {
        let ex = &entry.exercise;
        let state = progress.status(&ex.name).status;
        let marker = match state {
            ExerciseState::Completed => {
                completed += 1;
                "✓"
            }
            ExerciseState::InProgress => "▶",
            _ => " ",
        };
        let difficulty = ex.difficulty.as_deref().unwrap_or("-");
        println!("{marker} {:<24} {:<10} {}", ex.name, difficulty, ex.title);
    }
    println!();
    println!("{} exercises total, {completed} completed", entries.len());
    Ok(())
}

async fn start(gym: &Gym, name: &str, no_cluster: bool) -> Result<()> {
    let entry = gym.entry(name)?;
    let ex = &entry.exercise;

    println!();
    println!("{}", ex.title);
    println!("{}", "═".repeat(ex.title.chars().count()));
    if let Some(difficulty) = &ex.difficulty {
        println!("Difficulty: {difficulty}");
    }
    if let Some(time) = &ex.estimated_time {
        println!("Estimated time: {time}");
    }
    if !ex.description.is_empty() {
        println!();
        println!("{}", ex.description);
    }
    println!();

    let outcome = gym.start(name, StartOptions { no_cluster }).await?;

    println!("Environment is up.");
    println!();
    println!("Work directory: {}", outcome.work_dir.display());
    println!();
    println!("When you think you have solved it, run:");
    println!("  opsgym check");
    Ok(())
}

async fn check(gym: &Gym, name: Option<&str>, verbose: bool) -> Result<()> {
    let name = resolve_target(gym, name)?;
    println!("Checking: {name}");
    println!();

    let outcome = gym.check(&name).await?;
    for result in &outcome.results {
        if result.passed {
            println!("  ✓ {}", result.name);
        } else if verbose && !result.message.is_empty() {
            println!("  ✗ {} — {}", result.name, result.message);
        } else {
            println!("  ✗ {}", result.name);
        }
    }
    println!();

    if outcome.all_passed {
        match &outcome.success_message {
            Some(message) => println!("{message}"),
            None => println!("Exercise complete! Well done."),
        }
        if let Some(score) = outcome.score {
            println!("Score recorded: {score} points");
        }
        return Ok(());
    }

    println!(
        "Exercise not complete. {}/{} checks passed.",
        outcome.passed_count(),
        outcome.results.len()
    );
    if !verbose {
        println!("Use --verbose for failure details.");
    }
    bail!("checks failed");
}

fn hint(gym: &Gym, name: Option<&str>, reveal_all: bool) -> Result<()> {
    let name = resolve_target(gym, name)?;
    match gym.hint(&name, reveal_all)? {
        HintOutcome::Exhausted => println!("No more hints available."),
        HintOutcome::Revealed { hints, remaining } => {
            for hint in hints {
                println!("Hint {} (cost {}):", hint.number, hint.cost);
                println!("  {}", hint.content.trim());
                println!();
            }
            if remaining > 0 {
                println!("{remaining} hint(s) still hidden.");
            }
        }
    }
    Ok(())
}

async fn stop(gym: &Gym, name: Option<&str>) -> Result<()> {
    let name = resolve_target(gym, name)?;
    let swallowed = gym.stop(&name).await?;
    for warning in &swallowed {
        eprintln!("Warning: {warning}");
    }
    println!("Exercise '{name}' stopped. Resources have been cleaned up.");
    Ok(())
}

async fn reset(gym: &Gym, name: Option<&str>, no_cluster: bool, keep_work: bool) -> Result<()> {
    let name = resolve_target(gym, name)?;
    let outcome = gym
        .reset(
            &name,
            ResetOptions {
                no_cluster,
                keep_work,
            },
        )
        .await?;
    println!("Exercise reset.");
    println!("Work directory: {}", outcome.work_dir.display());
    Ok(())
}

fn status(gym: &Gym) -> Result<()> {
    let progress = gym.progress()?;
    let entries = gym.catalog().entries();

    let mut completed = 0;
    let mut earned = 0u32;
    let mut available = 0u32;
    for entry in entries {
        let ex = &entry.exercise;
        available += ex.score_points();
        let st = progress.status(&ex.name);
        let label = match st.status {
            ExerciseState::NotStarted => "not started",
            ExerciseState::InProgress => "in progress",
            ExerciseState::Completed => "completed",
            ExerciseState::Stopped => "stopped",
        };
        if st.status == ExerciseState::Completed {
            completed += 1;
            earned += st.score;
            println!("{:<24} {label:<12} {:>4} pts", ex.name, st.score);
        } else if st.hints_used > 0 {
            println!("{:<24} {label:<12} ({} hints used)", ex.name, st.hints_used);
        } else {
            println!("{:<24} {label}", ex.name);
        }
    }
    println!();
    println!(
        "{completed}/{} completed — {earned}/{available} points",
        entries.len()
    );
    Ok(())
}

fn describe(gym: &Gym, name: &str) -> Result<()> {
    let entry = gym.entry(name)?;
    let ex = &entry.exercise;

    println!("{} — {}", ex.name, ex.title);
    if let Some(difficulty) = &ex.difficulty {
        println!("Difficulty: {difficulty}");
    }
    if let Some(time) = &ex.estimated_time {
        println!("Estimated time: {time}");
    }
    println!("Points: {}", ex.score_points());
    println!("Environment: {}", ex.environment.kind_name());
    if !ex.description.is_empty() {
        println!();
        println!("{}", ex.description);
    }
    println!();
    println!("{} check(s), {} hint(s)", ex.checks.len(), ex.hints.len());
    Ok(())
}

/// Check every definition file under `dir` and report all problems instead
/// of stopping at the first invalid one.
fn validate(dir: &PathBuf) -> Result<()> {
    let mut seen = 0usize;
    let mut invalid = 0usize;
    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() || entry.file_name() != DEFINITION_FILE {
            continue;
        }
        seen += 1;
        match catalog::load_definition_file(entry.path()) {
            Ok(ex) => println!("✓ {} ({})", entry.path().display(), ex.name),
            Err(GymError::DefinitionInvalid { path, reasons }) => {
                invalid += 1;
                println!("✗ {}", path.display());
                for reason in reasons {
                    println!("    {reason}");
                }
            }
            Err(e) => {
                invalid += 1;
                println!("✗ {}: {e}", entry.path().display());
            }
        }
    }

    if seen == 0 {
        bail!("no {DEFINITION_FILE} files found under {}", dir.display());
    }
    println!();
    println!("{} definition(s), {invalid} invalid", seen);
    if invalid > 0 {
        bail!("validation failed");
    }
    Ok(())
}

fn resolve_target(gym: &Gym, name: Option<&str>) -> Result<String> {
    gym.resolve_target(name).map_err(|e| {
        anyhow::anyhow!("{e}. Start an exercise first or name one explicitly.")
    })
}
