use std::path::PathBuf;

use clap::Parser;

use geoguess_bench::config::{BenchConfig, ResolvedOutputs};
use geoguess_bench::logging::init_logging;
use geoguess_bench::runner::AccuracyRunner;

/// Offline accuracy harness for the guessing engine.
#[derive(Debug, Parser)]
#[command(
    name = "geoguess-bench",
    author,
    version,
    about = "Plays one scripted game per catalog item and reports accuracy"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "bench/bench.yaml")]
    config: PathBuf,

    /// Override the run identifier (substitutes {run_id} templates).
    #[arg(long, value_name = "RUN_ID")]
    run_id: Option<String>,

    /// Override the category to play.
    #[arg(long, value_name = "CATEGORY")]
    category: Option<String>,

    /// Override the RNG seed for the scripted answerer.
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Only play the first COUNT catalog items.
    #[arg(long, value_name = "COUNT")]
    limit: Option<usize>,

    /// Override the chance of a wrong (hedged) answer.
    #[arg(long, value_name = "RATE")]
    answer_noise: Option<f64>,

    /// Exit after validating the configuration (no games are played).
    #[arg(long)]
    validate_only: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = BenchConfig::from_path(&cli.config)?;

    if let Some(run_id) = cli.run_id {
        config.run_id = run_id;
    }

    if let Some(category) = cli.category {
        config.data.category = category;
    }

    if let Some(seed) = cli.seed {
        config.games.seed = Some(seed);
    }

    if let Some(limit) = cli.limit {
        config.games.limit = Some(limit);
    }

    if let Some(noise) = cli.answer_noise {
        config.games.answer_noise = noise;
    }

    config.validate()?;

    let outputs: ResolvedOutputs = config.resolved_outputs();
    let run_id = config.run_id.clone();
    println!(
        "Loaded configuration '{run_id}' for category '{}' from {}",
        config.data.category,
        config.data.dir.display()
    );

    if cli.validate_only {
        println!("Validation-only mode: no games played.");
        return Ok(());
    }

    let telemetry = init_logging(&config.logging, &outputs)?;
    let runner = AccuracyRunner::new(config, outputs)?;
    let summary = runner.run()?;
    let accuracy = &summary.accuracy;
    println!(
        "Run complete for '{run_id}': {}/{} correct ({:.1}%, 95% CI {:.1}%-{:.1}%), {:.2} questions on average",
        accuracy.correct,
        accuracy.games,
        accuracy.accuracy * 100.0,
        accuracy.accuracy_ci.0 * 100.0,
        accuracy.accuracy_ci.1 * 100.0,
        accuracy.mean_questions
    );
    println!(
        "{} rows at {}",
        summary.rows_written,
        summary.jsonl_path.display()
    );
    println!("Summary table: {}", summary.summary_path.display());
    if let Some(telemetry) = telemetry {
        println!("Telemetry log: {}", telemetry.finish().display());
    }

    Ok(())
}
