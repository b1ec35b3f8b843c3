use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use geoguess_app::config::AppConfig;
use geoguess_app::logging::init_logging;
use geoguess_app::service::GameService;
use geoguess_core::{Answer, AppInfo, Category, Prediction, Step};

/// Twenty-questions guessing game for countries, cities and places.
#[derive(Debug, Parser)]
#[command(name = "geoguess", author, version, about = "Think of a place, I will guess it")]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the directory holding the category JSON files.
    #[arg(long, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play one game on the terminal.
    Play {
        /// Category to play: country, city or place.
        #[arg(long, default_value = "country")]
        category: String,

        /// Override the maximum number of questions.
        #[arg(long, value_name = "COUNT")]
        max_questions: Option<usize>,

        /// Print candidates left and confidence after every answer.
        #[arg(long)]
        verbose: bool,
    },
    /// List categories with their item and question counts.
    Categories,
    /// Print the question bank of a category.
    Questions {
        #[arg(long, default_value = "country")]
        category: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };

    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    config.engine = config.engine.overlay(|key| std::env::var(key).ok());
    if let Command::Play {
        max_questions: Some(count),
        ..
    } = &cli.command
    {
        config.engine.confidence.max_questions = *count;
    }

    config.validate()?;
    init_logging(&config.logging);
    let service = GameService::from_config(&config)?;

    match cli.command {
        Command::Play {
            category, verbose, ..
        } => play(&service, &category, verbose),
        Command::Categories => {
            list_categories(&service);
            Ok(())
        }
        Command::Questions { category } => list_questions(&service, &category),
    }
}

fn play(service: &GameService, category: &str, verbose: bool) -> Result<()> {
    let started = service.start(category)?;
    let session_id = started.session_id.as_str();
    println!(
        "{} v{}: think of a {} ({} candidates).",
        AppInfo::name(),
        AppInfo::version(),
        started.category,
        started.total_items
    );
    println!("Answer yes, probably, dontknow, probablynot or no. Type 'guess' to stop early.");

    let stdin = io::stdin();
    let mut input = stdin.lock().lines();
    let prediction = loop {
        let question = match service.next_question(session_id)? {
            Step::Guess(prediction) => break prediction,
            Step::Ask(question) => question,
        };
        let number = service.stats(session_id)?.questions_asked + 1;
        print!("Q{number}: {} ", question.text);
        io::stdout().flush()?;

        let Some(line) = input.next().transpose()? else {
            println!();
            break service.final_prediction(session_id)?;
        };
        let line = line.trim();
        if matches!(line.to_ascii_lowercase().as_str(), "guess" | "stop" | "quit") {
            break service.final_prediction(session_id)?;
        }
        match line.parse::<Answer>() {
            Ok(answer) => {
                let outcome = service.submit_answer(session_id, answer)?;
                if verbose {
                    println!(
                        "  {} candidates left, confidence {:.1}% ({})",
                        outcome.active_items, outcome.confidence, outcome.level
                    );
                }
            }
            Err(err) => println!("  {err}; try yes, probably, dontknow, probablynot or no"),
        }
    };

    print_prediction(&prediction);
    if prediction.prediction.is_none() {
        return Ok(());
    }

    print!("Was I right? [y/n] ");
    io::stdout().flush()?;
    let Some(reply) = input.next().transpose()? else {
        println!();
        return Ok(());
    };
    match reply.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => {
            service.report_result(session_id, true, None)?;
            println!("Thanks for playing!");
        }
        "n" | "no" => {
            print!("What were you thinking of? ");
            io::stdout().flush()?;
            let actual = input.next().transpose()?;
            service.report_result(session_id, false, actual)?;
            println!("I will do better next time.");
        }
        _ => {}
    }
    Ok(())
}

fn print_prediction(prediction: &Prediction) {
    match &prediction.prediction {
        Some(item) => {
            let emoji = item.emoji.as_deref().map(|e| format!("{e} ")).unwrap_or_default();
            println!(
                "My guess: {emoji}{} ({:.1}% confidence, {})",
                item.name, prediction.confidence, prediction.level
            );
            if let Some(info) = &item.info {
                println!("  {info}");
            }
        }
        None => println!("I could not come up with a guess."),
    }
    if !prediction.alternatives.is_empty() {
        let names: Vec<&str> = prediction
            .alternatives
            .iter()
            .map(|item| item.name.as_str())
            .collect();
        println!("Other candidates: {}", names.join(", "));
    }
    println!(
        "Asked {} questions; {} of {} candidates remain.",
        prediction.questions_asked, prediction.remaining_items, prediction.total_items
    );
}

fn list_categories(service: &GameService) {
    for category in Category::ALL {
        let catalog = service.catalog();
        match (catalog.items(category), catalog.questions(category)) {
            (Ok(items), Ok(questions)) => println!(
                "{:<8} {:>3} items {:>4} questions",
                category.as_str(),
                items.len(),
                questions.len()
            ),
            (Err(err), _) | (_, Err(err)) => println!("{:<8} unavailable: {err}", category.as_str()),
        }
    }
}

fn list_questions(service: &GameService, category: &str) -> Result<()> {
    let category: Category = category.parse()?;
    for record in service.catalog().questions(category)? {
        let value = record
            .value
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default();
        println!(
            "{:.2}  {:<48} [{} = {}]",
            record.weight,
            record.text.as_deref().unwrap_or("-"),
            record.attribute.as_deref().unwrap_or("-"),
            value
        );
    }
    Ok(())
}
