use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use enfesto_core::{
    ingest, ItemInput, OptimizationResult, Optimizer, RawRecord, TrainedModel, Trainer, MAX_ROWS,
};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "enfesto")]
#[command(about = "Stack-height optimizer - round cut quantities to uniform fabric lays", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize cut quantities
    Optimize {
        /// Input file with the order lines (YAML or JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Maximum deviation per line, in percent
        #[arg(short, long, default_value_t = 5.0)]
        tolerance: f64,

        /// Trained model (JSON); rules only when omitted
        #[arg(short, long)]
        model: Option<PathBuf>,

        /// Output file for result (JSON)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Train a model from historical optimizations
    Train {
        /// Historical rows (YAML or JSON), one object per row
        #[arg(short, long)]
        input: PathBuf,

        /// Output file for the model (JSON)
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Optimize {
            input,
            tolerance,
            model,
            output,
        } => {
            optimize_command(input, tolerance, model, output)?;
        }
        Commands::Train { input, output } => {
            train_command(input, output)?;
        }
    }

    Ok(())
}

/// Reads JSON, or YAML when the extension says so.
fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let is_yaml = matches!(
        path.extension().and_then(|s| s.to_str()),
        Some("yaml") | Some("yml")
    );
    debug!(path = %path.display(), yaml = is_yaml, "Parsing input file");
    let value = if is_yaml {
        serde_yaml::from_str(&content)?
    } else {
        serde_json::from_str(&content)?
    };
    Ok(value)
}

fn optimize_command(
    input: PathBuf,
    tolerance: f64,
    model: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    println!("{}", "🔍 Loading input...".bright_blue());

    let inputs: Vec<ItemInput> = load(&input)?;
    let items = ingest(inputs, MAX_ROWS)?;
    let model: Option<TrainedModel> = model.as_deref().map(load::<TrainedModel>).transpose()?;

    println!(
        "  {} lines to cut",
        items.len().to_string().bright_white().bold()
    );
    match &model {
        Some(model) => println!(
            "  Model {} ({} heights)",
            model.version.bright_white(),
            model.global_stack_heights.len()
        ),
        None => println!("  No model, using rules only"),
    }
    println!();

    println!("{}", "🚀 Running optimization...".bright_blue());

    let result = Optimizer::new(items, tolerance)?
        .with_optional_model(model)
        .optimize();

    println!();
    println!("{}", "✅ Optimization complete!".bright_green().bold());
    println!();

    print_summary(&result);

    if let Some(output_path) = output {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(&output_path, json)?;
        println!(
            "💾 Saved result to {}",
            output_path.display().to_string().bright_white()
        );
    } else {
        let json = serde_json::to_string_pretty(&result)?;
        println!("{}", json);
    }

    Ok(())
}

fn print_summary(result: &OptimizationResult) {
    let summary = &result.summary;

    println!("{}", "📊 Results:".bright_yellow().bold());
    println!("  Stack heights:");
    for (group, decision) in &summary.stack_heights {
        println!(
            "    • {}: {} layers ({})",
            group.bright_white(),
            decision.best_stack_height,
            decision.method.to_string().bright_cyan()
        );
    }
    println!();
    println!(
        "  Increased: {}  Decreased: {}  Unchanged: {}",
        summary.increases.to_string().bright_white(),
        summary.decreases.to_string().bright_white(),
        summary.unchanged.to_string().bright_white()
    );
    println!();
}

fn train_command(input: PathBuf, output: PathBuf) -> Result<()> {
    println!("{}", "🔍 Loading history...".bright_blue());

    let records: Vec<RawRecord> = load(&input)?;
    println!(
        "  {} historical rows",
        records.len().to_string().bright_white().bold()
    );

    println!("{}", "🧠 Training model...".bright_blue());

    let model = Trainer::default().train(&records)?;

    println!();
    println!(
        "{} Learned from {} valid rows",
        "✅".bright_green(),
        model.sample_size.to_string().bright_white()
    );
    let heights: Vec<String> = model
        .global_stack_heights
        .iter()
        .map(|h| h.to_string())
        .collect();
    println!("  Preferred stack heights: {}", heights.join(", ").bright_cyan());
    if model.used_default {
        println!(
            "  {}",
            "No height matched the history, using the default".yellow()
        );
    }

    let json = serde_json::to_string_pretty(&model)?;
    std::fs::write(&output, json)?;
    println!(
        "💾 Saved model to {}",
        output.display().to_string().bright_white()
    );

    Ok(())
}
