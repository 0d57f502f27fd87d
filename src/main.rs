// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::{Map, Value};

use weft_rs::error::FlowError;
use weft_rs::flow::{load_and_validate, Runtime};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a workflow file
    Run {
        /// Path to the workflow file (YAML or JSON)
        #[arg(short, long)]
        file: String,

        /// Workflow input as key=value; repeatable
        #[arg(short, long = "input")]
        inputs: Vec<String>,

        /// Workflow inputs as a single JSON object
        #[arg(long)]
        inputs_json: Option<String>,

        /// Enable debug logging
        #[arg(short, long)]
        verbose: bool,
    },
    /// Validate a workflow file without executing it
    Validate {
        /// Path to the workflow file (YAML or JSON)
        #[arg(short, long)]
        file: String,
    },
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

/// Merge `--inputs-json` and repeated `--input k=v` pairs; explicit pairs
/// win on collision.
fn parse_inputs(pairs: &[String], json: Option<&str>) -> anyhow::Result<Map<String, Value>> {
    let mut inputs = match json {
        Some(raw) => match serde_json::from_str(raw)? {
            Value::Object(entries) => entries,
            other => anyhow::bail!("--inputs-json must be a JSON object, got {}", other),
        },
        None => Map::new(),
    };

    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("--input must be key=value, got '{}'", pair))?;
        // Values parse as JSON when they can, else stay strings, so
        // `--input count=3` is an integer and `--input topic=AI` a string.
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        inputs.insert(key.to_string(), value);
    }

    Ok(inputs)
}

fn exit_with(err: FlowError) -> ! {
    eprintln!("error: {}", err);
    std::process::exit(err.exit_code());
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let args = Args::parse();

    match args.command {
        Commands::Run {
            file,
            inputs,
            inputs_json,
            verbose,
        } => {
            init_logging(verbose);
            let inputs = parse_inputs(&inputs, inputs_json.as_deref())?;

            let runtime = Runtime::new();
            match runtime.run_file(&file, &inputs).await {
                Ok(outcome) => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&outcome.final_state.to_value())?
                    );
                    log::info!("run {} completed", outcome.run_id);
                }
                Err(err) => exit_with(err),
            }
        }
        Commands::Validate { file } => {
            init_logging(false);
            match load_and_validate(&file) {
                Ok(definition) => {
                    println!(
                        "{}: valid ({} nodes, {} edges)",
                        file,
                        definition.nodes.len(),
                        definition.edges.len()
                    );
                }
                Err(err) => exit_with(err),
            }
        }
    }

    Ok(())
}
