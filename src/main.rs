//! docflow - document workflow CLI
//!
//! Loads a workflow declaration table and drives it over JSON documents.

mod commands;
mod config;

use clap::{Parser, Subcommand};
use colored::Colorize;
use config::Config;
use docflow_core::DocflowError;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "docflow")]
#[command(about = "Inspect and drive document workflows from declaration tables")]
#[command(version)]
struct Cli {
    /// YAML config file
    #[arg(short, long, env = "DOCFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Workflow declaration table (JSON or YAML), overrides the config file
    #[arg(short, long)]
    definition: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// List states and groups
    States,

    /// Print the declaration table with its checksum
    Describe,

    /// List transitions available to a document
    Transitions {
        /// Document JSON (or @file.json to read from file)
        document: String,

        /// Permission token held by the caller (repeatable)
        #[arg(short, long)]
        grant: Vec<String>,
    },

    /// Apply a transition to a document
    Apply {
        /// Document JSON (or @file.json to read from file)
        document: String,

        /// Transition name
        transition: String,

        /// Handler arguments JSON
        #[arg(short, long)]
        args: Option<String>,

        /// Permission token held by the caller (repeatable)
        #[arg(short, long)]
        grant: Vec<String>,

        /// Write the updated document to this file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Group documents by state
    Sort {
        /// JSON array of documents (or @file.json to read from file)
        documents: String,
    },
}

fn main() {
    let cli = Cli::parse();

    // Load configuration (file, then env overrides, then flags)
    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            std::process::exit(1);
        }
    };
    if let Some(path) = &cli.definition {
        config.definition = Some(path.clone());
    }

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level)),
        )
        .with_writer(std::io::stderr)
        .init();
    colored::control::set_override(config.output.color);

    if let Err(e) = run(&config, cli.command) {
        match e.downcast_ref::<DocflowError>() {
            Some(err) => eprintln!("{} [{}]: {}", "Error".red(), err.error_code(), err),
            None => eprintln!("{}: {}", "Error".red(), e),
        }
        std::process::exit(1);
    }
}

fn run(config: &Config, command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    let path = config.definition_path()?;
    let definition = commands::load_definition(path)?;
    println!("{}", commands::execute(&definition, command)?);
    Ok(())
}
