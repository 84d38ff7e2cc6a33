//! FastSpot CLI - Database migrations and catalog seeding.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! fastspot-cli migrate
//!
//! # Load the demo catalog, replacing whatever is there
//! fastspot-cli seed seed/catalog.yaml --clear
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "fastspot-cli")]
#[command(author, version, about = "FastSpot CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load categories, products and quiz questions from a YAML file
    Seed {
        /// Path to the catalog file
        file: String,

        /// Delete the existing catalog first
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { file, clear } => commands::seed::catalog(&file, clear).await?,
    }
    Ok(())
}
