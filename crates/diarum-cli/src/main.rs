//! Diarum CLI - write and read your daily diary from the terminal
//!
//! Edits go through the same write-back cache and background sync the
//! editors use, then are flushed before the process exits.

mod auth;
mod cli;
mod cli_config;
mod commands {
    pub mod auth_cmd;
    pub mod common;
    pub mod config;
    pub mod diary;
    pub mod image;
}
mod error;

use clap::Parser;
use tracing_subscriber::filter::Directive;

use crate::cli::{Cli, Commands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::config::run_config;
use crate::commands::diary::{run_show, run_write};
use crate::commands::image::run_image;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "diarum=info".parse::<Directive>() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Show { date } => run_show(date.as_deref()).await,
        Commands::Write { date, text } => run_write(date.as_deref(), &text).await,
        Commands::Config { command } => run_config(command),
        Commands::Auth { command } => run_auth(command).await,
        Commands::Image { command } => run_image(command).await,
    }
}
