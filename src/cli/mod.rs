//! Command-line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use commands::init::InitArgs;
use commands::rules::RulesArgs;
use commands::session::SessionArgs;

#[derive(Parser, Debug)]
#[command(name = "advisor")]
#[command(about = "Constraint advisor - diagnostic dialogue engine", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the project configuration and database
    Init(InitArgs),

    /// Start sessions and process turns
    Session(SessionArgs),

    /// Inspect the component rule registry
    Rules(RulesArgs),
}

/// Print `err` in the requested format and exit with status 1.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({ "success": false, "error": format!("{err:#}") });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );
    } else {
        eprintln!("{}", output::action_failure(&format!("{err:#}")));
    }
    std::process::exit(1);
}
