//! Implementation of the `advisor init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig};
use crate::cli::output::{action_success, output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::loader::CONFIG_DIR;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing config.yaml with the defaults
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub config_path: PathBuf,
    pub config_written: bool,
    pub database_path: String,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![action_success(&self.message)];
        if self.config_written {
            lines.push(format!("Wrote default configuration to {}", self.config_path.display()));
        } else {
            lines.push(format!("Kept existing configuration at {}", self.config_path.display()));
        }
        lines.push(format!("Database ready at {}", self.database_path));
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, config: &Config, json_mode: bool) -> Result<()> {
    let config_dir = PathBuf::from(CONFIG_DIR);
    fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create {}", config_dir.display()))?;

    let config_path = config_dir.join("config.yaml");
    let config_written = args.force || !config_path.exists();
    if config_written {
        let yaml = serde_yaml::to_string(&Config::default())
            .context("Failed to serialize default configuration")?;
        fs::write(&config_path, yaml)
            .await
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
    }

    let url = database_url(&config.database.path);
    initialize_database(&url, Some(PoolConfig::from(&config.database)))
        .await
        .context("Failed to initialize database")?;

    output(
        &InitOutput {
            success: true,
            message: "Project initialized.".to_string(),
            config_path,
            config_written,
            database_path: config.database.path.clone(),
        },
        json_mode,
    );
    Ok(())
}
