//! CLI command implementations.

pub mod init;
pub mod rules;
pub mod session;

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::sqlite::{database_url, initialize_database, PoolConfig};
use crate::adapters::{OverlayEchoGenerator, SqliteConversationRepository};
use crate::application::TurnCoordinator;
use crate::domain::models::Config;
use crate::domain::ports::MessageAnalyzer;
use crate::infrastructure::config::{load_component_registry, load_overlay_registry};
use crate::services::DecisionEngine;

/// Open the configured database, running pending migrations.
pub async fn open_repository(config: &Config) -> Result<Arc<SqliteConversationRepository>> {
    let url = database_url(&config.database.path);
    let pool = initialize_database(&url, Some(PoolConfig::from(&config.database)))
        .await
        .with_context(|| {
            format!(
                "Failed to open database at {}. Run 'advisor init' first.",
                config.database.path
            )
        })?;
    Ok(Arc::new(SqliteConversationRepository::new(pool)))
}

/// Coordinator wired from configuration, generating with the dry-run echo.
pub fn build_coordinator(
    config: &Config,
    repository: Arc<SqliteConversationRepository>,
    analyzer: Arc<dyn MessageAnalyzer>,
) -> Result<TurnCoordinator<SqliteConversationRepository>> {
    let registry = load_component_registry(&config.components)?;
    let overlays = load_overlay_registry(&config.overlays)?;

    Ok(
        TurnCoordinator::new(repository, analyzer, Arc::new(OverlayEchoGenerator))
            .with_decision_engine(DecisionEngine::new(config.engine.clone()))
            .with_component_registry(Arc::new(registry))
            .with_overlays(Arc::new(overlays))
            .with_config(config.coordinator.clone()),
    )
}
