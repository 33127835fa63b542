use serde::{Deserialize, Serialize};

/// Main configuration structure for the advisor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Decision engine thresholds
    #[serde(default)]
    pub engine: EngineConfig,

    /// Component rule registry source
    #[serde(default)]
    pub components: ComponentsConfig,

    /// Prompt overlay source
    #[serde(default)]
    pub overlays: OverlaysConfig,

    /// Turn commit retry policy
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".advisor/advisor.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; console only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Decision engine thresholds and windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct EngineConfig {
    /// Consecutive rejections before the hypothesis is pivoted
    pub rejection_threshold: u32,

    /// Consecutive tactical questions before redirecting
    pub tactical_drift_threshold: u32,

    /// Consecutive low-effort replies before pushing back
    pub low_effort_threshold: u32,

    /// Number of recent actions checked by the variety filter
    pub variety_window: usize,

    pub min_diagnostic_turns: u32,
    pub min_depth_turns: u32,

    /// Clarity required to present a hypothesis
    pub hypothesis_clarity_threshold: f64,

    /// Clarity required to enter closing
    pub closing_clarity_threshold: f64,

    /// Capacity at or below which closing uses the self-directed track
    pub low_capacity_threshold: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rejection_threshold: 2,
            tactical_drift_threshold: 2,
            low_effort_threshold: 2,
            variety_window: 3,
            min_diagnostic_turns: 2,
            min_depth_turns: 2,
            hypothesis_clarity_threshold: 0.45,
            closing_clarity_threshold: 0.60,
            low_capacity_threshold: 0.30,
        }
    }
}

/// Component rule registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ComponentsConfig {
    /// YAML file with rules and policies; built-ins when unset
    #[serde(default)]
    pub rules_path: Option<String>,
}

/// Overlay registry configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OverlaysConfig {
    /// YAML file overriding built-in overlays
    #[serde(default)]
    pub path: Option<String>,
}

/// Optimistic commit retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CoordinatorConfig {
    /// Maximum number of re-reads after a version conflict
    #[serde(default = "default_max_commit_retries")]
    pub max_commit_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_commit_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    50
}

const fn default_max_backoff_ms() -> u64 {
    1000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            max_commit_retries: default_max_commit_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}
