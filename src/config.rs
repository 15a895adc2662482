use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Training/inference pipeline configuration
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: RISKLY_)
            .add_source(
                config::Environment::with_prefix("RISKLY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path for the embedded prediction store
    #[serde(default = "default_data_path")]
    pub data_path: PathBuf,

    /// Directory holding persisted model bundles
    #[serde(default = "default_models_path")]
    pub models_path: PathBuf,
}

/// Knobs for the label rules, transformer, balancer and trainer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Named label-rule preset ("baseline" or "strict")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Fraction of rows held out for evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    /// Seed for splitting, oversampling and bootstrap sampling
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of trees in the ensemble
    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    /// Maximum tree depth
    #[serde(default = "default_max_depth")]
    pub max_depth: u16,

    /// Number of stratified cross-validation folds
    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,

    /// Carry ExtracurricularActivities as an unscaled feature column
    #[serde(default = "default_include_extracurricular")]
    pub include_extracurricular: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            test_fraction: default_test_fraction(),
            seed: default_seed(),
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            cv_folds: default_cv_folds(),
            include_extracurricular: default_include_extracurricular(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_data_path() -> PathBuf {
    "./data/predictions".into()
}

fn default_models_path() -> PathBuf {
    "./data/models".into()
}

fn default_preset() -> String {
    "strict".to_string()
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_n_trees() -> usize {
    100
}

fn default_max_depth() -> u16 {
    10
}

fn default_cv_folds() -> usize {
    5
}

fn default_include_extracurricular() -> bool {
    true
}
