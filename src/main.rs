use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use riskly::api::{build_router, AppState};
use riskly::config::Config;
use riskly::models::RiskTarget;
use riskly::pipeline::explain::permutation_importance;
use riskly::pipeline::loader;
use riskly::pipeline::{train_both, ModelBundle, TrainingOptions};
use riskly::service::InferenceService;
use riskly::state::SledStore;

#[derive(Parser)]
#[command(name = "riskly")]
#[command(about = "Student risk prediction pipeline and serving API", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train both risk models from a student CSV
    Train {
        /// Path to the training CSV
        #[arg(short, long)]
        csv: PathBuf,

        /// Label-rule preset override ("baseline" or "strict")
        #[arg(short, long)]
        preset: Option<String>,

        /// Directory to write model bundles into
        #[arg(short, long)]
        models: Option<PathBuf>,
    },

    /// Serve predictions over HTTP from persisted model bundles
    Serve {
        /// Directory holding model bundles
        #[arg(short, long)]
        models: Option<PathBuf>,

        /// HTTP port override
        #[arg(long)]
        port: Option<u16>,
    },

    /// Rank feature importance for a trained model
    Explain {
        /// Path to a labeled CSV to score against
        #[arg(short, long)]
        csv: PathBuf,

        /// Which target model to explain ("dropout" or "underperform")
        #[arg(short, long, default_value = "dropout")]
        target: RiskTarget,

        /// Directory holding model bundles
        #[arg(short, long)]
        models: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "riskly=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;

    tracing::info!("Starting riskly v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Train {
            csv,
            preset,
            models,
        } => train(&config, &csv, preset, models).await?,
        Commands::Serve { models, port } => serve(&config, models, port).await?,
        Commands::Explain {
            csv,
            target,
            models,
        } => explain(&config, &csv, target, models)?,
    }

    Ok(())
}

async fn train(
    config: &Config,
    csv: &std::path::Path,
    preset: Option<String>,
    models: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut pipeline = config.pipeline.clone();
    if let Some(preset) = preset {
        pipeline.preset = preset;
    }

    let records = loader::load_csv(csv)?;
    let options = TrainingOptions::from_config(&pipeline)?;

    let (dropout, underperform) = train_both(records, options).await?;

    let models_dir = models.unwrap_or_else(|| config.storage.models_path.clone());
    dropout.save(&models_dir)?;
    underperform.save(&models_dir)?;

    for bundle in [&dropout, &underperform] {
        println!(
            "{}: {}",
            bundle.target,
            serde_json::to_string_pretty(&bundle.report)?
        );
    }

    Ok(())
}

async fn serve(
    config: &Config,
    models: Option<PathBuf>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let models_dir = models.unwrap_or_else(|| config.storage.models_path.clone());

    let store = Arc::new(SledStore::new(&config.storage.data_path)?);
    let service = InferenceService::load(&models_dir, store)?;
    let app = build_router(AppState::new(Arc::new(service)));

    let addr = format!(
        "{}:{}",
        config.server.host,
        port.unwrap_or(config.server.http_port)
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("HTTP API server listening on http://{}", addr);
    tracing::info!("   Health check: http://{}/health", addr);
    tracing::info!("   REST API: http://{}/v1/predictions", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn explain(
    config: &Config,
    csv: &std::path::Path,
    target: RiskTarget,
    models: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let models_dir = models.unwrap_or_else(|| config.storage.models_path.clone());

    let bundle = ModelBundle::load(&models_dir, target)?;
    let records = loader::load_csv(csv)?;
    let importances = permutation_importance(&bundle, &records, config.pipeline.seed)?;

    println!("{}", serde_json::to_string_pretty(&importances)?);
    Ok(())
}
