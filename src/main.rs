use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use formflow_core::config::AppConfig;
use formflow_core::types::{FormDefinition, Integration};
use formflow_engine::{CompletionDispatcher, FlowEngine};
use formflow_gateway::GatewayServer;
use formflow_integrations::{EnvSecretStore, HandlerRegistry};
use formflow_store::SqliteStore;

#[derive(Parser)]
#[command(
    name = "formflow",
    version,
    about = "Branching-form response engine with completion notifications"
)]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "formflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve,
    /// Import a form definition (and its integrations) from a JSON file
    Import {
        /// Path to the definition file
        file: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

/// On-disk import format: a form definition plus optional integrations.
#[derive(Deserialize)]
struct ImportFile {
    #[serde(flatten)]
    definition: FormDefinition,
    #[serde(default)]
    integrations: Vec<Integration>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("formflow=info,warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve => serve(&cli.config).await,
        Commands::Import { file } => import(&cli.config, &file),
        Commands::Config => show_config(&cli.config),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "formflow", &mut std::io::stdout());
            Ok(())
        }
    }
}

async fn serve(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    let store = Arc::new(SqliteStore::open(&config.database.path)?);

    let registry = Arc::new(HandlerRegistry::new(
        config.email.clone(),
        Arc::new(EnvSecretStore),
    ));
    let dispatcher = Arc::new(CompletionDispatcher::new(
        store.clone(),
        registry,
        &config.dispatch,
    ));
    let engine = Arc::new(FlowEngine::new(store.clone(), dispatcher.clone()));

    let server = GatewayServer::new(config.gateway.clone(), engine, dispatcher, store);

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    server.run(shutdown).await
}

fn import(config_path: &Path, file: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    let store = SqliteStore::open(&config.database.path)?;

    let raw = std::fs::read_to_string(file)?;
    let import: ImportFile = serde_json::from_str(&raw)?;

    store.save_form(&import.definition)?;
    for integration in &import.integrations {
        store.save_integration(integration)?;
    }

    info!(
        form = %import.definition.form.id,
        questions = import.definition.questions.len(),
        integrations = import.integrations.len(),
        "Form imported"
    );
    println!(
        "Imported form '{}' ({} questions, {} integrations)",
        import.definition.form.title,
        import.definition.questions.len(),
        import.integrations.len()
    );
    Ok(())
}

fn show_config(config_path: &Path) -> anyhow::Result<()> {
    let config = AppConfig::load(config_path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
