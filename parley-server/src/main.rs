//! Parley server binary

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use parley_core::config::ParleyConfig;
use parley_core::conversation::{ContextBuilder, ConversationHistory};
use parley_core::llm::LLMProviderFactory;
use parley_server::{AppState, router, telemetry};

mod cli;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; variables may come from the environment.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config_path = cli.config.clone();

    match cli.into_command() {
        Commands::Serve { host, port } => serve(config_path, host, port).await,
        Commands::Prompt { message, history } => print_prompt(config_path, &message, history),
        Commands::Version => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
            println!("parley-core {}", parley_core::VERSION);
            Ok(())
        }
    }
}

async fn serve(
    config_path: Option<PathBuf>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = ParleyConfig::load_from(config_path.as_deref())?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let _guard = telemetry::init(&config.logging, config.server.debug)?;

    if config.uses_insecure_secret() {
        tracing::warn!(
            "using the built-in session secret; set FLASK_SECRET_KEY or PARLEY_SESSION__SECRET_KEY"
        );
    }

    let provider = LLMProviderFactory::create(&config.llm)?;
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let model = config.model().to_string();

    let state = Arc::new(AppState::new(config, provider));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, %model, "parley listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("parley stopped");
    Ok(())
}

fn print_prompt(
    config_path: Option<PathBuf>,
    message: &str,
    history: Option<PathBuf>,
) -> Result<()> {
    let config = ParleyConfig::extract_from(config_path.as_deref())?;
    telemetry::init_console(config.server.debug)?;

    let history = match history {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            ConversationHistory::from_json(&json)
                .with_context(|| format!("invalid history in {}", path.display()))?
        }
        None => ConversationHistory::new(),
    };

    let builder = ContextBuilder::new()
        .with_window(config.prompt.max_turns)
        .with_system_instruction(config.prompt.system_instruction);
    let (_, prompt) = builder.build(history.turns(), message)?;

    println!("{prompt}");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
