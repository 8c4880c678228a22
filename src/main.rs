use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing::{error, info};
use vani::{create_router, AppState, Config, RecordingSession};

#[derive(Parser)]
#[command(name = "vani", version, about = "Microphone capture with live transcription")]
struct Cli {
    /// Path to the configuration file, without extension
    #[arg(short, long, default_value = "config/vani")]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control service
    Serve,
    /// Record until Ctrl-C, then print the transcript
    Record,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    info!("{} v{}", config.service.name, env!("CARGO_PKG_VERSION"));

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Record => record(config).await,
    }
}

/// Run the HTTP control service until Ctrl-C
async fn serve(config: Config) -> Result<()> {
    let controller = Arc::new(RecordingSession::new(config.session_config()?));
    let router = create_router(AppState::new(Arc::clone(&controller)));

    let addr = format!("{}:{}", config.service.http.bind, config.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    // Settle any live session before exiting
    let status = controller.stop().await;
    info!("Shut down in state {}", status.state);

    Ok(())
}

/// Drive one session from the terminal
async fn record(config: Config) -> Result<()> {
    let controller = RecordingSession::new(config.session_config()?);

    let session_id = controller.start().await?;
    info!("Recording session {}; press Ctrl-C to stop", session_id);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    let status = controller.stop().await;
    info!(
        "Session ended in state {} after {} chunks",
        status.state, status.chunks_sent
    );

    let transcript = controller.transcript().await;
    if transcript.is_empty() {
        info!("No transcript received");
    } else {
        println!("{}", transcript);
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
