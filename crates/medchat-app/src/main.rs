//! Medchat terminal client - composition root.
//!
//! 1. Resolve configuration (CLI > env > TOML file > defaults)
//! 2. Open the transcript database
//! 3. Build the HTTP client and the session controller
//! 4. Run the interactive line loop on stdin

mod cli;
mod commands;
mod render;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;

use medchat_chat::{SessionController, SessionEvent, TurnOutcome};
use medchat_client::ApiClient;
use medchat_core::config::MedchatConfig;
use medchat_core::error::MedchatError;
use medchat_storage::{Database, SqliteTranscriptStore};

use cli::CliArgs;
use commands::{Command, HELP};
use render::Renderer;

/// Expand ~ to home directory in a path string.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

/// Create the data directory and open the transcript slot inside it.
fn open_store(data_dir: &Path, slot: &str) -> medchat_core::Result<SqliteTranscriptStore> {
    if let Err(e) = std::fs::create_dir_all(data_dir) {
        tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
        return Err(MedchatError::Io(e));
    }
    let db_path = data_dir.join("medchat.db");
    let db = Arc::new(Database::new(&db_path)?);
    tracing::info!(path = %db_path.display(), "SQLite database opened");
    Ok(SqliteTranscriptStore::new(db, slot))
}

fn init_tracing(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn prompt() {
    print!("> ");
    let _ = std::io::stdout().flush();
}

/// Send one message and render the reply until the turn ends.
async fn run_turn(
    controller: &SessionController,
    events: &mut UnboundedReceiver<SessionEvent>,
    renderer: &mut Renderer<std::io::Stdout>,
    message: &str,
) {
    let handle = match controller.send_turn(message) {
        Ok(handle) => handle,
        Err(e) => {
            println!("{}", e);
            return;
        }
    };

    let wait = handle.wait();
    tokio::pin!(wait);
    let mut cancel_requested = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut wait => break outcome,
            Some(event) = events.recv() => {
                if let Err(e) = renderer.handle(&event) {
                    tracing::warn!(error = %e, "Failed to write to stdout");
                }
            }
            result = tokio::signal::ctrl_c(), if !cancel_requested => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Failed to listen for Ctrl-C");
                }
                cancel_requested = true;
                controller.cancel();
            }
        }
    };

    // Events produced before the turn resolved.
    while let Ok(event) = events.try_recv() {
        if let Err(e) = renderer.handle(&event) {
            tracing::warn!(error = %e, "Failed to write to stdout");
        }
    }
    if outcome == TurnOutcome::Cancelled {
        tracing::info!("Reply cancelled by user");
    }
}

/// Run a slash command. Returns false when the loop should exit.
async fn run_command(
    command: Command,
    controller: &SessionController,
    client: &ApiClient,
    events: &mut UnboundedReceiver<SessionEvent>,
) -> bool {
    match command {
        Command::Quit => return false,
        Command::Help => println!("{}", HELP),
        Command::Clear => match controller.clear_history() {
            Ok(()) => println!("Conversation cleared."),
            Err(e) => println!("{}", e),
        },
        Command::History => {
            let transcript = controller.transcript();
            if transcript.is_empty() {
                println!("(no messages)");
            }
            for turn in transcript {
                let local = turn.timestamp.with_timezone(&chrono::Local);
                println!("[{}] {}: {}", local.format("%H:%M"), turn.role, turn.content);
            }
        }
        Command::Health => match client.health().await {
            Ok(health) => {
                let verdict = if health.is_healthy() { "healthy" } else { "unhealthy" };
                println!(
                    "{} (status: {}, model: {}, index: {})",
                    verdict,
                    health.status,
                    if health.ollama_connected { "connected" } else { "disconnected" },
                    if health.chroma_initialized { "ready" } else { "not ready" },
                );
            }
            Err(e) => println!("Health check failed: {}", e),
        },
        Command::Stats => match client.document_stats().await {
            Ok(stats) => println!(
                "{} documents, {} chunks in {}",
                stats.total_documents, stats.total_chunks, stats.collection_name
            ),
            Err(e) => println!("Could not fetch stats: {}", e),
        },
        Command::Upload(path) => upload(client, &path).await,
        Command::Reindex => match client.reindex().await {
            Ok(reply) => println!("{}", reply),
            Err(e) => println!("Reindex failed: {}", e),
        },
    }

    // Commands like /clear notify subscribers; nothing to render for them.
    while events.try_recv().is_ok() {}
    true
}

async fn upload(client: &ApiClient, path: &Path) {
    let result = client
        .upload_document(path, |progress| {
            print!("\rUploading... {}%", progress.percent());
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();
    match result {
        Ok(uploaded) => println!(
            "{}: {} ({} chunks)",
            uploaded.filename, uploaded.message, uploaded.chunks_created
        ),
        Err(e) => println!("Upload failed: {}", e),
    }
}

#[tokio::main]
async fn main() -> medchat_core::Result<()> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match MedchatConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (MedchatConfig::default(), Some(e)),
    };
    args.apply(&mut config);

    // Tracing. Logs go to stderr so they stay out of the streamed reply.
    init_tracing(&config.general.log_level);
    tracing::info!("Starting medchat v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) if config_file.exists() => {
            tracing::warn!(path = %config_file.display(), error = %e, "Invalid config, using defaults")
        }
        Some(_) => tracing::debug!(path = %config_file.display(), "No config file, using defaults"),
    }

    // Storage.
    let data_dir = resolve_data_dir(&config.general.data_dir);
    let store = Arc::new(open_store(&data_dir, &config.chat.transcript_slot)?);

    // Client and session.
    let client = Arc::new(ApiClient::new(&config.server)?);
    tracing::info!(url = %client.base_url(), use_rag = config.chat.use_rag, "Chat service configured");
    let controller = SessionController::new(client.clone(), store, config.chat.clone());
    let mut events = controller.subscribe();
    let mut renderer = Renderer::new(std::io::stdout());

    let restored = controller.transcript().len();
    if restored > 0 {
        println!("Restored {} messages. /history to show, /help for commands.", restored);
    } else {
        println!("Ask a question, or /help for commands.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        match Command::parse(message) {
            Some(Ok(command)) => {
                if !run_command(command, &controller, &client, &mut events).await {
                    break;
                }
            }
            Some(Err(e)) => println!("{}", e),
            None => run_turn(&controller, &mut events, &mut renderer, message).await,
        }
    }

    println!();
    tracing::info!("medchat shutting down");
    Ok(())
}
