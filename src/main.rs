// ABOUTME: Entry point for the apiwright binary.
// ABOUTME: Parses CLI arguments, initializes tracing, and runs the server, a single turn, or a validation pass.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use apiwright_agent::{ListOptions, ModelTransport, Role, Session, TurnOutcome, create_transport};
use apiwright_core::validation::render_diagnostics;
use apiwright_server::{ApiwrightConfig, AppState, create_router};
use apiwright_store::Storage;

const DEFAULT_FILTER: &str = "apiwright=debug,tower_http=debug";

/// Conversational OpenAPI authoring.
#[derive(Debug, Parser)]
#[command(name = "apiwright", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server.
    Serve {
        /// Address to listen on (overrides APIWRIGHT_BIND).
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Send one message, run the turn to completion, and print the reply.
    Send {
        message: String,
        /// Continue an existing conversation instead of starting a new one.
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Print diagnostics for the stored document.
    Validate {
        /// Conversation whose document to check (only matters for the sqlite backend).
        #[arg(long, default_value = "default")]
        conversation: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ApiwrightConfig::from_env()?;

    match cli.command {
        Command::Serve { bind } => {
            let config = match bind {
                Some(bind) => config.with_bind(bind)?,
                None => config,
            };
            serve(config).await
        }
        Command::Send {
            message,
            conversation,
        } => send(config, &message, conversation).await,
        Command::Validate { conversation } => validate(config, &conversation).await,
    }
}

async fn serve(config: ApiwrightConfig) -> anyhow::Result<()> {
    let transport = create_transport(&config.model)?;
    let state = AppState::from_config(&config, transport)?;
    let app = create_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("could not bind {}", config.bind))?;
    tracing::info!(
        bind = %config.bind,
        storage = %config.storage.kind,
        auth = config.auth_token.is_some(),
        "apiwright listening"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("apiwright stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "could not listen for ctrl-c");
    }
}

async fn send(
    config: ApiwrightConfig,
    message: &str,
    conversation: Option<String>,
) -> anyhow::Result<()> {
    let transport = create_transport(&config.model)?;
    let conversation_id = match conversation {
        Some(id) => id,
        None => {
            let id = transport.create_conversation().await?;
            eprintln!("conversation: {id}");
            id
        }
    };

    let storage = Storage::open(&config.storage)?;
    let session = Session::open(
        &conversation_id,
        storage.gateway(&conversation_id),
        config.validation_gate(),
        transport.clone(),
        &config.model.model,
    )
    .await?;

    session.orchestrator.add_message(message).await?;
    let outcome = session.orchestrator.run_blocking().await?;

    for reply in latest_replies(transport.as_ref(), &conversation_id).await? {
        println!("{reply}");
    }

    match outcome {
        TurnOutcome::Completed { corrections, .. } => {
            if corrections > 0 {
                eprintln!("saved after {corrections} correction(s)");
            }
            Ok(())
        }
        TurnOutcome::Unsaved { reason, .. } => bail!("document not saved: {reason}"),
        TurnOutcome::Failed { reason, .. } => bail!("turn failed: {reason}"),
    }
}

/// Assistant messages posted since the last user message, oldest first.
async fn latest_replies(
    transport: &dyn ModelTransport,
    conversation_id: &str,
) -> anyhow::Result<Vec<String>> {
    let recent = transport
        .list_messages(conversation_id, ListOptions::latest(20))
        .await?;
    let mut replies: Vec<String> = recent
        .into_iter()
        .take_while(|m| m.role == Role::Assistant)
        .map(|m| m.content)
        .collect();
    replies.reverse();
    Ok(replies)
}

async fn validate(config: ApiwrightConfig, conversation_id: &str) -> anyhow::Result<()> {
    let storage = Storage::open(&config.storage)?;
    let gateway = storage.gateway(conversation_id);
    let document = gateway.read().await?;

    let gate = config.validation_gate();
    let diagnostics = gate.validate(&document).await?;
    println!("{}", gateway.describe());
    print!("{}", render_diagnostics(&diagnostics));

    let blocking = gate.blocking(&diagnostics).len();
    if blocking > 0 {
        bail!("{blocking} blocking finding(s) from {}", gate.producer_name());
    }
    Ok(())
}
