//! Dialogos CLI - Command-line tools for the conversation scope

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialogos_core::prelude::*;
use serde_json::{Value, json};

#[derive(Parser)]
#[command(name = "dialogos")]
#[command(about = "Dialogos conversation scope CLI", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file to use instead of dialogos.toml and DIALOGOS_* variables
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the effective configuration as JSON
    Config,
    /// Run a scripted conversation against the in-memory backend
    Simulate {
        /// Number of requests restoring the conversation
        #[arg(short, long, default_value_t = 3)]
        requests: usize,

        /// Override the concurrent access timeout, in milliseconds
        #[arg(long, env = "DIALOGOS_SIMULATE_TIMEOUT_MS")]
        timeout_ms: Option<u64>,
    },
    /// Version information
    Version,
}

type MemoryContext = ConversationContext<InMemoryStorage>;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Version => {
            println!("dialogos {}", env!("CARGO_PKG_VERSION"));
            println!("dialogos-core {}", dialogos_core::VERSION);
        }
        Commands::Config => {
            let config = load_config(cli.config.as_ref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Simulate {
            requests,
            timeout_ms,
        } => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(ms) = timeout_ms {
                config.concurrent_access_timeout = Duration::from_millis(ms);
                config.validate()?;
            }
            let report = simulate(config, requests).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<ConversationConfig> {
    let config = match path {
        Some(path) => ConversationConfig::from_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ConversationConfig::load()?,
    };
    Ok(config)
}

/// Begin a conversation, restore it `requests` times, ask for an unknown one and
/// finally tear the session down.
async fn simulate(config: ConversationConfig, requests: usize) -> Result<Value> {
    let storage = Arc::new(InMemoryStorage::new());
    let context = ConversationContext::new(Arc::clone(&storage), config)
        .with_observer(Arc::new(LoggingObserver));
    let visits = ConversationScopedBean::new(
        "visits",
        FnInstantiator::new(|| Ok(AtomicUsize::new(0))),
    );
    let mut steps = Vec::new();

    let first = storage.request();
    let mut scope = ExecutionScope::new();
    context.associate(&mut scope, first.clone())?;
    let outcome = context.activate(&mut scope, None).await?;
    let count = context
        .get_or_create(&mut scope, &visits)?
        .fetch_add(1, Ordering::SeqCst)
        + 1;
    let cid = context.begin_conversation(&scope, None)?;
    steps.push(step_report("begin", &outcome, count, &context, &scope)?);
    context.deactivate(&mut scope).await?;
    context.dissociate(&mut scope, &first)?;

    let session_id = first
        .session_id()
        .context("Beginning a conversation did not create a session")?;

    for _ in 0..requests {
        steps.push(visit(&context, &storage, &session_id, &cid, &visits, "restore").await?);
    }
    steps.push(visit(&context, &storage, &session_id, "unknown", &visits, "unknown_cid").await?);

    let session = storage
        .remove_session(&session_id)
        .context("Session disappeared during the simulation")?;
    let mut teardown = ExecutionScope::new();
    context.destroy(&mut teardown, &session).await?;
    tracing::info!(session_id = %session_id, "Simulation finished");

    Ok(json!({
        "conversation": cid,
        "session": session_id,
        "config": context.config(),
        "steps": steps,
    }))
}

/// One request of the session carrying `cid` as its conversation parameter
async fn visit(
    context: &MemoryContext,
    storage: &InMemoryStorage,
    session_id: &str,
    cid: &str,
    visits: &ConversationScopedBean<AtomicUsize>,
    step: &str,
) -> Result<Value> {
    let request = storage
        .request_for_session(session_id)
        .with_parameter(context.parameter_name(), cid);
    let mut scope = ExecutionScope::new();
    context.associate(&mut scope, request.clone())?;
    context.invalidate(&scope)?;

    let requested = context.requested_conversation_id(&request);
    let outcome = context.activate(&mut scope, requested.as_deref()).await?;
    if let Some(err) = outcome.error() {
        tracing::warn!(error = %err, "Continuing in a transient conversation");
    }
    let count = context
        .get_or_create(&mut scope, visits)?
        .fetch_add(1, Ordering::SeqCst)
        + 1;
    let report = step_report(step, &outcome, count, context, &scope)?;

    context.deactivate(&mut scope).await?;
    context.dissociate(&mut scope, &request)?;
    Ok(report)
}

fn step_report(
    step: &str,
    outcome: &ActivationOutcome,
    visits: usize,
    context: &MemoryContext,
    scope: &ExecutionScope<MemoryRequest>,
) -> Result<Value> {
    let conversation = context.current_conversation(scope)?;
    Ok(json!({
        "step": step,
        "activation": outcome,
        "error": outcome.error().map(|e| e.to_string()),
        "visits": visits,
        "conversation": conversation.snapshot(),
    }))
}
