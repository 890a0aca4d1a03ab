//! Switchyard command-line entry point.
//!
//! Usage:
//!   switchyard run --config switchyard.toml "Who owns example.com and what is its QPS?"
//!   switchyard serve --config switchyard.toml --port 8080
//!
//! # Environment Variables
//!
//! - `SWITCHYARD_LLM_MODEL`, `SWITCHYARD_LLM_BASE_URL`, `SWITCHYARD_LLM_API_KEY` - decision source overrides
//! - `SWITCHYARD_BIND_ADDR` - Server bind address (default: 127.0.0.1)
//! - `SWITCHYARD_CORS_ORIGINS` - CORS allowed origins (comma-separated)

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use switchyard_api::{AppState, load_config, serve};
use switchyard_router::events::{self, LoopEvent};
use switchyard_router::{LoopController, TaskState};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "switchyard",
    version,
    about = "Routes requests between specialists until they are answered"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one request to completion and print each step.
    Run {
        /// Path to the TOML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Thread id to record the task under.
        #[arg(long)]
        thread_id: Option<String>,
        /// The user request.
        request: String,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
        /// Bind address (default: 127.0.0.1, env: SWITCHYARD_BIND_ADDR)
        #[arg(short, long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,switchyard_router=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            config,
            thread_id,
            request,
        } => run_once(config, thread_id, request).await,
        Command::Serve { config, port, bind } => run_server(config, port, bind).await,
    }
}

async fn run_once(
    config: Option<PathBuf>,
    thread_id: Option<String>,
    request: String,
) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    let controller = LoopController::from_config(&config).context("building the router")?;

    let thread_id = thread_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut state = TaskState::new(thread_id, request);

    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let (tx, mut rx) = events::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{}", describe(&event));
        }
    });

    let outcome = controller.run_observed(&mut state, &cancel, Some(&tx)).await;
    drop(tx);
    let _ = printer.await;

    let termination = outcome?;
    println!();
    match state.last_specialist_result() {
        Some(answer) => println!("{}", answer.content),
        None => println!("(no specialist answered)"),
    }
    println!("\n{} thread {}", termination.marker(), state.thread_id());
    Ok(())
}

async fn run_server(config: Option<PathBuf>, port: u16, bind: Option<String>) -> anyhow::Result<()> {
    let host = bind
        .or_else(|| std::env::var("SWITCHYARD_BIND_ADDR").ok())
        .unwrap_or_else(|| "127.0.0.1".to_string());

    if host == "0.0.0.0" {
        tracing::warn!(
            "Server binding to 0.0.0.0 exposes the API to all network interfaces. \
             The API has no authentication; put it behind a firewall or proxy."
        );
    }

    let cors_origins: Option<Vec<String>> = std::env::var("SWITCHYARD_CORS_ORIGINS")
        .ok()
        .map(|s| s.split(',').map(|o| o.trim().to_string()).collect());

    let config = load_config(config.as_deref())?;
    let state = AppState::from_config(&config).context("building the router")?;

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    serve(Arc::new(state), addr, cors_origins).await
}

fn describe(event: &LoopEvent) -> String {
    match event {
        LoopEvent::Routed { specialist, reason } => format!("-> {specialist}: {reason}"),
        LoopEvent::FallbackApplied {
            step,
            rejected,
            applied,
        } => format!("!! {step} fallback: '{rejected}' -> '{applied}'"),
        LoopEvent::ForcedValidation { specialist, visits } => {
            format!("!! {specialist} already ran {visits} times, validating")
        }
        LoopEvent::SpecialistCompleted {
            specialist,
            content,
        } => format!("<- {specialist}: {}", first_line(content)),
        LoopEvent::SpecialistFailed { specialist, error } => {
            format!("<- {specialist} failed: {error}")
        }
        LoopEvent::DecodeRetry {
            step,
            attempt,
            error,
        } => format!("!! {step} attempt {attempt} undecodable: {error}"),
        LoopEvent::Validated { outcome, reason } => format!("== {outcome}: {reason}"),
        LoopEvent::Terminated { termination } => termination.marker().to_string(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}
