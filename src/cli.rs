use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::app_state::AppState;
use crate::config_loader::load_config;
use crate::log_sink::init_tracing;
use crate::model_bundle::ModelBundle;
use crate::profile::{DecisionRequest, RequesterProfile};

/// Top-level CLI interface for the access arbiter
#[derive(Parser)]
#[command(
    name = "access-arbiter",
    version,
    about = "Access-request arbitration service"
)]
pub struct Cli {
    /// Config file (defaults to $ARBITER_CONFIG, then ./arbiter.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the HTTP API (decision routes, health, versioned endpoints)
    Serve {
        /// Host/IP to bind; overrides server.host
        #[arg(long)]
        host: Option<String>,
        /// Port to bind; overrides server.port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Decide a single request and print the report as JSON
    Decide {
        #[arg(short, long)]
        query: String,
        /// Requester profile as inline JSON, or @path to a JSON file
        #[arg(short, long)]
        profile: String,
    },

    /// Load the model bundle and print its summary
    InspectBundle {
        /// Bundle directory; overrides bundle.dir
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref()).context("loading configuration")?;
    init_tracing(config.log.json);

    match cli.command {
        Commands::Serve { host, port } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let state = AppState::from_config(&config).context("initializing service")?;

            runtime()?.block_on(crate::web::serve(state, &host, port))
        }
        Commands::Decide { query, profile } => {
            let profile = read_profile(&profile)?;
            let state = AppState::from_config(&config).context("initializing service")?;
            let report = runtime()?.block_on(decide_once(state, query, profile))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Commands::InspectBundle { dir } => {
            let dir = dir.unwrap_or_else(|| config.bundle.dir.clone());
            let bundle = ModelBundle::load(&dir, config.decision.approval_threshold)
                .with_context(|| format!("loading bundle from {}", dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&bundle.summary)?);
            Ok(())
        }
    }
}

async fn decide_once(
    state: Arc<AppState>,
    query: String,
    profile: RequesterProfile,
) -> anyhow::Result<crate::decision_composer::DecisionReport> {
    let request = state.validator.validate(DecisionRequest {
        query: Some(query),
        user_profile: Some(profile),
    })?;
    Ok(state.composer.decide(&request).await?)
}

fn read_profile(arg: &str) -> anyhow::Result<RequesterProfile> {
    let text = match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading profile from {path}"))?,
        None => arg.to_string(),
    };
    serde_json::from_str(&text).context("parsing requester profile")
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building Tokio runtime")
}
