pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod history;
pub mod models;
pub mod pipeline;
pub mod solve;
pub mod timeline;
pub mod utils;
pub mod view;

use std::sync::Arc;

use anyhow::{Context, Result};
use commands::Command;
use config::SolverConfig;
use events::{EventSink, LogSink};
use history::HistoryStore;
use solve::{HttpRecognitionClient, SolveController};

pub struct AppState {
    pub config: SolverConfig,
    pub history: Arc<HistoryStore>,
    pub controller: SolveController,
}

impl AppState {
    pub fn new(config: SolverConfig, sink: Arc<dyn EventSink>) -> Result<Self> {
        let client = HttpRecognitionClient::new(config.api_base.clone(), config.request_timeout)?;
        let history = Arc::new(HistoryStore::open(&config.data_dir, sink.clone()));
        history.render();
        let controller = SolveController::new(Arc::new(client), history.clone(), sink, &config);

        Ok(Self {
            config,
            history,
            controller,
        })
    }
}

pub fn run() -> Result<()> {
    let config = SolverConfig::from_env()?;

    // RUST_LOG still wins over the default level.
    env_logger::Builder::new()
        .filter_level(if config.debug {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let command = Command::parse(std::env::args().skip(1))?;

    log::info!(
        "captcha-solver starting (server {}, data {})",
        config.api_base,
        config.data_dir.display()
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let state = AppState::new(config, Arc::new(LogSink))?;
    runtime.block_on(commands::execute(&state, command))
}
