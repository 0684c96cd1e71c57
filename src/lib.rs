pub mod api;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod ui;

pub use db::DbPool;

use config::Config;
use std::time::Duration;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    /// Shared client for vendor price pages
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(format!("barometer/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.scraper.request_timeout))
            .build()
            .unwrap_or_default();

        Self { config, db, http }
    }
}
