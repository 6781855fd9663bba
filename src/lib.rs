pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod routes;
pub mod services;

pub use services::profile::{compute_profile, render_report};

use services::risk_analyzer::RiskAnalyzer;
use services::session::SessionStore;

// Application state
pub struct AppState {
    pub config: config::Config,
    pub sessions: SessionStore,
    pub analyzer: RiskAnalyzer,
}

impl AppState {
    pub fn new(config: config::Config) -> Result<Self, error::AppError> {
        let analyzer = RiskAnalyzer::from_config(&config)?;
        Ok(Self {
            sessions: SessionStore::new(config.session_capacity),
            analyzer,
            config,
        })
    }
}
