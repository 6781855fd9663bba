pub mod insights;
pub mod loader;
pub mod profile;
pub mod risk_analyzer;
pub mod session;
