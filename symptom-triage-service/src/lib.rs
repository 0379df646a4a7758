pub mod agent;
pub mod clients;
pub mod config;
pub mod error;
pub mod imaging;
pub mod inference;
pub mod knowledge;
pub mod models;
pub mod ocr;
pub mod recommendation;
pub mod resolution;
pub mod service;
pub mod tasks;
pub mod workflow;

pub use config::AppConfig;
pub use error::{Result, TriageError};
pub use service::{AppState, build_router, create_app, create_app_state};
