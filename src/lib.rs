//! Book Journey Server
//!
//! Reading club backend. This crate hosts the bestseller reconciliation
//! engine that keeps each genre's bestseller book, and the favorite genre
//! markers pinned to it, in line with the Aladin bestseller lists.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod testing;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
