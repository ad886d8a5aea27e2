//! eLibrary catalog server
//!
//! A REST JSON API for managing a library book catalog: books with
//! search, filtering and pagination, cover images stored on disk and
//! token-protected mutations.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
