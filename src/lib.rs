//! Alexandria Library Management System
//!
//! A Rust REST server for managing a library catalog, user accounts, and
//! book lending. The lending engine keeps each book's available copy count
//! and its set of open loans permanently consistent, including under
//! concurrent borrow/return traffic.

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
