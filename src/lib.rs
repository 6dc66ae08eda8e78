//! Libris Library Loan Management System
//!
//! A Rust REST backend for managing a library catalog, its members, and the
//! full lifecycle of book loans: request, approval, return, reissue, overdue
//! tracking and late fines.

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
    pub repository: repository::Repository,
}
