//! # StudyHub
//!
//! Backend for the StudyHub student planner: account sessions with rotating refresh
//! tokens, e-mailed password-reset codes, a syllabus upload relay to an external
//! workflow, and read-only study-plan queries for the calendar.
//!
//! ## Library Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use studyhub::config::ServerConfig;
//! use studyhub::server::{AppState, create_router};
//! use studyhub::store::{SqliteStore, Store};
//!
//! let config = ServerConfig::default();
//! let store = SqliteStore::new(config.db_path()).unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::new(Arc::new(store), &config).unwrap());
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): builds the `studyhub` binary. Disable with `default-features = false`.

pub mod auth;
pub mod config;
pub mod error;
pub mod jobs;
pub mod mail;
pub mod server;
pub mod store;
pub mod types;
