//! # StoreGuard Infrastructure
//!
//! Adapters for the ports defined in `storeguard-core`:
//! - SQLite dead-letter queue repository (rusqlite + r2d2)
//! - Deadline-bounded HTTP client with retry
//! - Configuration loading from files and environment
//! - Tracing subscriber setup
//! - Conversions from external errors into `StoreGuardError`

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod observability;

pub use database::{DbManager, SqliteDlqRepository};
pub use errors::InfraError;
pub use http::{HttpCallError, HttpClient};
pub use observability::init_tracing;
