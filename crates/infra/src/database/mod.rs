//! SQLite persistence for the dead-letter queue

pub mod dlq_repository;
pub mod manager;

pub use dlq_repository::SqliteDlqRepository;
pub use manager::{DbManager, SqliteConnection};
