//! # StoreGuard Domain
//!
//! Domain types shared by the StoreGuard resilience layer.
//!
//! This crate contains:
//! - Dead-letter queue records and resolution types
//! - Configuration structures (breaker overrides, retry defaults, logging)
//! - The `StoreGuardError` error type and `Result` alias
//! - Well-known dependency names and default values
//!
//! ## Architecture
//! - No dependencies on other StoreGuard crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
