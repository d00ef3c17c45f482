//! # StoreGuard Core
//!
//! Resilience services - no infrastructure dependencies.
//!
//! This crate contains:
//! - The breaker registry (one named circuit breaker per dependency)
//! - The retry engine with dead-letter escalation
//! - The dead-letter queue service and its repository port
//! - `ResilienceLayer`, which composes breakers and retries
//!
//! ## Architecture Principles
//! - Depends only on `storeguard-common` and `storeguard-domain`
//! - No database or HTTP code
//! - Persistence via the `DlqRepository` trait

pub mod breaker;
pub mod dlq;
pub mod layer;
pub mod retry;

pub use breaker::BreakerRegistry;
pub use dlq::{DlqRepository, DlqService};
pub use layer::ResilienceLayer;
pub use retry::{
    DeadLetter, RetryItem, RetryOptions, RetryOutcome, RetryService, TIMEOUT_ERROR_CODE,
};
