//! Retry engine: exponential backoff with jitter and dead-letter escalation

pub mod options;
pub mod service;

pub use options::{DeadLetter, RetryOptions, RetryOutcome, TIMEOUT_ERROR_CODE};
pub use service::{RetryItem, RetryService};
