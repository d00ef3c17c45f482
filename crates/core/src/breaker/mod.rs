//! Named circuit breakers, one per logical dependency

pub mod defaults;
pub mod registry;

pub use defaults::{apply_override, default_config};
pub use registry::BreakerRegistry;
