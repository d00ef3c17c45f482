//! Registry of named circuit breakers
//!
//! Breakers are created lazily on first use of a name, configured from the
//! built-in table merged with any override for that name, and live as long as
//! the registry. Different names share no lock.

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::future::Future;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use storeguard_common::resilience::{
    BreakerError, BreakerListener, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerMetrics,
    CircuitState, Clock, ConfigError, Fallback, FallbackCause, SystemClock,
};
use storeguard_domain::constants::EXTERNAL_PREFIX;
use storeguard_domain::{BreakerOverride, Result, StoreGuardError};
use tracing::{debug, info};

use super::defaults::{apply_override, default_config};

/// Override key applied to every `external:<name>` dependency without its own
/// entry.
const EXTERNAL_WILDCARD: &str = "external:*";

/// Shared set of per-dependency circuit breakers
pub struct BreakerRegistry<C: Clock + Clone = SystemClock> {
    breakers: DashMap<String, CircuitBreaker<C>>,
    overrides: BTreeMap<String, BreakerOverride>,
    listeners: Vec<Arc<dyn BreakerListener>>,
    clock: C,
}

impl BreakerRegistry<SystemClock> {
    /// Registry using only the built-in configuration table
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
            overrides: BTreeMap::new(),
            listeners: Vec::new(),
            clock: SystemClock,
        }
    }

    /// Registry with configured overrides, validated up front
    pub fn with_overrides(overrides: BTreeMap<String, BreakerOverride>) -> Result<Self> {
        Self::with_clock(SystemClock, overrides)
    }
}

impl Default for BreakerRegistry<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock + Clone> BreakerRegistry<C> {
    /// Registry with a custom clock (useful for testing)
    pub fn with_clock(clock: C, overrides: BTreeMap<String, BreakerOverride>) -> Result<Self> {
        let registry =
            Self { breakers: DashMap::new(), overrides, listeners: Vec::new(), clock };

        for name in registry.overrides.keys() {
            registry.config_for(name).map_err(|e| {
                StoreGuardError::Config(format!("breaker override for '{name}': {e}"))
            })?;
        }

        Ok(registry)
    }

    /// Attach a listener to every breaker this registry creates
    pub fn with_listener(mut self, listener: Arc<dyn BreakerListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Effective configuration for `name`: built-in default, then the
    /// `external:*` override for external names, then the exact-name override.
    pub fn config_for(&self, name: &str) -> std::result::Result<CircuitBreakerConfig, ConfigError> {
        let mut config = default_config(name);

        if name.starts_with(EXTERNAL_PREFIX) && name != EXTERNAL_WILDCARD {
            if let Some(wildcard) = self.overrides.get(EXTERNAL_WILDCARD) {
                config = apply_override(config, wildcard);
            }
        }
        if let Some(exact) = self.overrides.get(name) {
            config = apply_override(config, exact);
        }

        config.validate()?;
        Ok(config)
    }

    /// Fetch the breaker for `name`, creating it on first use
    pub fn breaker(&self, name: &str) -> std::result::Result<CircuitBreaker<C>, ConfigError> {
        if let Some(existing) = self.breakers.get(name) {
            return Ok(existing.value().clone());
        }

        match self.breakers.entry(name.to_string()) {
            Entry::Occupied(occupied) => Ok(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let config = self.config_for(name)?;
                let mut breaker = CircuitBreaker::with_clock(name, config, self.clock.clone())?;
                for listener in &self.listeners {
                    breaker = breaker.with_listener(Arc::clone(listener));
                }

                debug!(dependency = name, config = ?breaker.config(), "circuit breaker registered");
                vacant.insert(breaker.clone());
                Ok(breaker)
            }
        }
    }

    /// Run `action` through the breaker for `name`
    pub async fn fire<F, Fut, T, E>(
        &self,
        name: &str,
        action: F,
    ) -> std::result::Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: StdError + Send + Sync + 'static,
    {
        let breaker = self.breaker(name).map_err(|source| BreakerError::Misconfigured {
            dependency: name.to_string(),
            source,
        })?;
        breaker.fire(action).await
    }

    /// Run `action` through the breaker for `name`, answering with `fallback`
    /// when the real result is unavailable
    pub async fn fire_with_fallback<F, Fut, T, E, B>(&self, name: &str, action: F, fallback: &B) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: StdError + Send + Sync + 'static,
        B: Fallback<T> + ?Sized,
    {
        match self.breaker(name) {
            Ok(breaker) => breaker.fire_with_fallback(action, fallback).await,
            Err(err) => fallback.fallback(&FallbackCause::Failure(err.to_string())),
        }
    }

    /// State and counters for `name`, or `None` if it was never used
    pub fn status(&self, name: &str) -> Option<CircuitBreakerMetrics> {
        self.breakers.get(name).map(|breaker| breaker.metrics())
    }

    /// Current state for `name`; unused names report CLOSED
    pub fn state(&self, name: &str) -> CircuitState {
        self.breakers.get(name).map_or(CircuitState::Closed, |breaker| breaker.state())
    }

    /// Force `name` to CLOSED. Returns `false` if it was never used.
    pub fn reset(&self, name: &str) -> bool {
        match self.breakers.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Force every breaker to CLOSED
    pub fn reset_all(&self) {
        for breaker in self.breakers.iter() {
            breaker.reset();
        }
        info!(count = self.breakers.len(), "all circuit breakers reset");
    }

    /// Metrics for every registered breaker, sorted by name
    pub fn metrics(&self) -> Vec<CircuitBreakerMetrics> {
        let mut metrics: Vec<_> = self.breakers.iter().map(|breaker| breaker.metrics()).collect();
        metrics.sort_by(|a, b| a.name.cmp(&b.name));
        metrics
    }

    /// Names of all registered breakers
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.breakers.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }
}
