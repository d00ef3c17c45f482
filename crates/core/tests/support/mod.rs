//! Shared test helpers for `storeguard-core` integration tests.

pub mod repositories;
