//! Outbound HTTP with deadlines and retry

pub mod client;

pub use client::{is_server_error, HttpCallError, HttpClient, HttpClientBuilder};
