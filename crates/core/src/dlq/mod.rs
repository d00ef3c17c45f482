//! Dead-letter queue: port and service

pub mod ports;
pub mod service;

pub use ports::DlqRepository;
pub use service::DlqService;
