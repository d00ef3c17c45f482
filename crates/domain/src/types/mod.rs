//! Domain types and models

pub mod dlq;

pub use dlq::{DlqRecord, DlqSourceStats, NewDlqRecord, ResolutionType};
