//! Core error and configuration types for the card scanning pipeline.

pub mod config;
pub mod errors;

pub use config::{AspectBand, DetectionConfig};
pub use errors::{ScanError, ScanResult};
