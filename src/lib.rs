//! # cardscan
//!
//! A pipeline for cataloging physical trading cards from scanned or
//! photographed sheets.
//!
//! Given a source image containing one or more cards, the pipeline:
//! - builds a binary edge map and detects card-shaped rectangles, escalating
//!   through three strategies (edge contours, morphological closing, and
//!   contour merging) until enough candidates are found
//! - normalizes each detected rectangle to an upright, tightly cropped image
//! - trims residual background with an external ImageMagick call
//! - extracts structured card metadata (player name, set, serial number, ...)
//!   through a vision-language service, cached by content hash
//!
//! ## Modules
//!
//! * [`core`] - Error types and detection configuration
//! * [`processors`] - Geometry primitives, edge map builder, rotation normalizer
//! * [`detect`] - The three-strategy rectangle detector and overlap dedup
//! * [`pipeline`] - Per-image orchestration and output layout
//! * [`analyze`] - Vision-language metadata extraction client
//! * [`catalog`] - Content-addressed metadata cache and file renaming
//! * [`trim`] - External whitespace trimmer

pub mod analyze;
pub mod catalog;
pub mod core;
pub mod detect;
pub mod pipeline;
pub mod processors;
pub mod trim;
pub mod utils;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::analyze::{CardAnalyzer, CardFields, GeminiClient};
    pub use crate::catalog::{CardRecord, Cataloger};
    pub use crate::core::{DetectionConfig, ScanError, ScanResult};
    pub use crate::detect::{Candidate, CardDetector, DetectStrategy};
    pub use crate::pipeline::{CardPipeline, PipelineOptions, ProcessSummary};
    pub use crate::trim::Trimmer;
    pub use crate::processors::{BoundingBox, MinAreaRect, Point};
    pub use crate::utils::load_image;
}
