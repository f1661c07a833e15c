//! Core library for the drawing-analysis workflow service.
//!
//! The crate is organized around the `workflows::drawing` pipeline: a drawing
//! is sent to an external multi-agent extraction service, the structured
//! fields are reviewed and corrected, the estimating engine enumerates
//! material/formula candidates, and the versioning controller persists
//! checkpoints of the evolving analysis through the document-store boundary.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
