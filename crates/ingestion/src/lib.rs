//! Streaming transform-and-bulk-load pipeline for gridded hazard data.
//!
//! Each region's gzip-compressed CSV source is streamed through
//! decompression and a column-reshaping row transformer into a PostgreSQL
//! `COPY FROM STDIN` targeting a staging table, then merged into the
//! permanent table with an idempotent conflict policy.
//!
//! # Architecture
//!
//! - [`transform::RowTransformer`] reconstructs logical rows across
//!   arbitrary chunk boundaries and collapses spectral columns into one
//!   array-valued column.
//! - [`decompress::GzipStream`] is push-based gzip decoding for chunked
//!   network input.
//! - [`loader::RegionLoader`] handles per-region staging, copy, merge, and
//!   cleanup.
//! - [`pipeline::LoadPipeline`] sequences regions in a fixed order and
//!   tracks metadata upserts, the index lifecycle, and the run summary.

pub mod config;
pub mod decompress;
pub mod loader;
pub mod pipeline;
pub mod transform;

// Re-exports
pub use config::{DatasetConfig, PipelineConfig, RunMode};
pub use decompress::GzipStream;
pub use loader::{RegionLoadOutcome, RegionLoader};
pub use pipeline::{LoadPipeline, LoadSummary, RegionFailure, RegionReport};
pub use transform::RowTransformer;
