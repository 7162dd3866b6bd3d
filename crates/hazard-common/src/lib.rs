//! Common types shared across the hazard-loader crates.

pub mod bbox;
pub mod error;
pub mod format;
pub mod region;

pub use bbox::BoundingBox;
pub use error::{LoadError, LoadResult};
pub use format::ColumnFormat;
pub use region::{Document, Region};
