//! PostgreSQL-backed metadata catalog for the hazard loader.

pub mod catalog;

pub use catalog::Catalog;
