//! Run configuration consumed by the pipeline.
//!
//! Everything here is passed into constructors explicitly; the pipeline has
//! no global configuration state.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use hazard_common::{ColumnFormat, Document, LoadError, LoadResult, Region};

/// Default HTTP request timeout; generous because region files are large.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Default HTTP connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether existing schema objects are dropped before loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Drop and recreate the schema, then load everything.
    FullReload,
    /// Keep the schema; only add rows and metadata not already present.
    MissingOnly,
}

/// One dataset: its regions, documents, and CSV column format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub regions: Vec<Region>,
    pub documents: Vec<Document>,
    pub format: ColumnFormat,
}

impl DatasetConfig {
    /// Pre-flight validation; any failure aborts the run before side effects.
    pub fn validate(&self) -> LoadResult<()> {
        if self.regions.is_empty() {
            return Err(LoadError::Configuration(
                "Dataset has no regions".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for region in &self.regions {
            region.validate()?;
            if !names.insert(region.name.as_str()) {
                return Err(LoadError::Configuration(format!(
                    "Duplicate region name '{}'",
                    region.name
                )));
            }
        }

        self.format.validate()
    }
}

/// Pipeline behavior: run mode, SQL scripts, and HTTP timeouts.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub mode: RunMode,
    /// Opaque schema creation script, run only in full-reload mode.
    pub schema_sql: String,
    /// Opaque index creation script, run after all regions complete.
    pub index_sql: String,
    /// Secondary indexes dropped before the bulk phase in missing-only mode.
    pub secondary_indexes: Vec<String>,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl PipelineConfig {
    pub fn new(mode: RunMode, schema_sql: String, index_sql: String) -> Self {
        Self {
            mode,
            schema_sql,
            index_sql,
            secondary_indexes: Vec::new(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_secondary_indexes(mut self, names: Vec<String>) -> Self {
        self.secondary_indexes = names;
        self
    }
}
