//! Column format descriptor for a dataset's CSV layout.

use serde::{Deserialize, Serialize};

use crate::error::{LoadError, LoadResult};

/// Declarative description of how a dataset's CSV columns map onto the
/// loaded table.
///
/// `csv_columns` lists the input header names in file order. Each input
/// column is declared either scalar (kept as its own output column) or
/// spectral (collapsed, in declared order, into a single array-valued
/// output column). Positions are always resolved by name lookup against
/// `csv_columns`, so reordering the descriptor never misaligns data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnFormat {
    /// Input column names, in the order they appear in the source CSV.
    pub csv_columns: Vec<String>,
    /// Input columns kept as scalars, in output order.
    pub scalar_columns: Vec<String>,
    /// Input columns collapsed into the array column, in array order.
    pub spectral_columns: Vec<String>,
    /// Output column names: one per scalar column, then the array column.
    pub data_columns: Vec<String>,
}

impl ColumnFormat {
    /// Position of an input column by name.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.csv_columns.iter().position(|c| c == name)
    }

    /// Output names for the scalar columns.
    pub fn scalar_output_columns(&self) -> &[String] {
        &self.data_columns[..self.data_columns.len().saturating_sub(1)]
    }

    /// Output name of the array-valued column.
    pub fn array_column(&self) -> &str {
        self.data_columns
            .last()
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Check the descriptor contract. Every input column must be declared
    /// exactly once, spectral columns must exist, and the output columns
    /// must be the scalars plus one array column.
    pub fn validate(&self) -> LoadResult<()> {
        for name in self.scalar_columns.iter().chain(&self.spectral_columns) {
            if self.position_of(name).is_none() {
                return Err(LoadError::Configuration(format!(
                    "Declared column '{}' not present in csv_columns",
                    name
                )));
            }
        }
        if let Some(name) = self
            .scalar_columns
            .iter()
            .find(|c| self.spectral_columns.contains(c))
        {
            return Err(LoadError::Configuration(format!(
                "Column '{}' declared both scalar and spectral",
                name
            )));
        }
        if self.scalar_columns.len() + self.spectral_columns.len() != self.csv_columns.len() {
            return Err(LoadError::Configuration(
                "Every input column must be declared scalar or spectral".to_string(),
            ));
        }
        if self.spectral_columns.is_empty() {
            return Err(LoadError::Configuration(
                "At least one spectral column is required".to_string(),
            ));
        }
        if self.data_columns.len() != self.scalar_columns.len() + 1 {
            return Err(LoadError::Configuration(format!(
                "Expected {} output columns (scalars plus the array column), found {}",
                self.scalar_columns.len() + 1,
                self.data_columns.len()
            )));
        }
        Ok(())
    }
}
