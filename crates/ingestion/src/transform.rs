//! Streaming row transformer with partial-line carry-over.
//!
//! Network chunks split logical CSV rows at arbitrary byte offsets. The
//! transformer buffers the trailing incomplete line between chunks, so any
//! chunking of the same byte sequence produces the same output rows.

use tracing::warn;

use hazard_common::{ColumnFormat, LoadError};

/// Reshapes raw CSV lines into the bulk-copy wire format.
///
/// Output rows are the scalar columns in descriptor order, comma-joined,
/// followed by the spectral values as a single quoted array literal:
/// `scalar1,...,scalarN,"{spectral1,...}"`.
///
/// The source header row is reshaped like any other line; the copy sink
/// skips it via the CSV HEADER option.
pub struct RowTransformer {
    /// (input column name, position) per scalar column, in output order.
    scalars: Vec<(String, usize)>,
    /// (input column name, position) per spectral column, in array order.
    spectrals: Vec<(String, usize)>,
    /// Trailing, possibly incomplete line from the previous chunk.
    carry: Vec<u8>,
    rows_emitted: u64,
    rows_skipped: u64,
}

impl RowTransformer {
    /// Build a transformer for one column format.
    ///
    /// Positions are resolved by name against the descriptor's input
    /// columns; `ColumnFormat::validate` guarantees every name resolves.
    pub fn new(format: &ColumnFormat) -> Self {
        let resolve = |names: &[String]| {
            names
                .iter()
                .filter_map(|name| {
                    format
                        .position_of(name)
                        .map(|position| (name.clone(), position))
                })
                .collect()
        };

        Self {
            scalars: resolve(&format.scalar_columns),
            spectrals: resolve(&format.spectral_columns),
            carry: Vec::new(),
            rows_emitted: 0,
            rows_skipped: 0,
        }
    }

    /// Consume one chunk, returning the rows completed by it.
    pub fn consume(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let Some(last_newline) = self.carry.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.carry.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.carry, rest);

        let mut out = Vec::new();
        for raw in complete.split(|&b| b == b'\n') {
            self.emit_line(raw, &mut out);
        }
        out
    }

    /// Flush the carry-over buffer as a final line.
    ///
    /// Handles sources without a trailing newline; whitespace-only residue
    /// produces nothing.
    pub fn finish(&mut self) -> Option<String> {
        let residual = std::mem::take(&mut self.carry);
        if residual.iter().all(|b| b.is_ascii_whitespace()) {
            return None;
        }

        let mut out = Vec::new();
        self.emit_line(&residual, &mut out);
        out.pop()
    }

    /// Rows emitted so far.
    pub fn rows_emitted(&self) -> u64 {
        self.rows_emitted
    }

    /// Rows dropped for missing declared values.
    pub fn rows_skipped(&self) -> u64 {
        self.rows_skipped
    }

    fn emit_line(&mut self, raw: &[u8], out: &mut Vec<String>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');

        match self.transform_line(line) {
            Ok(Some(row)) => {
                self.rows_emitted += 1;
                out.push(row);
            }
            Ok(None) => {}
            Err(e) => {
                // A malformed row degrades the load, never aborts it.
                self.rows_skipped += 1;
                warn!(error = %e, "Dropping malformed row");
            }
        }
    }

    /// Reshape one complete line.
    ///
    /// `Ok(None)` for structurally invalid lines (no field separator),
    /// `Err` when a declared column has no value.
    fn transform_line(&self, line: &str) -> Result<Option<String>, LoadError> {
        if !line.contains(',') {
            return Ok(None);
        }

        let values: Vec<&str> = line.split(',').collect();

        let mut fields = Vec::with_capacity(self.scalars.len() + 1);
        for (name, position) in &self.scalars {
            fields.push(Self::required(&values, name, *position, line)?.to_string());
        }

        let mut spectral = Vec::with_capacity(self.spectrals.len());
        for (name, position) in &self.spectrals {
            spectral.push(Self::required(&values, name, *position, line)?);
        }
        fields.push(format!("\"{{{}}}\"", spectral.join(",")));

        Ok(Some(fields.join(",")))
    }

    fn required<'a>(
        values: &[&'a str],
        name: &str,
        position: usize,
        line: &str,
    ) -> Result<&'a str, LoadError> {
        match values.get(position) {
            Some(value) if !value.is_empty() => Ok(value),
            _ => Err(LoadError::MissingField {
                column: name.to_string(),
                line: line.to_string(),
            }),
        }
    }
}
