//! Delimited-text loading into a typed DataFrame
//!
//! Text columns (identifiers and categoricals) are kept as strings, every
//! other column must parse as a finite number. Malformed records fail with
//! [`ChurnError::Parse`] naming the zero-based data row and, where known,
//! the offending column.

use crate::data::ChurnSchema;
use crate::error::{ChurnError, Result};
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Per-column accumulation buffer
enum ColumnBuffer {
    Text(Vec<String>),
    Numeric(Vec<f64>),
}

/// Loader for churn tables supplied as delimited text
#[derive(Debug, Clone)]
pub struct DataLoader {
    schema: ChurnSchema,
    delimiter: u8,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new(ChurnSchema::default())
    }
}

impl DataLoader {
    /// Create a loader for the given column layout
    pub fn new(schema: ChurnSchema) -> Self {
        Self {
            schema,
            delimiter: b',',
        }
    }

    /// Set the field delimiter
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Column layout used to type the columns
    pub fn schema(&self) -> &ChurnSchema {
        &self.schema
    }

    /// Load a delimited file
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path)?;
        debug!(path = %path.display(), "Opening churn dataset");
        self.load_from_reader(file)
    }

    /// Load delimited text held in memory
    pub fn load_from_str(&self, text: &str) -> Result<DataFrame> {
        self.load_from_reader(text.as_bytes())
    }

    /// Load from any reader: one header row followed by data rows
    pub fn load_from_reader<R: Read>(&self, reader: R) -> Result<DataFrame> {
        let start = Instant::now();
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(self.delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_string()).collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(ChurnError::InvalidInput("input has no header row".to_string()));
        }

        let mut seen = HashSet::new();
        for name in &headers {
            if !seen.insert(name.as_str()) {
                return Err(ChurnError::InvalidInput(format!(
                    "duplicate column '{}' in header",
                    name
                )));
            }
        }

        let mut buffers: Vec<ColumnBuffer> = headers
            .iter()
            .map(|name| {
                if self.schema.is_text(name) {
                    ColumnBuffer::Text(Vec::new())
                } else {
                    ColumnBuffer::Numeric(Vec::new())
                }
            })
            .collect();

        let mut n_rows = 0usize;
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() != headers.len() {
                return Err(ChurnError::Parse {
                    row,
                    column: None,
                    message: format!("expected {} fields, found {}", headers.len(), record.len()),
                });
            }

            for (col, field) in record.iter().enumerate() {
                match &mut buffers[col] {
                    ColumnBuffer::Text(values) => values.push(field.to_string()),
                    ColumnBuffer::Numeric(values) => {
                        values.push(parse_numeric(field, row, &headers[col])?)
                    }
                }
            }
            n_rows += 1;
        }

        let columns: Vec<Column> = headers
            .iter()
            .zip(buffers)
            .map(|(name, buffer)| match buffer {
                ColumnBuffer::Text(values) => Series::new(name.as_str().into(), values).into(),
                ColumnBuffer::Numeric(values) => Series::new(name.as_str().into(), values).into(),
            })
            .collect();

        let df = DataFrame::new(columns)?;

        info!(
            rows = n_rows,
            columns = headers.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded churn dataset"
        );

        Ok(df)
    }
}

fn parse_numeric(field: &str, row: usize, column: &str) -> Result<f64> {
    let value: f64 = field.parse().map_err(|_| ChurnError::Parse {
        row,
        column: Some(column.to_string()),
        message: format!("'{}' is not a number", field),
    })?;

    if !value.is_finite() {
        return Err(ChurnError::Parse {
            row,
            column: Some(column.to_string()),
            message: format!("'{}' is not a finite number", field),
        });
    }

    Ok(value)
}
