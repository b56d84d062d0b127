//! Column roles of a churn dataset

use serde::{Deserialize, Serialize};

/// Role a column plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnRole {
    /// Row identifiers, dropped before modelling
    Identifier,
    /// Text categories, label-encoded to integer codes
    Categorical,
    /// Binary target
    Label,
    /// Numeric feature
    Numeric,
}

/// Column layout of the input table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChurnSchema {
    /// Columns dropped if present
    pub identifier_columns: Vec<String>,
    /// Columns encoded to integer codes if present
    pub categorical_columns: Vec<String>,
    /// Binary label column
    pub label_column: String,
}

impl Default for ChurnSchema {
    fn default() -> Self {
        Self {
            identifier_columns: vec![
                "RowNumber".to_string(),
                "CustomerId".to_string(),
                "Surname".to_string(),
            ],
            categorical_columns: vec!["Geography".to_string(), "Gender".to_string()],
            label_column: "Exited".to_string(),
        }
    }
}

impl ChurnSchema {
    /// Create the default bank-churn schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the identifier columns
    pub fn with_identifiers<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.identifier_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the categorical columns
    pub fn with_categoricals<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categorical_columns = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Set the label column
    pub fn with_label(mut self, column: impl Into<String>) -> Self {
        self.label_column = column.into();
        self
    }

    /// Role of a column by name
    pub fn role_of(&self, column: &str) -> ColumnRole {
        if column == self.label_column {
            ColumnRole::Label
        } else if self.identifier_columns.iter().any(|c| c == column) {
            ColumnRole::Identifier
        } else if self.categorical_columns.iter().any(|c| c == column) {
            ColumnRole::Categorical
        } else {
            ColumnRole::Numeric
        }
    }

    /// Whether a column is read as text rather than parsed as a number
    pub fn is_text(&self, column: &str) -> bool {
        matches!(
            self.role_of(column),
            ColumnRole::Identifier | ColumnRole::Categorical
        )
    }
}
