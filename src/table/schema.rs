//! Declared schemas and schema validation errors

use super::value::SemanticType;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while validating or coercing a tabular source.
///
/// Every variant names the table and column that triggered it so failures
/// during interactive dataset integration point straight at the offender.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("key column '{column}' not found in table '{table}'")]
    MissingKeyColumn { table: String, column: String },

    #[error("column '{column}' not found in table '{table}'")]
    MissingColumn { table: String, column: String },

    #[error("duplicate column '{column}' in table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error(
        "column '{column}' in table '{table}' has {actual} rows, expected {expected}"
    )]
    RaggedColumns {
        table: String,
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error(
        "cannot coerce value '{value}' in column '{column}' of table '{table}' to {expected}"
    )]
    TypeMismatch {
        table: String,
        column: String,
        value: String,
        expected: SemanticType,
    },

    #[error("table '{table}' declares no key columns")]
    NoKeyColumns { table: String },

    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed delimited input '{path}': {source}")]
    Delimited {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for table operations.
pub type TableResult<T> = Result<T, SchemaError>;

/// Declared type of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub semantic: SemanticType,
}

/// Key-column and type declaration for one raw source.
///
/// Columns left undeclared default to [`SemanticType::String`]; key columns
/// are always treated as string-typed identifiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableSchema {
    /// Columns forming the index, in declaration order.
    pub key_columns: Vec<String>,
    /// Declared semantic types for attribute columns.
    pub columns: Vec<ColumnSpec>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a key (index) column.
    pub fn with_key(mut self, column: impl Into<String>) -> Self {
        self.key_columns.push(column.into());
        self
    }

    /// Declare the semantic type of a column.
    pub fn with_column(mut self, name: impl Into<String>, semantic: SemanticType) -> Self {
        self.columns.push(ColumnSpec {
            name: name.into(),
            semantic,
        });
        self
    }

    /// Declared semantic type of a column, if any.
    ///
    /// Key columns are always string-typed; undeclared columns fall back to
    /// [`SemanticType::String`].
    pub fn semantic_of(&self, name: &str) -> SemanticType {
        if self.key_columns.iter().any(|k| k == name) {
            return SemanticType::String;
        }
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.semantic)
            .unwrap_or(SemanticType::String)
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.key_columns.iter().any(|k| k == name)
    }
}
