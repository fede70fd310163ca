//! Table wrapping: canonical indexed representations of raw tabular sources
//!
//! A raw source enters the pipeline as a delimited file, becomes a
//! string-typed [`Frame`], and is wrapped into an [`EntityTable`] under a
//! declared [`TableSchema`]: key columns validated, cell types coerced,
//! duplicate-index rows flagged multi-valued.

mod frame;
mod reader;
mod schema;
mod value;
mod wrapper;

pub use frame::{Column, Frame};
pub use reader::{read_delimited, read_delimited_from, ReadOptions};
pub use schema::{ColumnSpec, SchemaError, TableResult, TableSchema};
pub use value::{SemanticType, Value};
pub use wrapper::{EntityTable, IndexKey, RowMeta, MULTI_VALUE_SEP};
