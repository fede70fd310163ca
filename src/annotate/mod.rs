//! Annotation harmonization: per-database tables into a common record schema
//!
//! External annotation/interaction databases arrive with arbitrary column
//! names. A declarative [`AdapterConfig`] per database maps its schema onto
//! the harmonized [`AnnotationRecord`] shape; the [`Harmonizer`] normalizes
//! subject/object keys through the key resolver and emits records ready to
//! join or export.

mod adapter;
mod harmonizer;

pub use adapter::{
    AdapterConfig, AdapterMismatchError, AdapterRegistry, RelationType, SEMANTIC_OBJECT,
    SEMANTIC_SCORE, SEMANTIC_SUBJECT,
};
pub use harmonizer::{
    records_to_table, AnnotateError, AnnotateResult, AnnotationRecord, Harmonized, Harmonizer,
    RECORD_DATABASE, RECORD_OBJECT, RECORD_RELATION, RECORD_SCORE, RECORD_SUBJECT,
};
