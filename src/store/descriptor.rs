//! Partition schema descriptors

use super::store::{StoreError, StoreResult};
use crate::join::JoinType;
use crate::table::{Frame, SemanticType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Persisted vs. incoming schema disagreement for one partition.
#[derive(Debug, Error)]
#[error("schema conflict for dataset '{dataset}' partition '{partition}': {detail}")]
pub struct SchemaConflictError {
    pub dataset: String,
    pub partition: String,
    pub detail: String,
}

/// One column as recorded on disk: name, semantic type, and the source table
/// that contributed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    pub semantic: SemanticType,
    pub source: String,
}

/// The schema descriptor stored beside each partition's columnar artifacts.
///
/// Reads validate this file before scanning any data; writes compare it
/// against the incoming schema and refuse to merge on any mismatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub dataset: String,
    pub partition: String,
    pub columns: Vec<ColumnDescriptor>,
    pub join_type: JoinType,
    /// Total rows across all artifacts in the partition.
    pub rows: usize,
    pub created_at: DateTime<Utc>,
}

impl SchemaDescriptor {
    pub fn from_frame(
        dataset: impl Into<String>,
        partition: impl Into<String>,
        frame: &Frame,
        join_type: JoinType,
    ) -> Self {
        Self {
            dataset: dataset.into(),
            partition: partition.into(),
            columns: frame
                .columns()
                .iter()
                .map(|c| ColumnDescriptor {
                    name: c.name.clone(),
                    semantic: c.semantic,
                    source: c.source.clone(),
                })
                .collect(),
            join_type,
            rows: frame.n_rows(),
            created_at: Utc::now(),
        }
    }

    /// Check that `incoming` may merge into a partition described by `self`.
    ///
    /// Column names, order, and semantic types must match exactly; provenance
    /// and row counts are metadata, not schema.
    pub fn matches(&self, incoming: &SchemaDescriptor) -> Result<(), SchemaConflictError> {
        let conflict = |detail: String| SchemaConflictError {
            dataset: self.dataset.clone(),
            partition: self.partition.clone(),
            detail,
        };

        if self.columns.len() != incoming.columns.len() {
            return Err(conflict(format!(
                "existing schema has {} columns, incoming has {}",
                self.columns.len(),
                incoming.columns.len()
            )));
        }
        for (existing, new) in self.columns.iter().zip(&incoming.columns) {
            if existing.name != new.name {
                return Err(conflict(format!(
                    "column '{}' in existing schema, '{}' incoming at the same position",
                    existing.name, new.name
                )));
            }
            if existing.semantic != new.semantic {
                return Err(conflict(format!(
                    "column '{}' is {} in existing schema but {} incoming",
                    existing.name, existing.semantic, new.semantic
                )));
            }
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> StoreResult<()> {
        let text = serde_json::to_string_pretty(self).map_err(|source| StoreError::Descriptor {
            path: path.display().to_string(),
            source,
        })?;
        std::fs::write(path, text).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StoreError::Descriptor {
            path: path.display().to_string(),
            source,
        })
    }
}
