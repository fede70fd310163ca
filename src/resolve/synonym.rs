//! Synonym tables: raw identifier → canonical key lookups

use super::identifier::Namespace;
use crate::table::{Frame, SchemaError, TableResult, MULTI_VALUE_SEP};
use std::collections::HashMap;

/// Precomputed mapping from raw identifier text to canonical keys in one
/// target namespace.
///
/// A raw identifier may map to several canonical keys (ambiguity) and a
/// canonical key may be reached from many raw identifiers (synonyms). A
/// case-folded view is built alongside the exact one to serve the
/// case-insensitive fallback without rescanning.
#[derive(Debug, Clone)]
pub struct SynonymTable {
    target: Namespace,
    exact: HashMap<String, Vec<String>>,
    folded: HashMap<String, Vec<String>>,
}

impl SynonymTable {
    pub fn new(target: Namespace) -> Self {
        Self {
            target,
            exact: HashMap::new(),
            folded: HashMap::new(),
        }
    }

    pub fn target(&self) -> &Namespace {
        &self.target
    }

    /// Register one raw → canonical mapping; duplicates are ignored.
    pub fn insert(&mut self, raw: &str, canonical: &str) {
        let entry = self.exact.entry(raw.to_string()).or_default();
        if !entry.iter().any(|c| c == canonical) {
            entry.push(canonical.to_string());
        }
        let folded_entry = self.folded.entry(raw.to_lowercase()).or_default();
        if !folded_entry.iter().any(|c| c == canonical) {
            folded_entry.push(canonical.to_string());
        }
    }

    /// Build a synonym table from two columns of a mapping frame.
    ///
    /// Cells in the canonical column may hold several keys joined with `|`;
    /// each contributes its own mapping. Rows with a null on either side are
    /// skipped.
    pub fn from_frame(
        frame: &Frame,
        raw_column: &str,
        canonical_column: &str,
        target: Namespace,
    ) -> TableResult<Self> {
        let raw_idx = frame
            .column_index(raw_column)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: frame.label(),
                column: raw_column.to_string(),
            })?;
        let canonical_idx =
            frame
                .column_index(canonical_column)
                .ok_or_else(|| SchemaError::MissingColumn {
                    table: frame.label(),
                    column: canonical_column.to_string(),
                })?;

        let mut table = Self::new(target);
        for row in 0..frame.n_rows() {
            let raw = frame.value(row, raw_idx);
            let canonical = frame.value(row, canonical_idx);
            if raw.is_null() || canonical.is_null() {
                continue;
            }
            let raw = raw.to_string();
            for key in canonical.to_string().split(MULTI_VALUE_SEP) {
                let key = key.trim();
                if !key.is_empty() {
                    table.insert(&raw, key);
                }
            }
        }
        Ok(table)
    }

    /// Exact-match lookup.
    pub fn lookup(&self, raw: &str) -> Option<&[String]> {
        self.exact.get(raw).map(|v| v.as_slice())
    }

    /// Case-folded lookup.
    pub fn lookup_folded(&self, raw: &str) -> Option<&[String]> {
        self.folded.get(&raw.to_lowercase()).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}
