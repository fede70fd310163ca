//! Common test utilities for integration suites
//!
//! Builders for small omics tables, a populated resolver cache, and tracing
//! setup shared across the end-to-end tests.

// Each suite uses its own subset of these helpers.
#![allow(dead_code)]

use polyomic::{
    Column, EntityTable, Frame, Namespace, ResolverCache, SemanticType, SynonymTable, TableSchema,
    Value,
};
use std::sync::Arc;

/// Initialize test logging once; repeat calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A single-key table with one numeric attribute column.
pub fn numeric_table(name: &str, key_col: &str, keys: &[&str], value_col: &str, values: &[f64]) -> EntityTable {
    let frame = Frame::new(vec![
        Column::new(
            key_col,
            name,
            SemanticType::String,
            keys.iter().map(|k| Value::from(*k)).collect(),
        ),
        Column::new(
            value_col,
            name,
            SemanticType::Numeric,
            values.iter().map(|v| Value::Float(*v)).collect(),
        ),
    ])
    .unwrap();
    EntityTable::from_frame(name, frame, TableSchema::new().with_key(key_col)).unwrap()
}

/// A resolver cache with gene-symbol synonyms covering the test fixtures:
/// accession → symbol, including one ambiguous accession.
pub fn gene_symbol_cache() -> Arc<ResolverCache> {
    let cache = ResolverCache::new();
    let mut synonyms = SynonymTable::new(Namespace::GeneSymbol);
    synonyms.insert("ENSG001", "TP53");
    synonyms.insert("ENSG002", "BRCA1");
    synonyms.insert("ENSG003", "EGFR");
    // One accession annotated against two symbols.
    synonyms.insert("ENSG004", "KRAS");
    synonyms.insert("ENSG004", "KRAS2");
    // Symbols resolve to themselves so already-canonical tables pass through.
    for symbol in ["TP53", "BRCA1", "EGFR", "KRAS", "KRAS2"] {
        synonyms.insert(symbol, symbol);
    }
    cache.register_synonyms(Namespace::GeneSymbol, synonyms);
    Arc::new(cache)
}
