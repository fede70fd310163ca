//! Key resolution: rewriting raw identifiers onto a canonical key space

use super::identifier::{Identifier, Namespace};
use super::synonym::SynonymTable;
use crate::table::{Column, EntityTable, Frame, SchemaError, TableResult, Value};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// How many offending identifiers an [`UnresolvedKeyError`] carries verbatim.
const UNRESOLVED_SAMPLE_LIMIT: usize = 5;

/// Fallback matching strategies, attempted in the caller's declared order
/// after the exact synonym lookup misses. The first strategy that yields a
/// mapping wins; later ones are not consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// Drop a trailing `.N` accession version (`ENSG00000141510.11` →
    /// `ENSG00000141510`) and retry the exact lookup.
    StripVersion,
    /// Case-folded exact lookup.
    CaseInsensitive,
    /// Lookup through a cross-reference table registered for the
    /// (source, target) namespace pair.
    CrossReference,
}

/// Options controlling one resolution pass.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Fallback strategies in priority order. The default order tries the
    /// lossless, namespace-internal rewrites first and the cross-namespace
    /// hop last.
    pub fallbacks: Vec<FallbackStrategy>,
    /// When set, any identifier with no mapping fails the whole pass instead
    /// of being retained under its raw key.
    pub strict: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            fallbacks: vec![
                FallbackStrategy::StripVersion,
                FallbackStrategy::CaseInsensitive,
                FallbackStrategy::CrossReference,
            ],
            strict: false,
        }
    }
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: Vec<FallbackStrategy>) -> Self {
        self.fallbacks = fallbacks;
        self
    }
}

/// How one raw identifier was matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Fallback(FallbackStrategy),
    Unresolved,
}

/// Resolution outcome for one raw identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    /// Canonical keys this identifier maps to; empty when unresolved.
    pub canonical: Vec<String>,
    pub matched: MatchKind,
}

/// The full raw → canonical relation built for one source column.
#[derive(Debug, Clone)]
pub struct KeyMapping {
    pub source_namespace: Namespace,
    pub target_namespace: Namespace,
    pub entries: HashMap<String, MappingEntry>,
}

impl KeyMapping {
    /// Raw identifiers that found no canonical key, in arbitrary order.
    pub fn unresolved(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.matched == MatchKind::Unresolved)
            .map(|(raw, _)| raw.as_str())
            .collect()
    }

    pub fn resolved_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| e.matched != MatchKind::Unresolved)
            .count()
    }

    /// Raw identifiers that expanded to more than one canonical key.
    pub fn ambiguous(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.canonical.len() > 1)
            .map(|(raw, _)| raw.as_str())
            .collect()
    }
}

/// Strict-mode failure: identifiers that could not be mapped onto the
/// canonical namespace.
#[derive(Debug, Error)]
#[error(
    "{count} identifier(s) in namespace {namespace} could not be resolved (e.g. {sample:?})"
)]
pub struct UnresolvedKeyError {
    pub namespace: Namespace,
    pub count: usize,
    /// Up to the first few offending identifiers, for debugging.
    pub sample: Vec<String>,
}

/// Errors raised during key resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    Unresolved(#[from] UnresolvedKeyError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no synonym table registered for namespace {0}")]
    MissingSynonyms(Namespace),

    #[error("table '{table}' has a composite index; resolve its key columns individually")]
    CompositeIndex { table: String },
}

/// Result type for resolution operations.
pub type ResolveResult<T> = Result<T, ResolveError>;

/// Run-scoped cache of synonym and cross-reference tables.
///
/// Shared read-mostly across resolutions within one run. Registration
/// replaces a whole table at once, so concurrent readers never observe a
/// partially built mapping; callers keep a single writer per namespace.
#[derive(Debug, Default)]
pub struct ResolverCache {
    synonyms: DashMap<Namespace, Arc<SynonymTable>>,
    crossrefs: DashMap<(Namespace, Namespace), Arc<SynonymTable>>,
}

impl ResolverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the synonym table serving lookups into `target`.
    pub fn register_synonyms(&self, target: Namespace, table: SynonymTable) {
        self.synonyms.insert(target, Arc::new(table));
    }

    /// Register a cross-reference table for the (source, target) pair.
    pub fn register_crossref(&self, source: Namespace, target: Namespace, table: SynonymTable) {
        self.crossrefs.insert((source, target), Arc::new(table));
    }

    pub fn synonyms(&self, target: &Namespace) -> Option<Arc<SynonymTable>> {
        self.synonyms.get(target).map(|r| r.value().clone())
    }

    pub fn crossref(&self, source: &Namespace, target: &Namespace) -> Option<Arc<SynonymTable>> {
        self.crossrefs
            .get(&(source.clone(), target.clone()))
            .map(|r| r.value().clone())
    }
}

/// Result of rewriting one frame column onto canonical keys.
#[derive(Debug, Clone)]
pub struct ResolvedFrame {
    pub frame: Frame,
    pub mapping: KeyMapping,
    /// Per-output-row flag: true when the row kept its raw key.
    pub unresolved_rows: Vec<bool>,
}

/// Maps heterogeneous identifier schemes onto a shared canonical key space.
///
/// Holds only a handle to the run's [`ResolverCache`]; cloning is cheap and
/// clones share the cache.
#[derive(Debug, Clone)]
pub struct KeyResolver {
    cache: Arc<ResolverCache>,
}

impl KeyResolver {
    pub fn new(cache: Arc<ResolverCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<ResolverCache> {
        &self.cache
    }

    /// Resolve a single identifier into canonical keys.
    pub fn resolve_identifier(
        &self,
        id: &Identifier,
        target: &Namespace,
        options: &ResolveOptions,
    ) -> ResolveResult<MappingEntry> {
        let synonyms = self
            .cache
            .synonyms(target)
            .ok_or_else(|| ResolveError::MissingSynonyms(target.clone()))?;
        Ok(self.resolve_value(&id.value, &id.namespace, target, &synonyms, options))
    }

    fn resolve_value(
        &self,
        raw: &str,
        source: &Namespace,
        target: &Namespace,
        synonyms: &SynonymTable,
        options: &ResolveOptions,
    ) -> MappingEntry {
        if let Some(keys) = synonyms.lookup(raw) {
            return MappingEntry {
                canonical: keys.to_vec(),
                matched: MatchKind::Exact,
            };
        }
        for strategy in &options.fallbacks {
            let keys = match strategy {
                FallbackStrategy::StripVersion => strip_version(raw)
                    .and_then(|stripped| synonyms.lookup(stripped).map(|k| k.to_vec())),
                FallbackStrategy::CaseInsensitive => {
                    synonyms.lookup_folded(raw).map(|k| k.to_vec())
                }
                FallbackStrategy::CrossReference => self
                    .cache
                    .crossref(source, target)
                    .and_then(|xref| xref.lookup(raw).map(|k| k.to_vec())),
            };
            if let Some(canonical) = keys {
                return MappingEntry {
                    canonical,
                    matched: MatchKind::Fallback(*strategy),
                };
            }
        }
        MappingEntry {
            canonical: Vec::new(),
            matched: MatchKind::Unresolved,
        }
    }

    /// Build the raw → canonical mapping for a set of identifiers without
    /// rewriting any table. Strict mode fails on the first pass over the
    /// inputs, before any downstream work runs.
    pub fn build_mapping<'a>(
        &self,
        raw_values: impl IntoIterator<Item = &'a str>,
        source: &Namespace,
        target: &Namespace,
        options: &ResolveOptions,
    ) -> ResolveResult<KeyMapping> {
        let synonyms = self
            .cache
            .synonyms(target)
            .ok_or_else(|| ResolveError::MissingSynonyms(target.clone()))?;

        let mut entries = HashMap::new();
        for raw in raw_values {
            if entries.contains_key(raw) {
                continue;
            }
            let entry = self.resolve_value(raw, source, target, &synonyms, options);
            entries.insert(raw.to_string(), entry);
        }

        let mapping = KeyMapping {
            source_namespace: source.clone(),
            target_namespace: target.clone(),
            entries,
        };

        if options.strict {
            let unresolved = mapping.unresolved();
            if !unresolved.is_empty() {
                return Err(unresolved_error(source, &unresolved).into());
            }
        }
        Ok(mapping)
    }

    /// Rewrite one column of a frame onto canonical keys.
    ///
    /// Identifiers mapping to several canonical keys expand into one output
    /// row per key, each an exact copy of the input row's other attributes.
    /// Unresolved identifiers keep their raw value and are flagged, unless
    /// strict mode rejects the pass outright.
    pub fn resolve_frame(
        &self,
        frame: &Frame,
        column: &str,
        source: &Namespace,
        target: &Namespace,
        options: &ResolveOptions,
    ) -> ResolveResult<ResolvedFrame> {
        let col_idx = frame
            .column_index(column)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: frame.label(),
                column: column.to_string(),
            })?;

        let raw_values: Vec<&str> = (0..frame.n_rows())
            .filter_map(|row| frame.value(row, col_idx).as_str())
            .collect();
        let mapping = self.build_mapping(raw_values, source, target, options)?;

        // Null keys cannot be resolved; in strict mode they are as fatal as
        // an unmapped identifier.
        if options.strict {
            let null_keys = (0..frame.n_rows())
                .filter(|&row| frame.value(row, col_idx).is_null())
                .count();
            if null_keys > 0 {
                return Err(UnresolvedKeyError {
                    namespace: source.clone(),
                    count: null_keys,
                    sample: vec!["<null>".to_string()],
                }
                .into());
            }
        }

        // Expansion plan: (input row, rewritten key cell, unresolved flag).
        let mut plan: Vec<(usize, Value, bool)> = Vec::with_capacity(frame.n_rows());
        for row in 0..frame.n_rows() {
            let cell = frame.value(row, col_idx);
            match cell.as_str() {
                None => plan.push((row, cell.clone(), true)),
                Some(raw) => {
                    let entry = &mapping.entries[raw];
                    if entry.canonical.is_empty() {
                        plan.push((row, cell.clone(), true));
                    } else {
                        for key in &entry.canonical {
                            plan.push((row, Value::Str(key.clone()), false));
                        }
                    }
                }
            }
        }

        let row_indices: Vec<usize> = plan.iter().map(|(row, _, _)| *row).collect();
        let mut resolved = frame.take(&row_indices);
        let key_values: Vec<Value> = plan.iter().map(|(_, v, _)| v.clone()).collect();
        let unresolved_rows: Vec<bool> = plan.iter().map(|(_, _, u)| *u).collect();
        resolved = replace_column_values(resolved, col_idx, key_values)?;

        let unresolved_count = unresolved_rows.iter().filter(|u| **u).count();
        if unresolved_count > 0 {
            warn!(
                table = %frame.label(),
                column,
                unresolved = unresolved_count,
                "retained rows under raw keys"
            );
        }
        debug!(
            table = %frame.label(),
            column,
            rows_in = frame.n_rows(),
            rows_out = resolved.n_rows(),
            resolved_ids = mapping.resolved_count(),
            "rewrote identifiers onto {target}"
        );

        Ok(ResolvedFrame {
            frame: resolved,
            mapping,
            unresolved_rows,
        })
    }

    /// Rewrite an entity table's index onto canonical keys.
    ///
    /// The table must have a single-column index; composite indexes are
    /// resolved per column via [`KeyResolver::resolve_frame`].
    pub fn resolve_table(
        &self,
        table: &EntityTable,
        source: &Namespace,
        target: &Namespace,
        options: &ResolveOptions,
    ) -> ResolveResult<(EntityTable, KeyMapping)> {
        let [key_column] = table.key_columns() else {
            return Err(ResolveError::CompositeIndex {
                table: table.name().to_string(),
            });
        };

        let resolved = self.resolve_frame(table.frame(), key_column, source, target, options)?;
        let rewritten = EntityTable::from_parts(
            table.name(),
            resolved.frame,
            table.schema().clone(),
            resolved.unresolved_rows,
        )?;
        Ok((rewritten, resolved.mapping))
    }
}

fn unresolved_error(namespace: &Namespace, unresolved: &[&str]) -> UnresolvedKeyError {
    UnresolvedKeyError {
        namespace: namespace.clone(),
        count: unresolved.len(),
        sample: unresolved
            .iter()
            .take(UNRESOLVED_SAMPLE_LIMIT)
            .map(|s| s.to_string())
            .collect(),
    }
}

/// Strip a trailing `.N` version suffix from an accession.
fn strip_version(raw: &str) -> Option<&str> {
    let (stem, suffix) = raw.rsplit_once('.')?;
    if !stem.is_empty() && !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
        Some(stem)
    } else {
        None
    }
}

fn replace_column_values(frame: Frame, col_idx: usize, values: Vec<Value>) -> TableResult<Frame> {
    let columns: Vec<Column> = frame
        .columns()
        .iter()
        .enumerate()
        .map(|(i, c)| {
            if i == col_idx {
                Column::new(c.name.clone(), c.source.clone(), c.semantic, values.clone())
            } else {
                c.clone()
            }
        })
        .collect();
    Frame::new(columns)
}
