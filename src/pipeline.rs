//! Integration pipeline facade
//!
//! Wires the components for the common path: wrap omics tables, resolve
//! their indexes onto canonical keys, harmonize annotation sources, and
//! join everything left-to-right. The facade owns the run-scoped caches
//! (synonyms, adapters, key mappings) and adds no semantics of its own.

use crate::annotate::{
    records_to_table, AdapterConfig, AdapterMismatchError, AdapterRegistry, AnnotateResult,
    Harmonized, Harmonizer,
};
use crate::join::{Executor, JoinEngine, JoinResult, JoinSpec, JoinedDataset, LazyFrame};
use crate::resolve::{
    KeyMapping, KeyResolver, Namespace, ResolveOptions, ResolveResult, ResolverCache, SynonymTable,
};
use crate::table::{EntityTable, Frame};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// One integration run: registered sources, shared caches, and the join
/// engine combining them.
///
/// Multiple pipelines coexist independently; nothing here is process-global.
#[derive(Debug, Default)]
pub struct IntegrationPipeline {
    cache: Arc<ResolverCache>,
    registry: Arc<AdapterRegistry>,
    engine: JoinEngine,
    /// Key mappings built per source table, kept for inspection and reuse.
    mappings: HashMap<String, KeyMapping>,
}

impl IntegrationPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolver(&self) -> KeyResolver {
        KeyResolver::new(self.cache.clone())
    }

    pub fn harmonizer(&self) -> Harmonizer {
        Harmonizer::new(self.registry.clone(), self.resolver())
    }

    pub fn cache(&self) -> &Arc<ResolverCache> {
        &self.cache
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Register the synonym table serving lookups into `target`.
    pub fn register_synonyms(&self, target: Namespace, table: SynonymTable) {
        self.cache.register_synonyms(target, table);
    }

    /// Register a cross-reference table for the (source, target) pair.
    pub fn register_crossref(&self, source: Namespace, target: Namespace, table: SynonymTable) {
        self.cache.register_crossref(source, target, table);
    }

    /// Register an annotation-database adapter.
    pub fn register_adapter(&self, config: AdapterConfig) -> Result<(), AdapterMismatchError> {
        self.registry.register(config)
    }

    /// Register a table whose index is already canonical.
    pub fn add_table(&mut self, table: EntityTable) -> &mut Self {
        self.engine.register(table);
        self
    }

    /// Resolve a table's index onto the canonical namespace, then register
    /// the rewritten table. The key mapping built for it is cached by table
    /// name.
    pub fn add_omics_table(
        &mut self,
        table: EntityTable,
        source: Namespace,
        target: Namespace,
        options: &ResolveOptions,
    ) -> ResolveResult<&KeyMapping> {
        let name = table.name().to_string();
        let (resolved, mapping) = self
            .resolver()
            .resolve_table(&table, &source, &target, options)?;
        info!(
            table = %name,
            resolved = mapping.resolved_count(),
            unresolved = mapping.unresolved().len(),
            "registered omics table"
        );
        self.engine.register(resolved);
        self.mappings.insert(name.clone(), mapping);
        Ok(&self.mappings[&name])
    }

    /// Harmonize an annotation source through its registered adapter and
    /// register the records, projected as a table keyed by subject.
    pub fn add_annotation_source(
        &mut self,
        database: &str,
        frame: &Frame,
        options: &ResolveOptions,
    ) -> AnnotateResult<Harmonized> {
        let harmonized = self.harmonizer().harmonize(database, frame, options)?;
        let table = records_to_table(&harmonized.records, database)?;
        self.engine.register(table);
        Ok(harmonized)
    }

    /// The key mapping cached for a registered table.
    pub fn key_mapping(&self, table: &str) -> Option<&KeyMapping> {
        self.mappings.get(table)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.engine.table_names()
    }

    /// Build the lazy join plan across every registered source.
    pub fn plan(&self, spec: &JoinSpec) -> JoinResult<LazyFrame> {
        self.engine.plan(spec)
    }

    /// Materialize the integration across every registered source.
    pub fn integrate(
        &self,
        spec: &JoinSpec,
        executor: &dyn Executor,
    ) -> JoinResult<JoinedDataset> {
        self.engine.join(spec, executor)
    }
}
