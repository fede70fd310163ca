//! Join engine: composing registered tables into a joined dataset

use super::executor::Executor;
use super::plan::{JoinError, JoinResult, JoinSpec, JoinType, LazyFrame};
use crate::table::{EntityTable, Frame};
use std::sync::Arc;
use tracing::info;

/// Which source table contributed one output column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnProvenance {
    pub column: String,
    pub source: String,
}

/// The materialized result of combining registered tables on canonical keys.
#[derive(Debug, Clone)]
pub struct JoinedDataset {
    frame: Frame,
    join_type: JoinType,
    /// Row count of each input, in registration (join) order.
    rows_before: Vec<(String, usize)>,
    rows_after: usize,
}

impl JoinedDataset {
    pub fn new(frame: Frame, join_type: JoinType, rows_before: Vec<(String, usize)>) -> Self {
        let rows_after = frame.n_rows();
        Self {
            frame,
            join_type,
            rows_before,
            rows_after,
        }
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn rows_before(&self) -> &[(String, usize)] {
        &self.rows_before
    }

    pub fn rows_after(&self) -> usize {
        self.rows_after
    }

    /// Per-column source provenance, in column order.
    pub fn provenance(&self) -> Vec<ColumnProvenance> {
        self.frame
            .columns()
            .iter()
            .map(|c| ColumnProvenance {
                column: c.name.clone(),
                source: c.source.clone(),
            })
            .collect()
    }
}

/// Combines any number of wrapped tables with one join specification.
///
/// Tables join left-to-right in registration order: each intermediate result
/// becomes the left side of the next join. That order is part of the
/// observable contract; it decides which side a collision suffix names and
/// how multi-valued keys multiply.
#[derive(Debug, Default)]
pub struct JoinEngine {
    tables: Vec<Arc<EntityTable>>,
}

impl JoinEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table as the next input, returning `self` for chaining.
    pub fn register(&mut self, table: EntityTable) -> &mut Self {
        self.tables.push(Arc::new(table));
        self
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    /// Build the lazy left-to-right join plan without executing it.
    pub fn plan(&self, spec: &JoinSpec) -> JoinResult<LazyFrame> {
        let mut tables = self.tables.iter();
        let first = tables.next().ok_or(JoinError::EmptyPlan)?;
        let mut lazy = first.to_lazy_frame();
        for table in tables {
            lazy = lazy.join(table.to_lazy_frame(), spec.clone());
        }
        Ok(lazy)
    }

    /// Materialize the join across all registered tables.
    pub fn join(&self, spec: &JoinSpec, executor: &dyn Executor) -> JoinResult<JoinedDataset> {
        let lazy = self.plan(spec)?;
        let rows_before: Vec<(String, usize)> = self
            .tables
            .iter()
            .map(|t| (t.name().to_string(), t.n_rows()))
            .collect();
        let frame = lazy.collect(executor)?;
        let dataset = JoinedDataset::new(frame, spec.join_type, rows_before);
        info!(
            tables = dataset.rows_before.len(),
            join = %spec.join_type,
            rows_out = dataset.rows_after,
            "integrated {} tables", dataset.rows_before.len()
        );
        Ok(dataset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::executor::LocalExecutor;
    use crate::table::{Column, SemanticType, TableSchema, Value};

    fn table(name: &str, keys: &[&str], col: &str, values: &[f64]) -> EntityTable {
        let frame = Frame::new(vec![
            Column::new(
                "gene",
                name,
                SemanticType::String,
                keys.iter().map(|k| Value::from(*k)).collect(),
            ),
            Column::new(
                col,
                name,
                SemanticType::Numeric,
                values.iter().map(|v| Value::Float(*v)).collect(),
            ),
        ])
        .unwrap();
        EntityTable::from_frame(name, frame, TableSchema::new().with_key("gene")).unwrap()
    }

    #[test]
    fn test_empty_engine_fails() {
        let engine = JoinEngine::new();
        assert!(matches!(
            engine.plan(&JoinSpec::inner("gene")),
            Err(JoinError::EmptyPlan)
        ));
    }

    #[test]
    fn test_three_way_join_is_left_to_right() {
        let mut engine = JoinEngine::new();
        engine
            .register(table("expr", &["TP53", "BRCA1"], "tpm", &[1.0, 2.0]))
            .register(table("cnv", &["TP53"], "copies", &[3.0]))
            .register(table("prot", &["TP53", "EGFR"], "abundance", &[4.0, 5.0]));

        let plan = engine.plan(&JoinSpec::inner("gene")).unwrap();
        assert_eq!(
            plan.plan().describe(),
            "join[inner on gene](join[inner on gene](scan(expr), scan(cnv)), scan(prot))"
        );

        let dataset = engine
            .join(&JoinSpec::inner("gene"), &LocalExecutor::new())
            .unwrap();
        assert_eq!(dataset.rows_after(), 1);
        assert_eq!(
            dataset.rows_before(),
            &[
                ("expr".to_string(), 2),
                ("cnv".to_string(), 1),
                ("prot".to_string(), 2)
            ]
        );
    }

    #[test]
    fn test_provenance_tracks_sources() {
        let mut engine = JoinEngine::new();
        engine
            .register(table("expr", &["TP53"], "tpm", &[1.0]))
            .register(table("cnv", &["TP53"], "copies", &[2.0]));
        let dataset = engine
            .join(&JoinSpec::inner("gene"), &LocalExecutor::new())
            .unwrap();

        let provenance = dataset.provenance();
        assert_eq!(provenance[1].column, "tpm");
        assert_eq!(provenance[1].source, "expr");
        assert_eq!(provenance[2].column, "copies");
        assert_eq!(provenance[2].source, "cnv");
    }
}
