//! Relational-graph export
//!
//! Projects a joined dataset (or harmonized records directly) into a plain
//! node/edge structure for external graph-analysis consumers. Node identity
//! is the canonical key; edge identity is
//! (subject, relation, object, source database).

use crate::annotate::{AnnotationRecord, RelationType};
use crate::join::JoinedDataset;
use crate::resolve::{Identifier, Namespace};
use crate::table::{SchemaError, SemanticType, Value};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Errors raised while exporting a joined dataset.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("feature column '{column}' is {semantic}, expected numeric")]
    NonNumericFeature {
        column: String,
        semantic: SemanticType,
    },
}

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Declares how one relation's edges are drawn from a joined dataset.
#[derive(Debug, Clone)]
pub struct EdgeSpec {
    /// Column holding subject keys.
    pub subject_column: String,
    /// Column holding object keys.
    pub object_column: String,
    pub relation: RelationType,
    /// Source database stamped on each edge.
    pub database: String,
    /// Namespace of the keys in both columns.
    pub namespace: Namespace,
    /// Optional column carrying the edge score.
    pub score_column: Option<String>,
    /// Columns carried onto edges as named attributes.
    pub attribute_columns: Vec<String>,
}

impl EdgeSpec {
    pub fn new(
        subject_column: impl Into<String>,
        object_column: impl Into<String>,
        relation: RelationType,
        database: impl Into<String>,
        namespace: Namespace,
    ) -> Self {
        Self {
            subject_column: subject_column.into(),
            object_column: object_column.into(),
            relation,
            database: database.into(),
            namespace,
            score_column: None,
            attribute_columns: Vec::new(),
        }
    }

    pub fn with_score_column(mut self, column: impl Into<String>) -> Self {
        self.score_column = Some(column.into());
        self
    }

    pub fn with_attribute_column(mut self, column: impl Into<String>) -> Self {
        self.attribute_columns.push(column.into());
        self
    }
}

/// One typed edge with its attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphEdge {
    pub subject: Identifier,
    pub object: Identifier,
    pub relation: RelationType,
    pub database: String,
    pub score: Option<f64>,
    pub attributes: BTreeMap<String, Value>,
}

/// A generic node/edge graph over canonical keys.
#[derive(Debug, Clone, Default)]
pub struct OmicsGraph {
    nodes: Vec<Identifier>,
    node_set: HashSet<Identifier>,
    edges: Vec<GraphEdge>,
    edge_identities: HashSet<(Identifier, RelationType, Identifier, String)>,
}

impl OmicsGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node; duplicates are ignored.
    pub fn add_node(&mut self, key: Identifier) {
        if self.node_set.insert(key.clone()) {
            self.nodes.push(key);
        }
    }

    /// Add an edge, registering both endpoints as nodes. Edges with a
    /// duplicate (subject, relation, object, database) identity are ignored.
    pub fn add_edge(&mut self, edge: GraphEdge) {
        let identity = (
            edge.subject.clone(),
            edge.relation,
            edge.object.clone(),
            edge.database.clone(),
        );
        if !self.edge_identities.insert(identity) {
            return;
        }
        self.add_node(edge.subject.clone());
        self.add_node(edge.object.clone());
        self.edges.push(edge);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn nodes(&self) -> &[Identifier] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn contains_node(&self, key: &Identifier) -> bool {
        self.node_set.contains(key)
    }

    /// Keys adjacent to the given node through any edge, either direction.
    pub fn neighbors(&self, key: &Identifier) -> Vec<&Identifier> {
        let mut seen = HashSet::new();
        let mut result = Vec::new();
        for edge in &self.edges {
            let other = if &edge.subject == key {
                &edge.object
            } else if &edge.object == key {
                &edge.subject
            } else {
                continue;
            };
            if seen.insert(other) {
                result.push(other);
            }
        }
        result
    }

    /// Build a graph directly from harmonized records. Attribute-only
    /// records contribute their subject as a node but no edge.
    pub fn from_records(records: &[AnnotationRecord]) -> Self {
        let mut graph = Self::new();
        for record in records {
            graph.add_node(record.subject.clone());
            if let Some(object) = &record.object {
                graph.add_edge(GraphEdge {
                    subject: record.subject.clone(),
                    object: object.clone(),
                    relation: record.relation,
                    database: record.database.clone(),
                    score: record.score,
                    attributes: record.attributes.clone(),
                });
            }
        }
        graph
    }
}

/// Project a joined dataset into a graph.
///
/// Nodes are the non-null canonical keys drawn from `node_key_columns`;
/// edges are drawn per [`EdgeSpec`], skipping rows where either endpoint is
/// null (outer-join fill). Self-loops are kept only when the source data
/// itself relates a key to itself.
pub fn to_graph(
    dataset: &JoinedDataset,
    node_key_columns: &[(&str, Namespace)],
    edge_specs: &[EdgeSpec],
) -> ExportResult<OmicsGraph> {
    let frame = dataset.frame();
    let mut graph = OmicsGraph::new();

    for (column, namespace) in node_key_columns {
        let idx = frame
            .column_index(column)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: frame.label(),
                column: column.to_string(),
            })?;
        for row in 0..frame.n_rows() {
            let cell = frame.value(row, idx);
            if !cell.is_null() {
                graph.add_node(Identifier::new(namespace.clone(), cell.to_string()));
            }
        }
    }

    for spec in edge_specs {
        let column_idx = |name: &str| -> ExportResult<usize> {
            frame.column_index(name).ok_or_else(|| {
                SchemaError::MissingColumn {
                    table: frame.label(),
                    column: name.to_string(),
                }
                .into()
            })
        };
        let subject_idx = column_idx(&spec.subject_column)?;
        let object_idx = column_idx(&spec.object_column)?;
        let score_idx = match &spec.score_column {
            Some(name) => Some(column_idx(name)?),
            None => None,
        };
        let attribute_idx: Vec<(String, usize)> = spec
            .attribute_columns
            .iter()
            .map(|name| Ok((name.clone(), column_idx(name)?)))
            .collect::<ExportResult<_>>()?;

        for row in 0..frame.n_rows() {
            let subject = frame.value(row, subject_idx);
            let object = frame.value(row, object_idx);
            if subject.is_null() || object.is_null() {
                continue;
            }
            let attributes: BTreeMap<String, Value> = attribute_idx
                .iter()
                .map(|(name, idx)| (name.clone(), frame.value(row, *idx).clone()))
                .collect();
            graph.add_edge(GraphEdge {
                subject: Identifier::new(spec.namespace.clone(), subject.to_string()),
                object: Identifier::new(spec.namespace.clone(), object.to_string()),
                relation: spec.relation,
                database: spec.database.clone(),
                score: score_idx.and_then(|idx| frame.value(row, idx).as_f64()),
                attributes,
            });
        }
    }

    debug!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "exported graph"
    );
    Ok(graph)
}
