//! Declarative per-database adapter configuration
//!
//! Each external annotation database describes its schema once, as a mapping
//! from semantic column names onto its own column names, plus the relation
//! type it contributes and the namespaces its keys live in. New databases
//! plug in through configuration alone; the harmonizer and join logic never
//! change per source.

use crate::resolve::Namespace;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Semantic column naming the edge subject.
pub const SEMANTIC_SUBJECT: &str = "subject";
/// Semantic column naming the edge object.
pub const SEMANTIC_OBJECT: &str = "object";
/// Semantic column naming the confidence score.
pub const SEMANTIC_SCORE: &str = "score";

/// The closed set of relation categories annotation sources may contribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationType {
    /// Gene ↔ disease association (e.g., DisGeNET)
    GeneDisease,
    /// Gene ↔ gene interaction (e.g., BioGRID, STRING)
    GeneGene,
    /// Gene → GO term annotation
    GeneGo,
    /// Gene → pathway membership
    GenePathway,
    /// Gene ↔ drug association
    GeneDrug,
}

impl RelationType {
    /// Whether records of this relation must carry an object key.
    ///
    /// Interactions are inherently pairwise; the other categories may be
    /// projected as attribute-only records (object omitted).
    pub fn requires_object(&self) -> bool {
        matches!(self, RelationType::GeneGene)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RelationType::GeneDisease => "gene-disease",
            RelationType::GeneGene => "gene-gene",
            RelationType::GeneGo => "gene-go",
            RelationType::GenePathway => "gene-pathway",
            RelationType::GeneDrug => "gene-drug",
        };
        write!(f, "{}", name)
    }
}

/// Adapter validation failure: a required semantic column has no usable
/// mapping for this database.
#[derive(Debug, Error)]
pub enum AdapterMismatchError {
    #[error("adapter '{database}' does not map required semantic column '{column}'")]
    NotMapped { database: String, column: String },

    #[error(
        "adapter '{database}' maps semantic column '{column}' to '{source_column}', which is absent from the source"
    )]
    NotInSource {
        database: String,
        column: String,
        source_column: String,
    },
}

/// Declarative mapping for one annotation database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Database identifier stamped on every emitted record.
    pub database: String,
    /// Relation category this database contributes.
    pub relation: RelationType,
    /// Namespace the raw subject identifiers live in.
    pub source_namespace: Namespace,
    /// Canonical namespace subjects are resolved into.
    pub namespace: Namespace,
    /// Namespace the raw object identifiers live in; defaults to
    /// `source_namespace` (gene-gene interactions share one scheme).
    #[serde(default)]
    pub object_source_namespace: Option<Namespace>,
    /// Canonical namespace objects are resolved into; defaults to `namespace`.
    #[serde(default)]
    pub object_namespace: Option<Namespace>,
    /// Semantic column name → source column name. `subject`, `object`, and
    /// `score` are interpreted by the harmonizer; all other entries are
    /// carried onto records as named attributes.
    pub columns: BTreeMap<String, String>,
}

impl AdapterConfig {
    pub fn new(
        database: impl Into<String>,
        relation: RelationType,
        source_namespace: Namespace,
        namespace: Namespace,
    ) -> Self {
        Self {
            database: database.into(),
            relation,
            source_namespace,
            namespace,
            object_source_namespace: None,
            object_namespace: None,
            columns: BTreeMap::new(),
        }
    }

    /// Declare that object identifiers live in their own namespaces
    /// (e.g., disease vocabularies for gene-disease sources).
    pub fn with_object_namespaces(mut self, source: Namespace, target: Namespace) -> Self {
        self.object_source_namespace = Some(source);
        self.object_namespace = Some(target);
        self
    }

    /// Namespace raw object identifiers live in.
    pub fn object_source_namespace(&self) -> &Namespace {
        self.object_source_namespace
            .as_ref()
            .unwrap_or(&self.source_namespace)
    }

    /// Canonical namespace objects are resolved into.
    pub fn object_namespace(&self) -> &Namespace {
        self.object_namespace.as_ref().unwrap_or(&self.namespace)
    }

    /// Map a semantic column onto a source column.
    pub fn with_column(mut self, semantic: impl Into<String>, source: impl Into<String>) -> Self {
        self.columns.insert(semantic.into(), source.into());
        self
    }

    /// Parse an adapter from its YAML representation.
    pub fn from_yaml(text: &str) -> Result<Self, super::harmonizer::AnnotateError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load an adapter from a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, super::harmonizer::AnnotateError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| {
            super::harmonizer::AnnotateError::Io {
                path: path.display().to_string(),
                source,
            }
        })?;
        Self::from_yaml(&text)
    }

    pub fn subject_column(&self) -> Option<&str> {
        self.columns.get(SEMANTIC_SUBJECT).map(|s| s.as_str())
    }

    pub fn object_column(&self) -> Option<&str> {
        self.columns.get(SEMANTIC_OBJECT).map(|s| s.as_str())
    }

    pub fn score_column(&self) -> Option<&str> {
        self.columns.get(SEMANTIC_SCORE).map(|s| s.as_str())
    }

    /// Semantic → source pairs carried as plain attributes.
    pub fn attribute_columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns
            .iter()
            .filter(|(semantic, _)| {
                !matches!(
                    semantic.as_str(),
                    SEMANTIC_SUBJECT | SEMANTIC_OBJECT | SEMANTIC_SCORE
                )
            })
            .map(|(semantic, source)| (semantic.as_str(), source.as_str()))
    }

    /// Validate that the mapping covers everything its relation requires.
    pub fn validate(&self) -> Result<(), AdapterMismatchError> {
        if self.subject_column().is_none() {
            return Err(AdapterMismatchError::NotMapped {
                database: self.database.clone(),
                column: SEMANTIC_SUBJECT.to_string(),
            });
        }
        if self.relation.requires_object() && self.object_column().is_none() {
            return Err(AdapterMismatchError::NotMapped {
                database: self.database.clone(),
                column: SEMANTIC_OBJECT.to_string(),
            });
        }
        Ok(())
    }
}

/// Run-scoped registry of adapter configurations, keyed by database name.
///
/// An explicit state object handed to the harmonizer at construction, so
/// independent integration runs cannot contaminate each other.
#[derive(Debug, Default)]
pub struct AdapterRegistry {
    adapters: DashMap<String, Arc<AdapterConfig>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and register an adapter; replaces any previous registration
    /// for the same database.
    pub fn register(&self, config: AdapterConfig) -> Result<(), AdapterMismatchError> {
        config.validate()?;
        self.adapters.insert(config.database.clone(), Arc::new(config));
        Ok(())
    }

    pub fn get(&self, database: &str) -> Option<Arc<AdapterConfig>> {
        self.adapters.get(database).map(|r| r.value().clone())
    }

    pub fn databases(&self) -> Vec<String> {
        self.adapters.iter().map(|r| r.key().clone()).collect()
    }
}
