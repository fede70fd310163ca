//! Namespaced identifiers
//!
//! Every identifier the resolver touches carries its namespace. Operating on
//! bare strings would let a gene symbol and a sample barcode that happen to
//! share text collide silently across namespaces.

use serde::{Deserialize, Serialize};

/// Identifier namespace tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    /// HGNC-style gene symbols (e.g., `TP53`)
    GeneSymbol,
    /// Stable gene accessions (e.g., `ENSG00000141510`)
    GeneId,
    /// Transcript accessions (e.g., `ENST00000269305`)
    TranscriptId,
    /// Protein accessions (e.g., `P04637`)
    ProteinId,
    /// Cohort sample / specimen identifiers
    SampleId,
    /// Any other namespace
    Custom(String),
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Namespace::GeneSymbol => write!(f, "gene_symbol"),
            Namespace::GeneId => write!(f, "gene_id"),
            Namespace::TranscriptId => write!(f, "transcript_id"),
            Namespace::ProteinId => write!(f, "protein_id"),
            Namespace::SampleId => write!(f, "sample_id"),
            Namespace::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// A raw or canonical identifier tagged with its namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    pub namespace: Namespace,
    pub value: String,
}

impl Identifier {
    pub fn new(namespace: Namespace, value: impl Into<String>) -> Self {
        Self {
            namespace,
            value: value.into(),
        }
    }
}

impl std::fmt::Display for Identifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.namespace, self.value)
    }
}
