//! Polyomic: Multi-Omics Data Integration Engine
//!
//! Integrates heterogeneous multi-omics tabular datasets (genomic,
//! transcriptomic, proteomic, clinical) and cross-references them against
//! external annotation/interaction databases, producing a unified,
//! queryable, disk-efficient representation.
//!
//! # Core Concepts
//!
//! - **Entity tables**: raw sources normalized into indexed, type-coerced
//!   tables with multi-valued duplicates flagged, never collapsed
//! - **Key resolution**: heterogeneous identifier schemes rewritten onto a
//!   shared canonical namespace, with one-to-many expansion
//! - **Lazy joins**: an explicit plan DAG interpreted by a pluggable
//!   executor; nothing materializes until asked
//! - **Columnar persistence**: Parquet partitions with validated schema
//!   descriptors and pruning reads
//!
//! # Example
//!
//! ```
//! use polyomic::{EntityTable, Frame, Column, SemanticType, TableSchema, Value};
//! use polyomic::LocalExecutor;
//!
//! let frame = Frame::new(vec![
//!     Column::new("gene", "expr", SemanticType::String, vec![Value::from("TP53")]),
//!     Column::new("tpm", "expr", SemanticType::Numeric, vec![Value::Float(4.2)]),
//! ]).unwrap();
//! let table = EntityTable::from_frame(
//!     "expr",
//!     frame,
//!     TableSchema::new().with_key("gene"),
//! ).unwrap();
//!
//! let result = table
//!     .to_lazy_frame()
//!     .collect(&LocalExecutor::new())
//!     .unwrap();
//! assert_eq!(result.n_rows(), 1);
//! ```

pub mod annotate;
pub mod export;
pub mod join;
mod pipeline;
pub mod resolve;
pub mod store;
pub mod table;

pub use annotate::{
    records_to_table, AdapterConfig, AdapterMismatchError, AdapterRegistry, AnnotateError,
    AnnotationRecord, Harmonized, Harmonizer, RelationType,
};
pub use export::{
    to_graph, to_sample_sequence, EdgeSpec, ExportError, GraphEdge, OmicsGraph, Sample,
    SampleSequence,
};
pub use join::{
    CollisionPolicy, Executor, JoinEngine, JoinError, JoinKeyError, JoinSpec, JoinType,
    JoinedDataset, LazyFrame, LocalExecutor, PartitionedExecutor,
};
pub use pipeline::IntegrationPipeline;
pub use resolve::{
    FallbackStrategy, Identifier, KeyMapping, KeyResolver, Namespace, ResolveError,
    ResolveOptions, ResolverCache, SynonymTable, UnresolvedKeyError,
};
pub use store::{ColumnarStore, PartitionScan, SchemaConflictError, SchemaDescriptor, StoreError};
pub use table::{
    read_delimited, Column, EntityTable, Frame, IndexKey, ReadOptions, SchemaError, SemanticType,
    TableSchema, Value,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
