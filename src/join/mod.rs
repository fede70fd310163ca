//! Join engine: lazy, executor-backed joins across wrapped tables
//!
//! A join is declared as a [`LogicalPlan`] DAG and only materialized when an
//! [`Executor`] interprets it. The engine composes any number of tables
//! left-to-right under one [`JoinSpec`], producing a [`JoinedDataset`] that
//! carries per-column provenance and row-count accounting.

mod engine;
mod executor;
mod plan;

pub use engine::{ColumnProvenance, JoinEngine, JoinedDataset};
pub use executor::{Executor, LocalExecutor, PartitionedExecutor};
pub use plan::{
    CollisionPolicy, JoinError, JoinKeyError, JoinResult, JoinSpec, JoinType, LazyFrame,
    LogicalPlan,
};
