//! Lazy join plans
//!
//! Joins are described, not performed: each combinator extends a DAG of
//! typed nodes (scan, resolve, project, join) and nothing touches row data
//! until an executor materializes the plan. This keeps plan construction
//! non-blocking and the execution substrate swappable.

use crate::resolve::{KeyResolver, Namespace, ResolveError, ResolveOptions};
use crate::table::{EntityTable, Frame, SchemaError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Join semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinType {
    /// Keep rows whose key appears on both sides.
    Inner,
    /// Keep every left row; unmatched right columns are null.
    Left,
    /// Keep every row from both sides, null-filling the missing side.
    Outer,
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JoinType::Inner => "inner",
            JoinType::Left => "left",
            JoinType::Outer => "outer",
        };
        write!(f, "{}", name)
    }
}

/// How colliding attribute names from different sources are disambiguated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Rename both columns with a `_<source>` suffix. The default; a
    /// collision is never resolved by silent overwrite.
    #[default]
    Suffix,
    /// Keep the left column, drop the right.
    PreferLeft,
    /// Keep the right column, drop the left.
    PreferRight,
    /// Fail the join.
    Error,
}

/// Specification of one join: semantics, key columns, collision handling.
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub join_type: JoinType,
    /// Canonical key column(s) joined on.
    pub on: Vec<String>,
    pub collision_policy: CollisionPolicy,
}

impl JoinSpec {
    pub fn new(join_type: JoinType, on: impl Into<String>) -> Self {
        Self {
            join_type,
            on: vec![on.into()],
            collision_policy: CollisionPolicy::default(),
        }
    }

    pub fn inner(on: impl Into<String>) -> Self {
        Self::new(JoinType::Inner, on)
    }

    pub fn left(on: impl Into<String>) -> Self {
        Self::new(JoinType::Left, on)
    }

    pub fn outer(on: impl Into<String>) -> Self {
        Self::new(JoinType::Outer, on)
    }

    /// Add a further key column (composite join keys).
    pub fn and_on(mut self, column: impl Into<String>) -> Self {
        self.on.push(column.into());
        self
    }

    pub fn with_collision_policy(mut self, policy: CollisionPolicy) -> Self {
        self.collision_policy = policy;
        self
    }
}

/// A declared join key absent from one of the inputs.
#[derive(Debug, Error)]
#[error("join key '{key}' not found in input '{table}'")]
pub struct JoinKeyError {
    pub table: String,
    pub key: String,
}

/// Errors raised while planning or materializing joins.
#[derive(Debug, Error)]
pub enum JoinError {
    #[error(transparent)]
    JoinKey(#[from] JoinKeyError),

    #[error("column '{column}' collides between '{left}' and '{right}'")]
    Collision {
        column: String,
        left: String,
        right: String,
    },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("join plan has no registered inputs")]
    EmptyPlan,

    #[error("join worker thread panicked")]
    Worker,
}

/// Result type for join operations.
pub type JoinResult<T> = Result<T, JoinError>;

/// A typed node in the deferred evaluation DAG.
///
/// Plans hold only table handles and configuration; interpreting them is the
/// executor's job, so a distributed substrate can schedule subtrees however
/// it likes as long as row values come out identical.
#[derive(Debug, Clone)]
pub enum LogicalPlan {
    /// Leaf: one wrapped source table.
    Scan { table: Arc<EntityTable> },
    /// Column projection.
    Project {
        input: Box<LogicalPlan>,
        columns: Vec<String>,
    },
    /// Rewrite one identifier column onto canonical keys.
    Resolve {
        input: Box<LogicalPlan>,
        resolver: KeyResolver,
        column: String,
        source: Namespace,
        target: Namespace,
        options: ResolveOptions,
    },
    /// Binary join of two subplans.
    Join {
        left: Box<LogicalPlan>,
        right: Box<LogicalPlan>,
        spec: JoinSpec,
    },
}

impl LogicalPlan {
    /// Compact single-line rendering for logs.
    pub fn describe(&self) -> String {
        match self {
            LogicalPlan::Scan { table } => format!("scan({})", table.name()),
            LogicalPlan::Project { input, columns } => {
                format!("project[{}]({})", columns.join(","), input.describe())
            }
            LogicalPlan::Resolve { input, target, column, .. } => {
                format!("resolve[{} -> {}]({})", column, target, input.describe())
            }
            LogicalPlan::Join { left, right, spec } => format!(
                "join[{} on {}]({}, {})",
                spec.join_type,
                spec.on.join(","),
                left.describe(),
                right.describe()
            ),
        }
    }
}

/// A deferred view over a plan; the handle every combinator returns.
#[derive(Debug, Clone)]
pub struct LazyFrame {
    plan: LogicalPlan,
}

impl LazyFrame {
    /// Start a plan from one wrapped table.
    pub fn scan(table: EntityTable) -> Self {
        Self {
            plan: LogicalPlan::Scan {
                table: Arc::new(table),
            },
        }
    }

    pub fn from_plan(plan: LogicalPlan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> &LogicalPlan {
        &self.plan
    }

    /// Defer a column projection.
    pub fn select(self, columns: &[&str]) -> Self {
        Self {
            plan: LogicalPlan::Project {
                input: Box::new(self.plan),
                columns: columns.iter().map(|c| c.to_string()).collect(),
            },
        }
    }

    /// Defer a key-resolution rewrite of one column.
    pub fn resolve(
        self,
        resolver: KeyResolver,
        column: impl Into<String>,
        source: Namespace,
        target: Namespace,
        options: ResolveOptions,
    ) -> Self {
        Self {
            plan: LogicalPlan::Resolve {
                input: Box::new(self.plan),
                resolver,
                column: column.into(),
                source,
                target,
                options,
            },
        }
    }

    /// Defer a join with another plan.
    pub fn join(self, other: LazyFrame, spec: JoinSpec) -> Self {
        Self {
            plan: LogicalPlan::Join {
                left: Box::new(self.plan),
                right: Box::new(other.plan),
                spec,
            },
        }
    }

    /// Materialize the plan. The only blocking point in the pipeline.
    pub fn collect(&self, executor: &dyn super::executor::Executor) -> JoinResult<Frame> {
        executor.execute(&self.plan)
    }
}

impl EntityTable {
    /// Deferred view of this table, the entry point into the join DAG.
    pub fn to_lazy_frame(&self) -> LazyFrame {
        LazyFrame::scan(self.clone())
    }
}
