//! Plan executors
//!
//! The pipeline core only builds plans; executors own all evaluation and all
//! concurrency. [`LocalExecutor`] interprets a plan single-threaded;
//! [`PartitionedExecutor`] hash-partitions each join by key and evaluates
//! partitions on scoped worker threads, concatenating results in partition
//! order so row values never depend on scheduling.

use super::plan::{CollisionPolicy, JoinError, JoinKeyError, JoinResult, JoinSpec, JoinType, LogicalPlan};
use crate::table::{Column, Frame, Value};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use tracing::debug;

/// Executes a logical plan into a materialized frame.
///
/// Implementations must be thread-safe (Send + Sync); a distributed
/// substrate plugs in behind this trait without the core changing.
pub trait Executor: Send + Sync {
    fn execute(&self, plan: &LogicalPlan) -> JoinResult<Frame>;
}

/// Single-threaded interpreter; the default executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Executor for LocalExecutor {
    fn execute(&self, plan: &LogicalPlan) -> JoinResult<Frame> {
        interpret(plan, &hash_join)
    }
}

/// Hash-partitioned executor: each join's inputs are split by key hash
/// across a fixed worker count and joined on scoped threads.
///
/// Matching keys land in the same partition, so per-partition joins compose
/// into exactly the rows a single-threaded join would produce; only the row
/// order differs (partition-major instead of left-major).
#[derive(Debug, Clone, Copy)]
pub struct PartitionedExecutor {
    workers: usize,
}

impl PartitionedExecutor {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }
}

impl Executor for PartitionedExecutor {
    fn execute(&self, plan: &LogicalPlan) -> JoinResult<Frame> {
        let workers = self.workers;
        interpret(plan, &move |left, right, spec| {
            partitioned_join(left, right, spec, workers)
        })
    }
}

/// Shared plan interpreter, parameterized over the join implementation.
fn interpret(
    plan: &LogicalPlan,
    join_fn: &dyn Fn(&Frame, &Frame, &JoinSpec) -> JoinResult<Frame>,
) -> JoinResult<Frame> {
    match plan {
        LogicalPlan::Scan { table } => Ok(table.frame().clone()),
        LogicalPlan::Project { input, columns } => {
            let frame = interpret(input, join_fn)?;
            let names: Vec<&str> = columns.iter().map(|c| c.as_str()).collect();
            Ok(frame.select(&names)?)
        }
        LogicalPlan::Resolve {
            input,
            resolver,
            column,
            source,
            target,
            options,
        } => {
            let frame = interpret(input, join_fn)?;
            Ok(resolver
                .resolve_frame(&frame, column, source, target, options)?
                .frame)
        }
        LogicalPlan::Join { left, right, spec } => {
            let left = interpret(left, join_fn)?;
            let right = interpret(right, join_fn)?;
            join_fn(&left, &right, spec)
        }
    }
}

/// Composite join key of one row; `None` when any component is null
/// (null keys never match, SQL-style).
fn row_key(frame: &Frame, key_indices: &[usize], row: usize) -> Option<String> {
    let mut parts = Vec::with_capacity(key_indices.len());
    for &idx in key_indices {
        let cell = frame.value(row, idx);
        if cell.is_null() {
            return None;
        }
        parts.push(cell.to_string());
    }
    Some(parts.join("\u{1f}"))
}

fn key_indices(frame: &Frame, spec: &JoinSpec) -> JoinResult<Vec<usize>> {
    spec.on
        .iter()
        .map(|key| {
            frame.column_index(key).ok_or_else(|| {
                JoinError::JoinKey(JoinKeyError {
                    table: frame.label(),
                    key: key.clone(),
                })
            })
        })
        .collect()
}

/// Output column layout after collision resolution: the final name of every
/// kept column, tagged with the side and index it comes from.
struct OutputLayout {
    /// (final name, left column index)
    left: Vec<(String, usize)>,
    /// (final name, right column index)
    right: Vec<(String, usize)>,
}

fn resolve_collisions(left: &Frame, right: &Frame, spec: &JoinSpec) -> JoinResult<OutputLayout> {
    let is_key = |name: &str| spec.on.iter().any(|k| k == name);

    let mut layout = OutputLayout {
        left: Vec::new(),
        right: Vec::new(),
    };

    let right_names: Vec<&str> = right
        .columns()
        .iter()
        .filter(|c| !is_key(&c.name))
        .map(|c| c.name.as_str())
        .collect();

    for (idx, col) in left.columns().iter().enumerate() {
        if is_key(&col.name) || !right_names.contains(&col.name.as_str()) {
            layout.left.push((col.name.clone(), idx));
            continue;
        }
        let right_col = right.column(&col.name).expect("name present on right");
        match spec.collision_policy {
            CollisionPolicy::Suffix => {
                layout
                    .left
                    .push((format!("{}_{}", col.name, col.source), idx));
            }
            CollisionPolicy::PreferLeft => layout.left.push((col.name.clone(), idx)),
            CollisionPolicy::PreferRight => {} // dropped; right side keeps the name
            CollisionPolicy::Error => {
                return Err(JoinError::Collision {
                    column: col.name.clone(),
                    left: col.source.clone(),
                    right: right_col.source.clone(),
                })
            }
        }
    }

    for (idx, col) in right.columns().iter().enumerate() {
        if is_key(&col.name) {
            continue;
        }
        if !left.has_column(&col.name) {
            layout.right.push((col.name.clone(), idx));
            continue;
        }
        match spec.collision_policy {
            CollisionPolicy::Suffix => {
                layout
                    .right
                    .push((format!("{}_{}", col.name, col.source), idx));
            }
            CollisionPolicy::PreferLeft => {} // dropped
            CollisionPolicy::PreferRight => layout.right.push((col.name.clone(), idx)),
            CollisionPolicy::Error => unreachable!("collision reported on left pass"),
        }
    }

    Ok(layout)
}

/// In-memory hash join with configurable semantics and collision policy.
///
/// Multi-valued keys combine combinatorially: a key covering m left rows and
/// n right rows contributes m×n output rows. That expansion is the declared
/// behavior, never capped.
pub(crate) fn hash_join(left: &Frame, right: &Frame, spec: &JoinSpec) -> JoinResult<Frame> {
    let left_keys = key_indices(left, spec)?;
    let right_keys = key_indices(right, spec)?;
    let layout = resolve_collisions(left, right, spec)?;

    // Index the right side: key -> row indices in right order.
    let mut right_index: HashMap<String, Vec<usize>> = HashMap::new();
    for row in 0..right.n_rows() {
        if let Some(key) = row_key(right, &right_keys, row) {
            right_index.entry(key).or_default().push(row);
        }
    }

    // Row pairing plan, left-major; outer appends unmatched right rows.
    let mut pairs: Vec<(Option<usize>, Option<usize>)> = Vec::new();
    let mut right_matched = vec![false; right.n_rows()];
    for lrow in 0..left.n_rows() {
        let matches = row_key(left, &left_keys, lrow).and_then(|k| right_index.get(&k));
        match matches {
            Some(rrows) => {
                for &rrow in rrows {
                    right_matched[rrow] = true;
                    pairs.push((Some(lrow), Some(rrow)));
                }
            }
            None => {
                if matches!(spec.join_type, JoinType::Left | JoinType::Outer) {
                    pairs.push((Some(lrow), None));
                }
            }
        }
    }
    if spec.join_type == JoinType::Outer {
        for (rrow, matched) in right_matched.iter().enumerate() {
            if !matched {
                pairs.push((None, Some(rrow)));
            }
        }
    }

    // Key columns: left values, falling back to the right side for
    // right-only outer rows.
    let mut columns: Vec<Column> = Vec::new();
    for (key_name, &left_idx) in spec.on.iter().zip(&left_keys) {
        let right_idx = right_keys[spec.on.iter().position(|k| k == key_name).expect("key")];
        let template = &left.columns()[left_idx];
        let values = pairs
            .iter()
            .map(|(l, r)| match (l, r) {
                (Some(lrow), _) => left.value(*lrow, left_idx).clone(),
                (None, Some(rrow)) => right.value(*rrow, right_idx).clone(),
                (None, None) => Value::Null,
            })
            .collect();
        columns.push(Column::new(
            key_name,
            template.source.clone(),
            template.semantic,
            values,
        ));
    }

    for (name, idx) in &layout.left {
        let col = &left.columns()[*idx];
        let values = pairs
            .iter()
            .map(|(l, _)| match l {
                Some(lrow) => col.values[*lrow].clone(),
                None => Value::Null,
            })
            .collect();
        columns.push(Column::new(name, col.source.clone(), col.semantic, values));
    }
    for (name, idx) in &layout.right {
        let col = &right.columns()[*idx];
        let values = pairs
            .iter()
            .map(|(_, r)| match r {
                Some(rrow) => col.values[*rrow].clone(),
                None => Value::Null,
            })
            .collect();
        columns.push(Column::new(name, col.source.clone(), col.semantic, values));
    }

    let result = Frame::new(columns)?;
    debug!(
        left = %left.label(),
        right = %right.label(),
        join = %spec.join_type,
        rows_left = left.n_rows(),
        rows_right = right.n_rows(),
        rows_out = result.n_rows(),
        "materialized join"
    );
    Ok(result)
}

/// Hash-partition both inputs by join key and join each partition pair on a
/// scoped worker thread.
fn partitioned_join(
    left: &Frame,
    right: &Frame,
    spec: &JoinSpec,
    workers: usize,
) -> JoinResult<Frame> {
    if workers <= 1 {
        return hash_join(left, right, spec);
    }
    let left_keys = key_indices(left, spec)?;
    let right_keys = key_indices(right, spec)?;

    let partition_of = |key: Option<String>| -> usize {
        match key {
            // Null keys never match; park them in partition 0 where
            // left/outer semantics still emit them.
            None => 0,
            Some(k) => {
                let mut hasher = DefaultHasher::new();
                k.hash(&mut hasher);
                (hasher.finish() as usize) % workers
            }
        }
    };

    let mut left_parts: Vec<Vec<usize>> = vec![Vec::new(); workers];
    for row in 0..left.n_rows() {
        left_parts[partition_of(row_key(left, &left_keys, row))].push(row);
    }
    let mut right_parts: Vec<Vec<usize>> = vec![Vec::new(); workers];
    for row in 0..right.n_rows() {
        right_parts[partition_of(row_key(right, &right_keys, row))].push(row);
    }

    let results: JoinResult<Vec<Frame>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|p| {
                let left_part = left.take(&left_parts[p]);
                let right_part = right.take(&right_parts[p]);
                scope.spawn(move || hash_join(&left_part, &right_part, spec))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().map_err(|_| JoinError::Worker)?)
            .collect()
    });

    Ok(Frame::vstack(&results?)?)
}
