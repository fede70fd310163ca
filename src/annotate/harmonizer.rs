//! Harmonizing heterogeneous annotation sources into a common record schema

use super::adapter::{AdapterConfig, AdapterMismatchError, AdapterRegistry, RelationType};
use crate::resolve::{
    Identifier, KeyMapping, KeyResolver, Namespace, ResolveError, ResolveOptions,
};
use crate::table::{Column, EntityTable, Frame, SchemaError, SemanticType, TableSchema, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// A harmonized edge or attribute sourced from one external database.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationRecord {
    /// Canonical subject key (or the raw identifier when unresolved).
    pub subject: Identifier,
    /// Canonical object key; `None` for attribute-only records.
    pub object: Option<Identifier>,
    pub relation: RelationType,
    /// Source database identifier.
    pub database: String,
    /// Optional confidence/score.
    pub score: Option<f64>,
    /// Extra columns carried through per the adapter mapping.
    pub attributes: BTreeMap<String, Value>,
    /// True when the subject or object kept its raw identifier.
    pub unresolved: bool,
}

/// Errors raised while harmonizing an annotation source.
#[derive(Debug, Error)]
pub enum AnnotateError {
    #[error(transparent)]
    Adapter(#[from] AdapterMismatchError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no adapter registered for database '{0}'")]
    UnknownDatabase(String),

    #[error("failed to parse adapter config: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("I/O error reading adapter config '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type for harmonization operations.
pub type AnnotateResult<T> = Result<T, AnnotateError>;

/// Output of one harmonization pass.
#[derive(Debug, Clone)]
pub struct Harmonized {
    pub records: Vec<AnnotationRecord>,
    /// Source rows skipped because their subject cell was null.
    pub null_subject_rows: usize,
    /// The subject key mapping built during the pass.
    pub subject_mapping: KeyMapping,
}

/// Integrates per-database annotation tables into the common record schema.
///
/// Column-name heterogeneity is absorbed by the registered adapters; keys
/// are normalized through the resolver before any record is emitted.
#[derive(Debug, Clone)]
pub struct Harmonizer {
    registry: Arc<AdapterRegistry>,
    resolver: KeyResolver,
}

impl Harmonizer {
    pub fn new(registry: Arc<AdapterRegistry>, resolver: KeyResolver) -> Self {
        Self { registry, resolver }
    }

    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// Harmonize one raw annotation frame through its registered adapter.
    pub fn harmonize(
        &self,
        database: &str,
        frame: &Frame,
        options: &ResolveOptions,
    ) -> AnnotateResult<Harmonized> {
        let adapter = self
            .registry
            .get(database)
            .ok_or_else(|| AnnotateError::UnknownDatabase(database.to_string()))?;
        adapter.validate()?;
        check_source_columns(&adapter, frame)?;

        let subject_col = frame
            .column_index(adapter.subject_column().expect("validated"))
            .expect("checked against source");
        let object_col = adapter
            .object_column()
            .map(|name| frame.column_index(name).expect("checked against source"));
        let score_col = adapter
            .score_column()
            .map(|name| frame.column_index(name).expect("checked against source"));
        let attribute_cols: Vec<(String, usize)> = adapter
            .attribute_columns()
            .map(|(semantic, source)| {
                (
                    semantic.to_string(),
                    frame.column_index(source).expect("checked against source"),
                )
            })
            .collect();

        let subject_mapping = self.resolver.build_mapping(
            column_strings(frame, subject_col),
            &adapter.source_namespace,
            &adapter.namespace,
            options,
        )?;
        let object_mapping = match object_col {
            Some(idx) => Some(self.resolver.build_mapping(
                column_strings(frame, idx),
                adapter.object_source_namespace(),
                adapter.object_namespace(),
                options,
            )?),
            None => None,
        };

        let mut records = Vec::new();
        let mut null_subject_rows = 0usize;
        for row in 0..frame.n_rows() {
            let subject_cell = frame.value(row, subject_col);
            let Some(raw_subject) = subject_cell.as_str() else {
                null_subject_rows += 1;
                continue;
            };

            let (subjects, subject_unresolved) = expand_keys(
                raw_subject,
                &subject_mapping,
                &adapter.source_namespace,
                &adapter.namespace,
            );

            let (objects, object_unresolved) = match (object_col, &object_mapping) {
                (Some(idx), Some(mapping)) => match frame.value(row, idx).as_str() {
                    Some(raw_object) => {
                        let (keys, unresolved) = expand_keys(
                            raw_object,
                            mapping,
                            adapter.object_source_namespace(),
                            adapter.object_namespace(),
                        );
                        (keys.into_iter().map(Some).collect::<Vec<_>>(), unresolved)
                    }
                    None => (vec![None], false),
                },
                _ => (vec![None], false),
            };

            let score = score_col.and_then(|idx| frame.value(row, idx).as_f64());
            let attributes: BTreeMap<String, Value> = attribute_cols
                .iter()
                .map(|(semantic, idx)| (semantic.clone(), frame.value(row, *idx).clone()))
                .collect();

            for subject in &subjects {
                for object in &objects {
                    records.push(AnnotationRecord {
                        subject: subject.clone(),
                        object: object.clone(),
                        relation: adapter.relation,
                        database: adapter.database.clone(),
                        score,
                        attributes: attributes.clone(),
                        unresolved: subject_unresolved || object_unresolved,
                    });
                }
            }
        }

        if null_subject_rows > 0 {
            warn!(
                database,
                rows = null_subject_rows,
                "skipped annotation rows with null subject"
            );
        }
        debug!(
            database,
            rows_in = frame.n_rows(),
            records = records.len(),
            "harmonized annotation source"
        );

        Ok(Harmonized {
            records,
            null_subject_rows,
            subject_mapping,
        })
    }
}

/// Column names used when projecting records as a table.
pub const RECORD_SUBJECT: &str = "subject";
pub const RECORD_OBJECT: &str = "object";
pub const RECORD_RELATION: &str = "relation";
pub const RECORD_DATABASE: &str = "database";
pub const RECORD_SCORE: &str = "score";

/// Project harmonized records as an entity table keyed by subject, so an
/// annotation set enters the join engine like any other table.
pub fn records_to_table(
    records: &[AnnotationRecord],
    name: impl Into<String>,
) -> AnnotateResult<EntityTable> {
    let name = name.into();

    let mut attribute_names: Vec<String> = Vec::new();
    for record in records {
        for key in record.attributes.keys() {
            if !attribute_names.contains(key) {
                attribute_names.push(key.clone());
            }
        }
    }
    attribute_names.sort();

    let n = records.len();
    let mut subject = Vec::with_capacity(n);
    let mut object = Vec::with_capacity(n);
    let mut relation = Vec::with_capacity(n);
    let mut database = Vec::with_capacity(n);
    let mut score = Vec::with_capacity(n);
    let mut attributes: Vec<Vec<Value>> = vec![Vec::with_capacity(n); attribute_names.len()];
    let mut unresolved = Vec::with_capacity(n);

    for record in records {
        subject.push(Value::Str(record.subject.value.clone()));
        object.push(match &record.object {
            Some(id) => Value::Str(id.value.clone()),
            None => Value::Null,
        });
        relation.push(Value::Str(record.relation.to_string()));
        database.push(Value::Str(record.database.clone()));
        score.push(match record.score {
            Some(s) => Value::Float(s),
            None => Value::Null,
        });
        for (values, attr_name) in attributes.iter_mut().zip(&attribute_names) {
            values.push(record.attributes.get(attr_name).cloned().unwrap_or(Value::Null));
        }
        unresolved.push(record.unresolved);
    }

    let mut columns = vec![
        Column::new(RECORD_SUBJECT, name.clone(), SemanticType::String, subject),
        Column::new(RECORD_OBJECT, name.clone(), SemanticType::String, object),
        Column::new(RECORD_RELATION, name.clone(), SemanticType::Categorical, relation),
        Column::new(RECORD_DATABASE, name.clone(), SemanticType::Categorical, database),
        Column::new(RECORD_SCORE, name.clone(), SemanticType::Numeric, score),
    ];
    for (attr_name, values) in attribute_names.iter().zip(attributes) {
        columns.push(Column::new(attr_name, name.clone(), SemanticType::String, values));
    }

    let frame = Frame::new(columns)?;
    let mut schema = TableSchema::new()
        .with_key(RECORD_SUBJECT)
        .with_column(RECORD_OBJECT, SemanticType::String)
        .with_column(RECORD_RELATION, SemanticType::Categorical)
        .with_column(RECORD_DATABASE, SemanticType::Categorical)
        .with_column(RECORD_SCORE, SemanticType::Numeric);
    for attr_name in &attribute_names {
        schema = schema.with_column(attr_name, SemanticType::String);
    }

    Ok(EntityTable::from_parts(name, frame, schema, unresolved)?)
}

fn check_source_columns(adapter: &AdapterConfig, frame: &Frame) -> Result<(), AdapterMismatchError> {
    for (semantic, source) in &adapter.columns {
        if !frame.has_column(source) {
            return Err(AdapterMismatchError::NotInSource {
                database: adapter.database.clone(),
                column: semantic.clone(),
                source_column: source.clone(),
            });
        }
    }
    Ok(())
}

fn column_strings(frame: &Frame, col: usize) -> impl Iterator<Item = &str> {
    (0..frame.n_rows()).filter_map(move |row| frame.value(row, col).as_str())
}

/// Expand one raw identifier through a mapping into canonical identifiers,
/// falling back to the raw identifier (flagged) when unmapped.
fn expand_keys(
    raw: &str,
    mapping: &KeyMapping,
    source: &Namespace,
    target: &Namespace,
) -> (Vec<Identifier>, bool) {
    match mapping.entries.get(raw) {
        Some(entry) if !entry.canonical.is_empty() => (
            entry
                .canonical
                .iter()
                .map(|key| Identifier::new(target.clone(), key.clone()))
                .collect(),
            false,
        ),
        _ => (vec![Identifier::new(source.clone(), raw)], true),
    }
}
