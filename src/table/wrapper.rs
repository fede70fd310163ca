//! Entity tables: validated, coerced, index-aware views of raw sources

use super::frame::{Column, Frame};
use super::schema::{SchemaError, TableResult, TableSchema};
use super::value::{SemanticType, Value};
use std::collections::HashMap;
use tracing::debug;

/// Per-row flags carried alongside the frame.
///
/// `multi_valued` marks rows whose index key appears in more than one row
/// (either duplicated in the source or produced by one-to-many key
/// expansion); `unresolved` marks rows whose key could not be mapped into
/// the canonical namespace and was retained under its raw value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowMeta {
    pub multi_valued: bool,
    pub unresolved: bool,
}

/// One distinct index key with its multi-valued flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKey {
    pub value: String,
    pub multi_valued: bool,
}

/// A single heterogeneous source normalized into an indexed representation.
///
/// Construction validates the declared key columns, coerces every column to
/// its declared semantic type, and flags duplicate-index rows as multi-valued
/// instead of collapsing them. No disk is touched.
#[derive(Debug, Clone)]
pub struct EntityTable {
    name: String,
    frame: Frame,
    schema: TableSchema,
    row_meta: Vec<RowMeta>,
}

/// Separator between components of a composite index key.
const COMPOSITE_KEY_SEP: char = ':';

/// Separator used when aggregating multiple values into one cell.
pub const MULTI_VALUE_SEP: char = '|';

impl EntityTable {
    /// Wrap a raw frame under a declared schema.
    pub fn from_frame(
        name: impl Into<String>,
        frame: Frame,
        schema: TableSchema,
    ) -> TableResult<Self> {
        let name = name.into();
        if schema.key_columns.is_empty() {
            return Err(SchemaError::NoKeyColumns { table: name });
        }
        for key in &schema.key_columns {
            if !frame.has_column(key) {
                return Err(SchemaError::MissingKeyColumn {
                    table: name,
                    column: key.clone(),
                });
            }
        }

        let frame = coerce_frame(&name, frame, &schema)?;
        let row_meta = compute_duplicate_flags(&frame, &schema.key_columns);
        debug!(
            table = %name,
            rows = frame.n_rows(),
            cols = frame.n_cols(),
            multi_valued = row_meta.iter().filter(|m| m.multi_valued).count(),
            "wrapped source table"
        );
        Ok(Self {
            name,
            frame,
            schema,
            row_meta,
        })
    }

    /// Rebuild a table from already-coerced parts, recomputing multi-valued
    /// flags but preserving the given unresolved flags. Used after key
    /// resolution rewrites the index.
    pub fn from_parts(
        name: impl Into<String>,
        frame: Frame,
        schema: TableSchema,
        unresolved: Vec<bool>,
    ) -> TableResult<Self> {
        let name = name.into();
        let mut row_meta = compute_duplicate_flags(&frame, &schema.key_columns);
        for (meta, flag) in row_meta.iter_mut().zip(unresolved) {
            meta.unresolved = flag;
        }
        Ok(Self {
            name,
            frame,
            schema,
            row_meta,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn row_meta(&self) -> &[RowMeta] {
        &self.row_meta
    }

    pub fn n_rows(&self) -> usize {
        self.frame.n_rows()
    }

    pub fn key_columns(&self) -> &[String] {
        &self.schema.key_columns
    }

    /// The index key of one row; composite keys join their components with `:`.
    pub fn index_key(&self, row: usize) -> String {
        let mut parts = Vec::with_capacity(self.schema.key_columns.len());
        for key_col in &self.schema.key_columns {
            let idx = self
                .frame
                .column_index(key_col)
                .expect("key column validated at construction");
            parts.push(self.frame.value(row, idx).to_string());
        }
        parts.join(&COMPOSITE_KEY_SEP.to_string())
    }

    /// Distinct index keys in first-occurrence order, each flagged
    /// multi-valued when it covers more than one row.
    pub fn get_index_keys(&self) -> Vec<IndexKey> {
        let mut order = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for row in 0..self.n_rows() {
            let key = self.index_key(row);
            let count = counts.entry(key.clone()).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }
        order
            .into_iter()
            .map(|value| {
                let multi_valued = counts[&value] > 1;
                IndexKey { value, multi_valued }
            })
            .collect()
    }

    /// Project a subset of attribute columns; key columns are always retained.
    pub fn select_columns(&self, subset: &[&str]) -> TableResult<EntityTable> {
        let mut names: Vec<&str> = self.schema.key_columns.iter().map(|k| k.as_str()).collect();
        for name in subset {
            if !names.contains(name) {
                names.push(name);
            }
        }
        let frame = self.frame.select(&names)?;
        let schema = TableSchema {
            key_columns: self.schema.key_columns.clone(),
            columns: self
                .schema
                .columns
                .iter()
                .filter(|c| names.contains(&c.name.as_str()))
                .cloned()
                .collect(),
        };
        Ok(Self {
            name: self.name.clone(),
            frame,
            schema,
            row_meta: self.row_meta.clone(),
        })
    }

    /// Rename columns (including key columns) per the given map.
    pub fn rename_columns(&self, renames: &HashMap<String, String>) -> TableResult<EntityTable> {
        let frame = self.frame.rename(renames)?;
        let schema = TableSchema {
            key_columns: self
                .schema
                .key_columns
                .iter()
                .map(|k| renames.get(k).cloned().unwrap_or_else(|| k.clone()))
                .collect(),
            columns: self
                .schema
                .columns
                .iter()
                .map(|c| {
                    let mut spec = c.clone();
                    if let Some(new_name) = renames.get(&c.name) {
                        spec.name = new_name.clone();
                    }
                    spec
                })
                .collect(),
        };
        Ok(Self {
            name: self.name.clone(),
            frame,
            schema,
            row_meta: self.row_meta.clone(),
        })
    }

    /// Collapse multi-valued rows into one row per index key, joining the
    /// distinct non-null values of each selected column with `|`.
    ///
    /// The aggregated columns become string-typed. The result carries no
    /// multi-valued rows by construction.
    pub fn group_concat(&self, columns: &[&str]) -> TableResult<EntityTable> {
        for name in columns {
            if !self.frame.has_column(name) {
                return Err(SchemaError::MissingColumn {
                    table: self.name.clone(),
                    column: name.to_string(),
                });
            }
        }

        // Group row indices by index key, first-occurrence order.
        let mut order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for row in 0..self.n_rows() {
            let key = self.index_key(row);
            let group = groups.entry(key.clone()).or_default();
            if group.is_empty() {
                order.push(key);
            }
            group.push(row);
        }

        let mut out_columns: Vec<Column> = Vec::new();
        for key_col in &self.schema.key_columns {
            let idx = self.frame.column_index(key_col).expect("validated");
            let source = self.frame.columns()[idx].source.clone();
            let values = order
                .iter()
                .map(|key| {
                    let first_row = groups[key][0];
                    self.frame.value(first_row, idx).clone()
                })
                .collect();
            out_columns.push(Column::new(key_col, source, SemanticType::String, values));
        }
        for name in columns {
            let idx = self.frame.column_index(name).expect("validated");
            let source = self.frame.columns()[idx].source.clone();
            let values = order
                .iter()
                .map(|key| {
                    let mut uniques: Vec<String> = Vec::new();
                    for &row in &groups[key] {
                        let cell = self.frame.value(row, idx);
                        if cell.is_null() {
                            continue;
                        }
                        let rendered = cell.to_string();
                        if !uniques.contains(&rendered) {
                            uniques.push(rendered);
                        }
                    }
                    if uniques.is_empty() {
                        Value::Null
                    } else {
                        Value::Str(uniques.join(&MULTI_VALUE_SEP.to_string()))
                    }
                })
                .collect();
            out_columns.push(Column::new(*name, source, SemanticType::String, values));
        }

        let frame = Frame::new(out_columns)?;
        let schema = TableSchema {
            key_columns: self.schema.key_columns.clone(),
            columns: columns
                .iter()
                .map(|name| super::schema::ColumnSpec {
                    name: name.to_string(),
                    semantic: SemanticType::String,
                })
                .collect(),
        };
        EntityTable::from_parts(self.name.clone(), frame, schema, Vec::new())
    }
}

/// Coerce every column of the frame to its declared semantic type and stamp
/// the table name as each column's source.
fn coerce_frame(table: &str, frame: Frame, schema: &TableSchema) -> TableResult<Frame> {
    let mut columns = Vec::with_capacity(frame.n_cols());
    for col in frame.columns() {
        let semantic = schema.semantic_of(&col.name);
        let mut values = Vec::with_capacity(col.values.len());
        for raw in &col.values {
            match semantic.coerce(raw) {
                Some(v) => values.push(v),
                None => {
                    return Err(SchemaError::TypeMismatch {
                        table: table.to_string(),
                        column: col.name.clone(),
                        value: raw.to_string(),
                        expected: semantic,
                    })
                }
            }
        }
        columns.push(Column::new(col.name.clone(), table, semantic, values));
    }
    Frame::new(columns)
}

fn compute_duplicate_flags(frame: &Frame, key_columns: &[String]) -> Vec<RowMeta> {
    let key_indices: Vec<usize> = key_columns
        .iter()
        .filter_map(|k| frame.column_index(k))
        .collect();
    let mut counts: HashMap<String, usize> = HashMap::new();
    let keys: Vec<String> = (0..frame.n_rows())
        .map(|row| {
            let parts: Vec<String> = key_indices
                .iter()
                .map(|&idx| frame.value(row, idx).to_string())
                .collect();
            parts.join(&COMPOSITE_KEY_SEP.to_string())
        })
        .collect();
    for key in &keys {
        *counts.entry(key.clone()).or_insert(0) += 1;
    }
    keys.iter()
        .map(|key| RowMeta {
            multi_valued: counts[key] > 1,
            unresolved: false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_frame() -> Frame {
        Frame::new(vec![
            Column::new(
                "gene",
                "expr",
                SemanticType::String,
                vec![Value::from("TP53"), Value::from("BRCA1"), Value::from("TP53")],
            ),
            Column::new(
                "tpm",
                "expr",
                SemanticType::String,
                vec![Value::from("1.5"), Value::from("NA"), Value::from("3")],
            ),
        ])
        .unwrap()
    }

    fn schema() -> TableSchema {
        TableSchema::new()
            .with_key("gene")
            .with_column("tpm", SemanticType::Numeric)
    }

    #[test]
    fn test_missing_key_column_fails() {
        let result = EntityTable::from_frame(
            "expr",
            raw_frame(),
            TableSchema::new().with_key("absent"),
        );
        assert!(matches!(result, Err(SchemaError::MissingKeyColumn { .. })));
    }

    #[test]
    fn test_coercion_parses_numeric_and_missing() {
        let table = EntityTable::from_frame("expr", raw_frame(), schema()).unwrap();
        let tpm = table.frame().column("tpm").unwrap();
        assert_eq!(tpm.semantic, SemanticType::Numeric);
        assert_eq!(tpm.values[0], Value::Float(1.5));
        assert_eq!(tpm.values[1], Value::Null);
    }

    #[test]
    fn test_unparseable_numeric_fails_with_context() {
        let frame = Frame::new(vec![
            Column::new("gene", "expr", SemanticType::String, vec![Value::from("A")]),
            Column::new("tpm", "expr", SemanticType::String, vec![Value::from("abc")]),
        ])
        .unwrap();
        let err = EntityTable::from_frame("expr", frame, schema()).unwrap_err();
        match err {
            SchemaError::TypeMismatch { table, column, value, .. } => {
                assert_eq!(table, "expr");
                assert_eq!(column, "tpm");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_index_flagged_multi_valued() {
        let table = EntityTable::from_frame("expr", raw_frame(), schema()).unwrap();
        let meta = table.row_meta();
        assert!(meta[0].multi_valued);
        assert!(!meta[1].multi_valued);
        assert!(meta[2].multi_valued);
    }

    #[test]
    fn test_get_index_keys_preserves_flags() {
        let table = EntityTable::from_frame("expr", raw_frame(), schema()).unwrap();
        let keys = table.get_index_keys();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0], IndexKey { value: "TP53".into(), multi_valued: true });
        assert_eq!(keys[1], IndexKey { value: "BRCA1".into(), multi_valued: false });
    }

    #[test]
    fn test_select_columns_retains_keys() {
        let table = EntityTable::from_frame("expr", raw_frame(), schema()).unwrap();
        let selected = table.select_columns(&["tpm"]).unwrap();
        assert_eq!(selected.frame().column_names(), vec!["gene", "tpm"]);
    }

    #[test]
    fn test_rename_columns_updates_keys() {
        let table = EntityTable::from_frame("expr", raw_frame(), schema()).unwrap();
        let mut renames = HashMap::new();
        renames.insert("gene".to_string(), "gene_symbol".to_string());
        let renamed = table.rename_columns(&renames).unwrap();
        assert_eq!(renamed.key_columns(), &["gene_symbol".to_string()]);
        assert!(renamed.frame().has_column("gene_symbol"));
    }

    #[test]
    fn test_group_concat_joins_unique_values() {
        let frame = Frame::new(vec![
            Column::new(
                "gene",
                "go",
                SemanticType::String,
                vec![Value::from("TP53"), Value::from("TP53"), Value::from("TP53")],
            ),
            Column::new(
                "go_id",
                "go",
                SemanticType::String,
                vec![Value::from("GO:1"), Value::from("GO:2"), Value::from("GO:1")],
            ),
        ])
        .unwrap();
        let table =
            EntityTable::from_frame("go", frame, TableSchema::new().with_key("gene")).unwrap();
        let collapsed = table.group_concat(&["go_id"]).unwrap();
        assert_eq!(collapsed.n_rows(), 1);
        assert_eq!(
            collapsed.frame().value(0, 1),
            &Value::from("GO:1|GO:2")
        );
        assert!(!collapsed.row_meta()[0].multi_valued);
    }
}
