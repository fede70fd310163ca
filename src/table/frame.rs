//! In-memory columnar frame

use super::schema::{SchemaError, TableResult};
use super::value::{SemanticType, Value};
use std::collections::HashMap;

/// One named column with its cell values, semantic type, and the name of the
/// source table that contributed it (join provenance).
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub source: String,
    pub semantic: SemanticType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<String>,
        semantic: SemanticType,
        values: Vec<Value>,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            semantic,
            values,
        }
    }
}

/// An ordered collection of equal-length columns.
///
/// The frame is the unit every pipeline stage consumes and produces: readers
/// fill it with text cells, the wrapper coerces it, joins combine frames, and
/// the store persists them. Column names are unique within a frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    /// Build a frame, validating column-name uniqueness and equal lengths.
    pub fn new(columns: Vec<Column>) -> TableResult<Self> {
        let table = columns
            .first()
            .map(|c| c.source.clone())
            .unwrap_or_default();
        let expected = columns.first().map(|c| c.values.len()).unwrap_or(0);
        let mut seen = HashMap::new();
        for col in &columns {
            if seen.insert(col.name.clone(), ()).is_some() {
                return Err(SchemaError::DuplicateColumn {
                    table,
                    column: col.name.clone(),
                });
            }
            if col.values.len() != expected {
                return Err(SchemaError::RaggedColumns {
                    table,
                    column: col.name.clone(),
                    expected,
                    actual: col.values.len(),
                });
            }
        }
        Ok(Self { columns })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(|c| c.values.len()).unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Label used when reporting errors against this frame: the source of
    /// the first column, which for unjoined frames is the table name.
    pub fn label(&self) -> String {
        self.columns
            .first()
            .map(|c| c.source.clone())
            .unwrap_or_else(|| "<empty>".to_string())
    }

    pub fn value(&self, row: usize, col: usize) -> &Value {
        &self.columns[col].values[row]
    }

    /// Project a subset of columns, preserving the requested order.
    pub fn select(&self, names: &[&str]) -> TableResult<Frame> {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let col = self
                .column(name)
                .ok_or_else(|| SchemaError::MissingColumn {
                    table: self.label(),
                    column: name.to_string(),
                })?;
            selected.push(col.clone());
        }
        Frame::new(selected)
    }

    /// Rename columns per the given map; unmapped columns keep their names.
    pub fn rename(&self, renames: &HashMap<String, String>) -> TableResult<Frame> {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                let mut col = c.clone();
                if let Some(new_name) = renames.get(&c.name) {
                    col.name = new_name.clone();
                }
                col
            })
            .collect();
        Frame::new(columns)
    }

    /// Row subset in the given order (rows may repeat).
    pub fn take(&self, rows: &[usize]) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|c| Column {
                name: c.name.clone(),
                source: c.source.clone(),
                semantic: c.semantic,
                values: rows.iter().map(|&r| c.values[r].clone()).collect(),
            })
            .collect();
        Frame { columns }
    }

    /// Vertically concatenate frames with identical column layouts.
    ///
    /// Column name, order, and semantic type must match exactly; sources are
    /// taken from the first frame.
    pub fn vstack(frames: &[Frame]) -> TableResult<Frame> {
        let Some(first) = frames.first() else {
            return Ok(Frame::empty());
        };
        let mut columns = first.columns.clone();
        for frame in &frames[1..] {
            if frame.n_cols() != first.n_cols() {
                return Err(SchemaError::MissingColumn {
                    table: frame.label(),
                    column: first
                        .columns
                        .get(frame.n_cols())
                        .map(|c| c.name.clone())
                        .unwrap_or_default(),
                });
            }
            for (target, col) in columns.iter_mut().zip(frame.columns.iter()) {
                if target.name != col.name || target.semantic != col.semantic {
                    return Err(SchemaError::MissingColumn {
                        table: frame.label(),
                        column: target.name.clone(),
                    });
                }
                target.values.extend(col.values.iter().cloned());
            }
        }
        Ok(Frame { columns })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> Frame {
        Frame::new(vec![
            Column::new(
                "gene",
                "t1",
                SemanticType::String,
                vec![Value::from("TP53"), Value::from("BRCA1")],
            ),
            Column::new(
                "tpm",
                "t1",
                SemanticType::Numeric,
                vec![Value::Float(1.5), Value::Float(2.5)],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_new_rejects_duplicate_columns() {
        let result = Frame::new(vec![
            Column::new("a", "t", SemanticType::String, vec![]),
            Column::new("a", "t", SemanticType::String, vec![]),
        ]);
        assert!(matches!(result, Err(SchemaError::DuplicateColumn { .. })));
    }

    #[test]
    fn test_new_rejects_ragged_columns() {
        let result = Frame::new(vec![
            Column::new("a", "t", SemanticType::String, vec![Value::from("x")]),
            Column::new("b", "t", SemanticType::String, vec![]),
        ]);
        assert!(matches!(result, Err(SchemaError::RaggedColumns { .. })));
    }

    #[test]
    fn test_select_preserves_order() {
        let frame = sample_frame();
        let projected = frame.select(&["tpm", "gene"]).unwrap();
        assert_eq!(projected.column_names(), vec!["tpm", "gene"]);
    }

    #[test]
    fn test_select_missing_column() {
        let frame = sample_frame();
        let result = frame.select(&["absent"]);
        assert!(matches!(result, Err(SchemaError::MissingColumn { .. })));
    }

    #[test]
    fn test_take_repeats_rows() {
        let frame = sample_frame();
        let taken = frame.take(&[1, 1, 0]);
        assert_eq!(taken.n_rows(), 3);
        assert_eq!(taken.value(0, 0), &Value::from("BRCA1"));
        assert_eq!(taken.value(2, 0), &Value::from("TP53"));
    }

    #[test]
    fn test_vstack_concatenates() {
        let frame = sample_frame();
        let stacked = Frame::vstack(&[frame.clone(), frame]).unwrap();
        assert_eq!(stacked.n_rows(), 4);
        assert_eq!(stacked.n_cols(), 2);
    }
}
