//! Frame ⇄ Arrow conversion for Parquet artifacts
//!
//! Numeric columns persist as nullable Float64, every other semantic type as
//! nullable Utf8, so a written frame reads back cell-for-cell identical.

use super::descriptor::SchemaDescriptor;
use super::store::{StoreError, StoreResult};
use crate::table::{Column, Frame, SemanticType, Value};
use arrow::array::{Array, ArrayRef, Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::sync::Arc;

/// Convert a frame into one Arrow record batch.
pub(crate) fn frame_to_batch(frame: &Frame) -> StoreResult<RecordBatch> {
    let mut fields = Vec::with_capacity(frame.n_cols());
    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(frame.n_cols());

    for col in frame.columns() {
        match col.semantic {
            SemanticType::Numeric => {
                let values: StoreResult<Vec<Option<f64>>> = col
                    .values
                    .iter()
                    .map(|v| match v {
                        Value::Null => Ok(None),
                        Value::Float(f) => Ok(Some(*f)),
                        Value::Str(s) => Err(StoreError::Codec {
                            detail: format!(
                                "numeric column '{}' holds non-numeric cell '{}'",
                                col.name, s
                            ),
                        }),
                    })
                    .collect();
                fields.push(Field::new(&col.name, DataType::Float64, true));
                arrays.push(Arc::new(Float64Array::from(values?)));
            }
            _ => {
                let values: Vec<Option<String>> = col
                    .values
                    .iter()
                    .map(|v| match v {
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect();
                fields.push(Field::new(&col.name, DataType::Utf8, true));
                arrays.push(Arc::new(StringArray::from(values)));
            }
        }
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(StoreError::Arrow)
}

/// Reassemble a frame from record batches, using the partition descriptor
/// for column names, semantic types, and provenance.
pub(crate) fn batches_to_frame(
    batches: &[RecordBatch],
    descriptor: &SchemaDescriptor,
) -> StoreResult<Frame> {
    let mut columns: Vec<Column> = descriptor
        .columns
        .iter()
        .map(|c| Column::new(c.name.clone(), c.source.clone(), c.semantic, Vec::new()))
        .collect();

    for batch in batches {
        if batch.num_columns() != columns.len() {
            return Err(StoreError::Codec {
                detail: format!(
                    "artifact has {} columns, descriptor declares {}",
                    batch.num_columns(),
                    columns.len()
                ),
            });
        }
        for (idx, col) in columns.iter_mut().enumerate() {
            let array = batch.column(idx);
            match col.semantic {
                SemanticType::Numeric => {
                    let floats = array
                        .as_any()
                        .downcast_ref::<Float64Array>()
                        .ok_or_else(|| StoreError::Codec {
                            detail: format!("column '{}' is not Float64 on disk", col.name),
                        })?;
                    for i in 0..floats.len() {
                        col.values.push(if floats.is_null(i) {
                            Value::Null
                        } else {
                            Value::Float(floats.value(i))
                        });
                    }
                }
                _ => {
                    let strings = array
                        .as_any()
                        .downcast_ref::<StringArray>()
                        .ok_or_else(|| StoreError::Codec {
                            detail: format!("column '{}' is not Utf8 on disk", col.name),
                        })?;
                    for i in 0..strings.len() {
                        col.values.push(if strings.is_null(i) {
                            Value::Null
                        } else {
                            Value::Str(strings.value(i).to_string())
                        });
                    }
                }
            }
        }
    }

    Ok(Frame::new(columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::JoinType;

    fn frame() -> Frame {
        Frame::new(vec![
            Column::new(
                "gene",
                "expr",
                SemanticType::String,
                vec![Value::from("TP53"), Value::Null],
            ),
            Column::new(
                "tpm",
                "expr",
                SemanticType::Numeric,
                vec![Value::Float(1.5), Value::Null],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_round_trip_preserves_nulls_and_values() {
        let original = frame();
        let batch = frame_to_batch(&original).unwrap();
        let descriptor = SchemaDescriptor::from_frame("d", "p", &original, JoinType::Inner);
        let restored = batches_to_frame(&[batch], &descriptor).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_numeric_column_with_text_cell_fails() {
        let bad = Frame::new(vec![Column::new(
            "tpm",
            "expr",
            SemanticType::Numeric,
            vec![Value::from("oops")],
        )])
        .unwrap();
        assert!(matches!(
            frame_to_batch(&bad),
            Err(StoreError::Codec { .. })
        ));
    }
}
