//! Lazy training-example sequences

use super::graph::{ExportError, ExportResult};
use crate::join::JoinedDataset;
use crate::table::{Frame, SchemaError, SemanticType, Value};
use std::sync::Arc;

/// One (features, label) pair. Null feature cells surface as NaN so row
/// counts stay faithful to the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub features: Vec<f64>,
    pub label: Value,
}

/// A finite, restartable sequence of (features, label) pairs over a joined
/// dataset.
///
/// Construction validates eagerly that every feature column is numeric;
/// iteration is lazy, one pass per full traversal, and [`iter`] restarts
/// from the beginning each call.
///
/// [`iter`]: SampleSequence::iter
#[derive(Debug, Clone)]
pub struct SampleSequence {
    frame: Arc<Frame>,
    feature_indices: Vec<usize>,
    feature_names: Vec<String>,
    label_index: usize,
    label_name: String,
}

impl SampleSequence {
    pub fn new(
        dataset: &JoinedDataset,
        feature_columns: &[&str],
        label_column: &str,
    ) -> ExportResult<Self> {
        let frame = dataset.frame();

        let mut feature_indices = Vec::with_capacity(feature_columns.len());
        for name in feature_columns {
            let idx = frame
                .column_index(name)
                .ok_or_else(|| SchemaError::MissingColumn {
                    table: frame.label(),
                    column: name.to_string(),
                })?;
            let col = &frame.columns()[idx];
            if col.semantic != SemanticType::Numeric {
                return Err(ExportError::NonNumericFeature {
                    column: name.to_string(),
                    semantic: col.semantic,
                });
            }
            feature_indices.push(idx);
        }

        let label_index = frame
            .column_index(label_column)
            .ok_or_else(|| SchemaError::MissingColumn {
                table: frame.label(),
                column: label_column.to_string(),
            })?;

        Ok(Self {
            frame: Arc::new(frame.clone()),
            feature_indices,
            feature_names: feature_columns.iter().map(|s| s.to_string()).collect(),
            label_index,
            label_name: label_column.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.frame.n_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn label_name(&self) -> &str {
        &self.label_name
    }

    /// A fresh iterator from the first row.
    pub fn iter(&self) -> SampleIter<'_> {
        SampleIter { seq: self, row: 0 }
    }
}

/// Build a lazy, restartable (features, label) sequence over a joined
/// dataset. Convenience wrapper around [`SampleSequence::new`].
pub fn to_sample_sequence(
    dataset: &JoinedDataset,
    feature_columns: &[&str],
    label_column: &str,
) -> ExportResult<SampleSequence> {
    SampleSequence::new(dataset, feature_columns, label_column)
}

impl<'a> IntoIterator for &'a SampleSequence {
    type Item = Sample;
    type IntoIter = SampleIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator state over one pass of a [`SampleSequence`].
#[derive(Debug)]
pub struct SampleIter<'a> {
    seq: &'a SampleSequence,
    row: usize,
}

impl Iterator for SampleIter<'_> {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        if self.row >= self.seq.frame.n_rows() {
            return None;
        }
        let row = self.row;
        self.row += 1;

        let features = self
            .seq
            .feature_indices
            .iter()
            .map(|&idx| {
                self.seq
                    .frame
                    .value(row, idx)
                    .as_f64()
                    .unwrap_or(f64::NAN)
            })
            .collect();
        let label = self.seq.frame.value(row, self.seq.label_index).clone();
        Some(Sample { features, label })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.seq.frame.n_rows() - self.row;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SampleIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::join::JoinType;
    use crate::table::Column;

    fn dataset() -> JoinedDataset {
        let frame = Frame::new(vec![
            Column::new(
                "gene",
                "expr",
                SemanticType::String,
                vec![Value::from("A"), Value::from("B")],
            ),
            Column::new(
                "tpm",
                "expr",
                SemanticType::Numeric,
                vec![Value::Float(1.0), Value::Null],
            ),
            Column::new(
                "copies",
                "cnv",
                SemanticType::Numeric,
                vec![Value::Float(2.0), Value::Float(4.0)],
            ),
            Column::new(
                "subtype",
                "clinical",
                SemanticType::Categorical,
                vec![Value::from("luminal"), Value::from("basal")],
            ),
        ])
        .unwrap();
        JoinedDataset::new(frame, JoinType::Inner, Vec::new())
    }

    #[test]
    fn test_yields_feature_label_pairs() {
        let data = dataset();
        let seq = SampleSequence::new(&data, &["tpm", "copies"], "subtype").unwrap();
        let samples: Vec<Sample> = seq.iter().collect();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].features, vec![1.0, 2.0]);
        assert_eq!(samples[0].label, Value::from("luminal"));
        assert!(samples[1].features[0].is_nan());
        assert_eq!(samples[1].features[1], 4.0);
    }

    #[test]
    fn test_reiteration_restarts() {
        let data = dataset();
        let seq = SampleSequence::new(&data, &["copies"], "subtype").unwrap();
        let first: Vec<Sample> = seq.iter().collect();
        let second: Vec<Sample> = seq.iter().collect();
        assert_eq!(first, second);
        assert_eq!(seq.iter().len(), 2);
    }

    #[test]
    fn test_non_numeric_feature_rejected_eagerly() {
        let data = dataset();
        let result = SampleSequence::new(&data, &["subtype"], "gene");
        assert!(matches!(
            result,
            Err(ExportError::NonNumericFeature { column, .. }) if column == "subtype"
        ));
    }

    #[test]
    fn test_missing_label_column_rejected() {
        let data = dataset();
        let result = SampleSequence::new(&data, &["tpm"], "absent");
        assert!(matches!(result, Err(ExportError::Schema(_))));
    }
}
