//! Cell values and semantic column types

use serde::{Deserialize, Serialize};

/// A single cell in a tabular source.
///
/// Mirrors the two physical column families the pipeline works with:
/// floating-point numerics and text. Missing data is `Null` in either family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Float(f64),
    Str(String),
}

/// Semantic column types a source declares for coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticType {
    /// Floating-point measurements (expression levels, scores, dosages)
    Numeric,
    /// Discrete labels (tissue type, variant class)
    Categorical,
    /// Free-form text (identifiers, descriptions)
    String,
    /// Biological sequences (nucleotide or amino acid)
    Sequence,
}

/// Text markers treated as missing data during numeric coercion.
const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "."];

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell, parsing text if necessary.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Render the cell as a partition directory label.
    ///
    /// Nulls become `__null__`; characters outside `[A-Za-z0-9._-]` are
    /// replaced with `_` so every label is a valid directory name.
    pub fn partition_label(&self) -> String {
        let raw = match self {
            Value::Null => return "__null__".to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
        };
        raw.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, ""),
            Value::Float(v) => write!(f, "{}", v),
            Value::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl SemanticType {
    /// Coerce a raw cell into this semantic type.
    ///
    /// Returns `None` when a text cell cannot be parsed as a numeric;
    /// the caller reports that as a type mismatch with full context.
    pub fn coerce(&self, raw: &Value) -> Option<Value> {
        match self {
            SemanticType::Numeric => match raw {
                Value::Null => Some(Value::Null),
                Value::Float(f) => Some(Value::Float(*f)),
                Value::Str(s) => {
                    let trimmed = s.trim();
                    if MISSING_MARKERS.contains(&trimmed) {
                        Some(Value::Null)
                    } else {
                        trimmed.parse::<f64>().ok().map(Value::Float)
                    }
                }
            },
            SemanticType::Categorical | SemanticType::String | SemanticType::Sequence => match raw {
                Value::Null => Some(Value::Null),
                Value::Float(f) => Some(Value::Str(f.to_string())),
                Value::Str(s) => {
                    if s.is_empty() {
                        Some(Value::Null)
                    } else {
                        Some(Value::Str(s.clone()))
                    }
                }
            },
        }
    }
}

impl std::fmt::Display for SemanticType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SemanticType::Numeric => "numeric",
            SemanticType::Categorical => "categorical",
            SemanticType::String => "string",
            SemanticType::Sequence => "sequence",
        };
        write!(f, "{}", name)
    }
}
