//! Delimited-text ingestion
//!
//! The pipeline never fetches data itself; callers hand it paths or readers
//! produced by an external downloader/cache. Files ending in `.gz` are
//! decompressed transparently.

use super::frame::{Column, Frame};
use super::schema::{SchemaError, TableResult};
use super::value::{SemanticType, Value};
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Options for reading one delimited source.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Field delimiter; defaults to tab, the common format for annotation dumps.
    pub delimiter: u8,
    /// Source label attached to every column for provenance.
    pub source: String,
}

impl ReadOptions {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            delimiter: b'\t',
            source: source.into(),
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

/// Read a delimited file (optionally gzip-compressed) into a string-typed frame.
///
/// The first row is the header. Empty fields become [`Value::Null`]. Type
/// coercion happens later, when the frame is wrapped with a declared schema.
pub fn read_delimited(path: impl AsRef<Path>, options: &ReadOptions) -> TableResult<Frame> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| SchemaError::Io {
        path: path.display().to_string(),
        source,
    })?;

    let is_gzip = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("gz"))
        .unwrap_or(false);

    let reader: Box<dyn Read> = if is_gzip {
        Box::new(GzDecoder::new(file))
    } else {
        Box::new(file)
    };

    read_delimited_from(reader, &path.display().to_string(), options)
}

/// Read a delimited stream into a string-typed frame.
pub fn read_delimited_from(
    reader: impl Read,
    path: &str,
    options: &ReadOptions,
) -> TableResult<Frame> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|source| SchemaError::Delimited {
            path: path.to_string(),
            source,
        })?
        .clone();

    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); headers.len()];
    for record in csv_reader.records() {
        let record = record.map_err(|source| SchemaError::Delimited {
            path: path.to_string(),
            source,
        })?;
        for (i, field) in record.iter().enumerate() {
            let value = if field.is_empty() {
                Value::Null
            } else {
                Value::Str(field.to_string())
            };
            columns[i].push(value);
        }
    }

    let columns = headers
        .iter()
        .zip(columns)
        .map(|(name, values)| Column::new(name, options.source.clone(), SemanticType::String, values))
        .collect();

    let frame = Frame::new(columns)?;
    debug!(
        source = %options.source,
        rows = frame.n_rows(),
        cols = frame.n_cols(),
        "read delimited source"
    );
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    #[test]
    fn test_reads_tsv_with_nulls() {
        let data = "gene\ttpm\nTP53\t1.5\nBRCA1\t\n";
        let frame =
            read_delimited_from(data.as_bytes(), "inline", &ReadOptions::new("expr")).unwrap();

        assert_eq!(frame.column_names(), vec!["gene", "tpm"]);
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.value(1, 1), &Value::Null);
        assert_eq!(frame.column("gene").unwrap().source, "expr");
    }

    #[test]
    fn test_reads_csv_delimiter() {
        let data = "a,b\n1,2\n";
        let options = ReadOptions::new("t").with_delimiter(b',');
        let frame = read_delimited_from(data.as_bytes(), "inline", &options).unwrap();
        assert_eq!(frame.value(0, 1), &Value::from("2"));
    }

    #[test]
    fn test_reads_gzip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("expr.tsv.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(b"gene\ttpm\nTP53\t1.5\n").unwrap();
        encoder.finish().unwrap();

        let frame = read_delimited(&path, &ReadOptions::new("expr")).unwrap();
        assert_eq!(frame.n_rows(), 1);
        assert_eq!(frame.value(0, 0), &Value::from("TP53"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = read_delimited("/nonexistent/input.tsv", &ReadOptions::new("x"));
        assert!(matches!(result, Err(SchemaError::Io { .. })));
    }
}
