//! Partitioned columnar store
//!
//! Layout on disk:
//!
//! ```text
//! <root>/<dataset>/<partition>/part-00000.parquet
//! <root>/<dataset>/<partition>/schema.json
//! ```
//!
//! Writes are staged under `<dataset>/.staging-<uuid>` and renamed into
//! place only after every partition has been validated and fully written, so
//! an abandoned or failed write never leaves a visible partial partition.

use super::codec::{batches_to_frame, frame_to_batch};
use super::descriptor::{SchemaConflictError, SchemaDescriptor};
use crate::join::{JoinType, JoinedDataset};
use crate::table::{Frame, SchemaError};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Descriptor file name inside each partition directory.
const SCHEMA_FILE: &str = "schema.json";
/// Prefix of staging directories; readers skip anything dot-prefixed.
const STAGING_PREFIX: &str = ".staging-";

/// Errors raised by the columnar store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    SchemaConflict(#[from] SchemaConflictError),

    #[error("I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("descriptor error at '{path}': {source}")]
    Descriptor {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("artifact does not match its descriptor: {detail}")]
    Codec { detail: String },

    #[error("partition column '{column}' not found in dataset '{dataset}'")]
    MissingPartitionColumn { dataset: String, column: String },

    #[error("dataset '{dataset}' not found under '{root}'")]
    DatasetNotFound { dataset: String, root: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Disk-backed store of joined datasets, addressed by dataset name and
/// partition key, living past any single pipeline run.
#[derive(Debug, Clone)]
pub struct ColumnarStore {
    root: PathBuf,
}

impl ColumnarStore {
    /// Open (creating if needed) a store rooted at the given directory.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(io_err(&root))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Persist a joined dataset, split into one partition per distinct value
    /// of `partition_key`. Returns the partition labels written.
    ///
    /// Writing into an existing partition appends a new artifact after the
    /// stored schema has been validated; any mismatch fails the whole write
    /// before a single byte lands outside the staging directory.
    pub fn write(
        &self,
        dataset: &str,
        data: &JoinedDataset,
        partition_key: &str,
    ) -> StoreResult<Vec<String>> {
        let frame = data.frame();
        let part_idx =
            frame
                .column_index(partition_key)
                .ok_or_else(|| StoreError::MissingPartitionColumn {
                    dataset: dataset.to_string(),
                    column: partition_key.to_string(),
                })?;

        // Group rows by partition label, first-seen order.
        let mut labels: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<usize>> = HashMap::new();
        for row in 0..frame.n_rows() {
            let label = frame.value(row, part_idx).partition_label();
            let group = groups.entry(label.clone()).or_default();
            if group.is_empty() {
                labels.push(label);
            }
            group.push(row);
        }

        let dataset_dir = self.root.join(dataset);
        fs::create_dir_all(&dataset_dir).map_err(io_err(&dataset_dir))?;

        // Validate every partition against its stored schema before any
        // artifact is written; the first conflict aborts the whole write.
        struct Pending {
            label: String,
            frame: Frame,
            descriptor: SchemaDescriptor,
            existing_parts: usize,
            exists: bool,
        }
        let mut pending: Vec<Pending> = Vec::with_capacity(labels.len());
        for label in &labels {
            let sub = frame.take(&groups[label]);
            let mut descriptor =
                SchemaDescriptor::from_frame(dataset, label.clone(), &sub, data.join_type());
            let final_dir = dataset_dir.join(label);
            let (existing_parts, exists) = if final_dir.is_dir() {
                let existing = SchemaDescriptor::load(&final_dir.join(SCHEMA_FILE))?;
                existing.matches(&descriptor)?;
                descriptor.rows += existing.rows;
                (count_artifacts(&final_dir)?, true)
            } else {
                (0, false)
            };
            pending.push(Pending {
                label: label.clone(),
                frame: sub,
                descriptor,
                existing_parts,
                exists,
            });
        }

        // Stage all artifacts and descriptors.
        let staging = dataset_dir.join(format!("{}{}", STAGING_PREFIX, Uuid::new_v4()));
        for entry in &pending {
            let staged_dir = staging.join(&entry.label);
            fs::create_dir_all(&staged_dir).map_err(io_err(&staged_dir))?;
            let part_path = staged_dir.join(artifact_name(entry.existing_parts));
            write_artifact(&part_path, &entry.frame)?;
            entry.descriptor.save(&staged_dir.join(SCHEMA_FILE))?;
            debug!(
                dataset,
                partition = %entry.label,
                rows = entry.frame.n_rows(),
                "staged partition artifact"
            );
        }

        // Commit: rename staged work into place.
        for entry in &pending {
            let staged_dir = staging.join(&entry.label);
            let final_dir = dataset_dir.join(&entry.label);
            if entry.exists {
                let artifact = artifact_name(entry.existing_parts);
                fs::rename(staged_dir.join(&artifact), final_dir.join(&artifact))
                    .map_err(io_err(&final_dir))?;
                fs::rename(staged_dir.join(SCHEMA_FILE), final_dir.join(SCHEMA_FILE))
                    .map_err(io_err(&final_dir))?;
            } else {
                fs::rename(&staged_dir, &final_dir).map_err(io_err(&final_dir))?;
            }
        }
        let _ = fs::remove_dir_all(&staging);

        info!(
            dataset,
            partitions = labels.len(),
            rows = frame.n_rows(),
            "persisted dataset"
        );
        Ok(labels)
    }

    /// Open a lazy view over a dataset's partitions.
    ///
    /// `filter` prunes by partition label using directory names alone;
    /// excluded partitions are never opened. Descriptors of the selected
    /// partitions are validated (including cross-partition schema equality)
    /// before any data scan.
    pub fn read(&self, dataset: &str, filter: Option<&[&str]>) -> StoreResult<PartitionScan> {
        let dataset_dir = self.root.join(dataset);
        if !dataset_dir.is_dir() {
            return Err(StoreError::DatasetNotFound {
                dataset: dataset.to_string(),
                root: self.root.display().to_string(),
            });
        }

        let mut selected: Vec<(String, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&dataset_dir).map_err(io_err(&dataset_dir))? {
            let entry = entry.map_err(io_err(&dataset_dir))?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let label = entry.file_name().to_string_lossy().to_string();
            if label.starts_with('.') {
                continue;
            }
            if let Some(wanted) = filter {
                if !wanted.contains(&label.as_str()) {
                    continue;
                }
            }
            selected.push((label, path));
        }
        selected.sort_by(|a, b| a.0.cmp(&b.0));

        let mut partitions = Vec::with_capacity(selected.len());
        let mut reference: Option<SchemaDescriptor> = None;
        for (label, dir) in selected {
            let descriptor = SchemaDescriptor::load(&dir.join(SCHEMA_FILE))?;
            if let Some(reference) = &reference {
                reference.matches(&descriptor)?;
            } else {
                reference = Some(descriptor.clone());
            }
            partitions.push(PartitionHandle {
                label,
                dir,
                descriptor,
            });
        }

        debug!(dataset, partitions = partitions.len(), "opened partition scan");
        Ok(PartitionScan { partitions })
    }
}

/// One selected partition: directory, validated descriptor, no data loaded.
#[derive(Debug, Clone)]
pub struct PartitionHandle {
    label: String,
    dir: PathBuf,
    descriptor: SchemaDescriptor,
}

impl PartitionHandle {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn descriptor(&self) -> &SchemaDescriptor {
        &self.descriptor
    }

    /// Read this partition's artifacts into a frame.
    pub fn read_frame(&self) -> StoreResult<Frame> {
        let mut artifact_paths: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(&self.dir).map_err(io_err(&self.dir))? {
            let entry = entry.map_err(io_err(&self.dir))?;
            let path = entry.path();
            if path.extension().map(|e| e == "parquet").unwrap_or(false) {
                artifact_paths.push(path);
            }
        }
        artifact_paths.sort();

        let mut batches = Vec::new();
        for path in artifact_paths {
            let file = File::open(&path).map_err(io_err(&path))?;
            let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
            for batch in reader {
                batches.push(batch?);
            }
        }
        batches_to_frame(&batches, &self.descriptor)
    }
}

/// A lazy view over selected partitions, reconstructable into a joined
/// dataset without loading excluded partitions.
#[derive(Debug, Clone)]
pub struct PartitionScan {
    partitions: Vec<PartitionHandle>,
}

impl PartitionScan {
    pub fn partitions(&self) -> &[PartitionHandle] {
        &self.partitions
    }

    pub fn labels(&self) -> Vec<&str> {
        self.partitions.iter().map(|p| p.label.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Stream partition frames one at a time, in label order.
    pub fn iter_frames(&self) -> impl Iterator<Item = StoreResult<Frame>> + '_ {
        self.partitions.iter().map(|p| p.read_frame())
    }

    /// Materialize every selected partition into one frame.
    pub fn collect(&self) -> StoreResult<Frame> {
        let frames: StoreResult<Vec<Frame>> = self.iter_frames().collect();
        Ok(Frame::vstack(&frames?)?)
    }

    /// Materialize into a joined dataset carrying the persisted join type.
    pub fn collect_dataset(&self) -> StoreResult<JoinedDataset> {
        let join_type = self
            .partitions
            .first()
            .map(|p| p.descriptor.join_type)
            .unwrap_or(JoinType::Inner);
        Ok(JoinedDataset::new(self.collect()?, join_type, Vec::new()))
    }
}

fn artifact_name(index: usize) -> String {
    format!("part-{:05}.parquet", index)
}

fn count_artifacts(dir: &Path) -> StoreResult<usize> {
    let mut count = 0;
    for entry in fs::read_dir(dir).map_err(io_err(dir))? {
        let entry = entry.map_err(io_err(dir))?;
        if entry
            .path()
            .extension()
            .map(|e| e == "parquet")
            .unwrap_or(false)
        {
            count += 1;
        }
    }
    Ok(count)
}

fn write_artifact(path: &Path, frame: &Frame) -> StoreResult<()> {
    let batch = frame_to_batch(frame)?;
    let file = File::create(path).map_err(io_err(path))?;
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Column, SemanticType, Value};

    fn dataset() -> JoinedDataset {
        let frame = Frame::new(vec![
            Column::new(
                "gene",
                "expr",
                SemanticType::String,
                vec![Value::from("TP53"), Value::from("BRCA1"), Value::from("EGFR")],
            ),
            Column::new(
                "chrom",
                "expr",
                SemanticType::Categorical,
                vec![Value::from("chr17"), Value::from("chr17"), Value::from("chr7")],
            ),
            Column::new(
                "tpm",
                "expr",
                SemanticType::Numeric,
                vec![Value::Float(1.0), Value::Float(2.0), Value::Null],
            ),
        ])
        .unwrap();
        JoinedDataset::new(frame, JoinType::Inner, vec![("expr".to_string(), 3)])
    }

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ColumnarStore::open(dir.path()).unwrap();
        let data = dataset();

        let mut labels = store.write("omics", &data, "chrom").unwrap();
        labels.sort();
        assert_eq!(labels, vec!["chr17", "chr7"]);

        let scan = store.read("omics", None).unwrap();
        let restored = scan.collect_dataset().unwrap();
        assert_eq!(restored.rows_after(), 3);
        assert_eq!(restored.join_type(), JoinType::Inner);

        // Same values per gene regardless of partition order.
        let frame = restored.frame();
        let gene_idx = frame.column_index("gene").unwrap();
        let tpm_idx = frame.column_index("tpm").unwrap();
        let mut rows: Vec<(String, String)> = (0..frame.n_rows())
            .map(|r| {
                (
                    frame.value(r, gene_idx).to_string(),
                    frame.value(r, tpm_idx).to_string(),
                )
            })
            .collect();
        rows.sort();
        assert_eq!(
            rows,
            vec![
                ("BRCA1".to_string(), "2".to_string()),
                ("EGFR".to_string(), "".to_string()),
                ("TP53".to_string(), "1".to_string()),
            ]
        );
    }

    #[test]
    fn test_partition_pruning_skips_excluded_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = ColumnarStore::open(dir.path()).unwrap();
        store.write("omics", &dataset(), "chrom").unwrap();

        // Corrupt the excluded partition's artifact: a pruned read must
        // never open it.
        let chr7_artifact = dir.path().join("omics/chr7").join(artifact_name(0));
        fs::write(&chr7_artifact, b"garbage").unwrap();

        let scan = store.read("omics", Some(&["chr17"])).unwrap();
        assert_eq!(scan.labels(), vec!["chr17"]);
        let frame = scan.collect().unwrap();
        assert_eq!(frame.n_rows(), 2);
    }

    #[test]
    fn test_schema_conflict_leaves_partition_unmodified() {
        let dir = tempfile::tempdir().unwrap();
        let store = ColumnarStore::open(dir.path()).unwrap();
        store.write("omics", &dataset(), "chrom").unwrap();

        // Same columns, but tpm is now categorical text.
        let changed = Frame::new(vec![
            Column::new("gene", "expr", SemanticType::String, vec![Value::from("KRAS")]),
            Column::new("chrom", "expr", SemanticType::Categorical, vec![Value::from("chr17")]),
            Column::new("tpm", "expr", SemanticType::Categorical, vec![Value::from("high")]),
        ])
        .unwrap();
        let bad = JoinedDataset::new(changed, JoinType::Inner, Vec::new());

        let err = store.write("omics", &bad, "chrom").unwrap_err();
        assert!(matches!(err, StoreError::SchemaConflict(_)));

        // Existing partition still reads back exactly as written.
        let scan = store.read("omics", Some(&["chr17"])).unwrap();
        let frame = scan.collect().unwrap();
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(scan.partitions()[0].descriptor().rows, 2);
    }

    #[test]
    fn test_merge_appends_artifact_and_updates_rows() {
        let dir = tempfile::tempdir().unwrap();
        let store = ColumnarStore::open(dir.path()).unwrap();
        store.write("omics", &dataset(), "chrom").unwrap();
        store.write("omics", &dataset(), "chrom").unwrap();

        let scan = store.read("omics", Some(&["chr17"])).unwrap();
        assert_eq!(scan.partitions()[0].descriptor().rows, 4);
        assert_eq!(scan.collect().unwrap().n_rows(), 4);
    }

    #[test]
    fn test_no_staging_dirs_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ColumnarStore::open(dir.path()).unwrap();
        store.write("omics", &dataset(), "chrom").unwrap();

        let leftovers: Vec<_> = fs::read_dir(dir.path().join("omics"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_missing_dataset_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ColumnarStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.read("absent", None),
            Err(StoreError::DatasetNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_partition_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = ColumnarStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.write("omics", &dataset(), "absent"),
            Err(StoreError::MissingPartitionColumn { .. })
        ));
    }
}
