//! Columnar persistence of joined datasets
//!
//! Datasets persist as Parquet partitions under
//! `<root>/<dataset>/<partition>/`, each beside a JSON schema descriptor
//! recording column semantic types and join provenance. Reads prune by
//! partition label and validate descriptors before touching any data.

mod codec;
mod descriptor;
#[allow(clippy::module_inception)]
mod store;

pub use descriptor::{ColumnDescriptor, SchemaConflictError, SchemaDescriptor};
pub use store::{ColumnarStore, PartitionHandle, PartitionScan, StoreError, StoreResult};
