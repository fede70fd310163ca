//! Exporters: joined datasets as graphs or training-example sequences

mod graph;
mod samples;

pub use graph::{to_graph, EdgeSpec, ExportError, ExportResult, GraphEdge, OmicsGraph};
pub use samples::{to_sample_sequence, Sample, SampleIter, SampleSequence};
