//! Key resolution: mapping heterogeneous identifier schemes onto a shared
//! canonical key space
//!
//! Sources arrive keyed by gene symbols, accessions with version suffixes,
//! protein ids, or cohort sample codes. Before any join, every index is
//! rewritten onto canonical keys via precomputed [`SynonymTable`]s, with
//! configurable fallback strategies for identifiers the exact lookup misses.

mod identifier;
mod resolver;
mod synonym;

pub use identifier::{Identifier, Namespace};
pub use resolver::{
    FallbackStrategy, KeyMapping, KeyResolver, MappingEntry, MatchKind, ResolveError,
    ResolveOptions, ResolveResult, ResolvedFrame, ResolverCache, UnresolvedKeyError,
};
pub use synonym::SynonymTable;
