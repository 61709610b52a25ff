pub mod access;
pub mod analyzer;
pub mod classpath;
pub mod filter;
pub mod graph;
pub mod query;
pub mod resolver;
pub mod scanner;

pub use access::{AccessContext, AccessibilityIndexer, DependencyScope};
pub use analyzer::{CancelHandle, ClasspathScanner, Completion, ScanResult, ScanStats};
pub use classpath::{Delegation, LoaderPaths, PathEntry, PathOrderResolver, RootKind, ScanRoot};
pub use filter::ScanSpec;
pub use graph::{
    ClassGraph, ClassNode, ClassState, DanglingEdge, EdgeKind, EdgeOrigin, GraphBuilder, GraphEdge,
    Provenance, RecordOutcome, ShadowedDefinition,
};
pub use query::QueryIndex;
pub use scanner::{ArchiveReader, BinaryEntry, EntryIter};
