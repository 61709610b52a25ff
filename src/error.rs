use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use zip::result::ZipError;

use crate::parsers::signature::SignatureError;

/// Byte-level failures while decoding a class descriptor.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("unexpected end of descriptor at offset {offset}")]
    UnexpectedEof { offset: usize },
    #[error("invalid magic cookie 0x{found:08X}")]
    InvalidMagic { found: u32 },
    #[error("unsupported format version {major}.{minor}")]
    UnsupportedVersion { major: u16, minor: u16 },
    #[error("unsupported constant pool tag {tag} at index {index}")]
    UnsupportedConstant { tag: u8, index: u16 },
    #[error("invalid constant pool index {index} (pool size {size})")]
    InvalidConstantIndex { index: u16, size: usize },
    #[error("constant pool index {index} is not a {expected} entry")]
    ConstantTypeMismatch { index: u16, expected: &'static str },
    #[error("invalid annotation element tag '{tag}'")]
    InvalidAnnotationTag { tag: char },
    #[error("annotation values nested deeper than {limit}")]
    NestingTooDeep { limit: usize },
}

/// Failures opening or reading a scan root or one of its entries.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Zip(#[from] ZipError),
    #[error("file is not an archive")]
    NotAnArchive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PathNotFound,
    ArchiveRead,
    MalformedDescriptor,
    MalformedSignature,
    UnresolvedSymbol,
    RecursionLimitExceeded,
    CyclicHierarchy,
    Cancelled,
    TimedOut,
    Config,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("path not found: {path}")]
    PathNotFound { path: PathBuf },
    #[error("cannot read {location}: {source}")]
    ArchiveRead {
        location: String,
        #[source]
        source: ArchiveError,
    },
    #[error("malformed descriptor {location}: {source}")]
    MalformedDescriptor {
        location: String,
        #[source]
        source: DescriptorError,
    },
    #[error("malformed signature in {location} ({context}): {source}")]
    MalformedSignature {
        location: String,
        context: String,
        #[source]
        source: SignatureError,
    },
    #[error("unresolved symbol: {name}")]
    UnresolvedSymbol { name: String },
    #[error("nested archive {location} exceeds depth limit {limit}")]
    RecursionLimitExceeded { location: String, limit: usize },
    #[error("class {name} is its own ancestor")]
    CyclicHierarchy { name: String },
    #[error("scan cancelled")]
    Cancelled,
    #[error("scan timed out after {elapsed:?}")]
    TimedOut { elapsed: Duration },
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::PathNotFound { .. } => ErrorKind::PathNotFound,
            ScanError::ArchiveRead { .. } => ErrorKind::ArchiveRead,
            ScanError::MalformedDescriptor { .. } => ErrorKind::MalformedDescriptor,
            ScanError::MalformedSignature { .. } => ErrorKind::MalformedSignature,
            ScanError::UnresolvedSymbol { .. } => ErrorKind::UnresolvedSymbol,
            ScanError::RecursionLimitExceeded { .. } => ErrorKind::RecursionLimitExceeded,
            ScanError::CyclicHierarchy { .. } => ErrorKind::CyclicHierarchy,
            ScanError::Cancelled => ErrorKind::Cancelled,
            ScanError::TimedOut { .. } => ErrorKind::TimedOut,
            ScanError::Config(_) => ErrorKind::Config,
        }
    }

    pub(crate) fn archive(location: impl Into<String>, source: impl Into<ArchiveError>) -> Self {
        ScanError::ArchiveRead {
            location: location.into(),
            source: source.into(),
        }
    }
}
