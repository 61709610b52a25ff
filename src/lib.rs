//! # classweave
//!
//! Classpath scanning without class loading.
//!
//! classweave resolves an ordered set of archives and directories, decodes the
//! compiled class descriptors they contain, and builds a frozen, queryable
//! graph of classes, supertypes, annotations and member type references.
//!
//! ## Pipeline
//!
//! - **Path order**: loader path lists are merged and deduplicated ([`core::classpath`])
//! - **Archive reading**: directories and (nested) archives are enumerated lazily ([`core::scanner`])
//! - **Decoding**: descriptors and generic signatures become [`parsers::ClassRecord`]s
//! - **Graph building**: records are merged concurrently and resolved in one final pass ([`core::graph`])
//! - **Queries**: name, annotation, hierarchy and dependency lookups ([`core::query`], [`core::access`])

pub mod config;
pub mod core;
pub mod diagnostics;
pub mod error;
pub mod formatters;
pub mod loader;
pub mod parsers;

pub use crate::config::ScanConfig;
pub use crate::core::{
    AccessContext, ClassGraph, ClassNode, ClasspathScanner, Completion, DependencyScope,
    EdgeKind, ScanResult,
};
pub use crate::diagnostics::{Diagnostic, Diagnostics};
pub use crate::error::{ErrorKind, ScanError};
