use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::filter::ScanSpec;
use crate::diagnostics::Diagnostics;
use crate::error::ScanError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    Archive,
    Directory,
}

/// Order in which a loader consults its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Delegation {
    #[default]
    ParentFirst,
    SelfFirst,
}

/// One search-path entry as supplied by a path-discovery collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathEntry {
    pub path: PathBuf,
    /// `None` lets the resolver decide from the filesystem.
    pub kind: Option<RootKind>,
    /// Lower values come first within one loader; ties keep discovery order.
    pub priority: i32,
    pub module: Option<String>,
}

impl PathEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: None,
            priority: 0,
            module: None,
        }
    }

    pub fn archive(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: Some(RootKind::Archive),
            ..Self::new(path)
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: Some(RootKind::Directory),
            ..Self::new(path)
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Ordered path list of one loader, with its delegation model and parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderPaths {
    pub name: String,
    pub entries: Vec<PathEntry>,
    pub delegation: Delegation,
    pub parent: Option<Box<LoaderPaths>>,
}

impl LoaderPaths {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
            delegation: Delegation::ParentFirst,
            parent: None,
        }
    }

    /// A loader over a platform path list (`a.jar:classes` on Unix).
    pub fn from_classpath(name: impl Into<String>, classpath: &str) -> Self {
        let entries = std::env::split_paths(classpath)
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathEntry::new)
            .collect();
        Self {
            entries,
            ..Self::new(name)
        }
    }

    pub fn with_entry(mut self, entry: PathEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_delegation(mut self, delegation: Delegation) -> Self {
        self.delegation = delegation;
        self
    }

    pub fn with_parent(mut self, parent: LoaderPaths) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    /// Entries of this loader and its ancestors in lookup order.
    pub fn flatten(&self) -> Vec<&PathEntry> {
        let mut own: Vec<&PathEntry> = self.entries.iter().collect();
        own.sort_by_key(|entry| entry.priority);

        let inherited = self
            .parent
            .as_ref()
            .map(|parent| parent.flatten())
            .unwrap_or_default();

        match self.delegation {
            Delegation::ParentFirst => inherited.into_iter().chain(own).collect(),
            Delegation::SelfFirst => own.into_iter().chain(inherited).collect(),
        }
    }
}

/// A resolved, deduplicated location to enumerate. `rank` is its position in
/// the final order; lower ranks win name conflicts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScanRoot {
    pub path: PathBuf,
    pub kind: RootKind,
    pub rank: usize,
    pub module: Option<String>,
}

impl ScanRoot {
    pub fn is_archive(&self) -> bool {
        self.kind == RootKind::Archive
    }
}

/// Merges loader path lists into one priority-ordered sequence of scan roots.
pub struct PathOrderResolver {
    spec: Arc<ScanSpec>,
    overrides: Vec<PathEntry>,
}

impl PathOrderResolver {
    pub fn new(spec: Arc<ScanSpec>) -> Self {
        Self {
            spec,
            overrides: Vec::new(),
        }
    }

    /// Entries placed ahead of every loader, in the given order.
    pub fn with_overrides<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.overrides
            .extend(paths.into_iter().map(|p| PathEntry::new(p.into())));
        self
    }

    pub fn resolve(&self, loaders: &[LoaderPaths], diagnostics: &Diagnostics) -> Vec<Arc<ScanRoot>> {
        let ordered = self
            .overrides
            .iter()
            .chain(loaders.iter().flat_map(|loader| loader.flatten()));

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut roots = Vec::new();

        for entry in ordered {
            let canonical = match fs::canonicalize(&entry.path) {
                Ok(path) => path,
                Err(_) => {
                    diagnostics.report(ScanError::PathNotFound {
                        path: entry.path.clone(),
                    });
                    continue;
                }
            };
            if !seen.insert(canonical.clone()) {
                debug!(path = %canonical.display(), "duplicate classpath entry skipped");
                continue;
            }

            let kind = match entry.kind {
                Some(kind) => kind,
                None if canonical.is_dir() => RootKind::Directory,
                None => RootKind::Archive,
            };
            if kind == RootKind::Archive && !self.archive_accepted(&canonical) {
                debug!(path = %canonical.display(), "archive rejected by filter");
                continue;
            }

            roots.push(Arc::new(ScanRoot {
                path: canonical,
                kind,
                rank: roots.len(),
                module: entry.module.clone(),
            }));
        }

        debug!(roots = roots.len(), "classpath order resolved");
        roots
    }

    fn archive_accepted(&self, path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| self.spec.archive_accepted(name))
            .unwrap_or(true)
    }
}
