use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use super::classpath::{Delegation, LoaderPaths, PathEntry, PathOrderResolver, ScanRoot};
use super::filter::ScanSpec;
use super::graph::{ClassGraph, GraphBuilder, Provenance};
use super::scanner::{ArchiveReader, BinaryEntry};
use crate::config::ScanConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::error::ScanError;
use crate::loader;
use crate::parsers::cache::{CachedClass, ParseCache};
use crate::parsers::classfile::{DecodeOptions, DescriptorParser};

/// Cooperative cancellation flag shared with a running scan.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Completion {
    Complete,
    Cancelled,
    TimedOut,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanStats {
    pub roots: usize,
    pub entries: u64,
    pub classes: usize,
    pub shadowed: usize,
    pub dangling_edges: usize,
    pub forward_references: usize,
    pub cached_roots: usize,
    pub elapsed: Duration,
}

pub struct ScanResult {
    pub graph: ClassGraph,
    pub roots: Vec<ScanRoot>,
    pub diagnostics: Vec<Diagnostic>,
    pub completion: Completion,
    pub stats: ScanStats,
}

impl ScanResult {
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Complete
    }
}

/// Shared state of one scan run.
struct ScanRun<'a> {
    builder: GraphBuilder,
    diagnostics: Diagnostics,
    parser: DescriptorParser,
    reader: ArchiveReader,
    spec: &'a ScanSpec,
    cache: Option<&'a ParseCache>,
    cancel: &'a CancelHandle,
    deadline: Option<Instant>,
    entries: AtomicU64,
    cached_roots: AtomicUsize,
}

impl ScanRun<'_> {
    fn should_stop(&self) -> bool {
        self.cancel.is_cancelled() || self.deadline.map_or(false, |d| Instant::now() >= d)
    }

    fn scan_root(&self, root: &Arc<ScanRoot>) {
        if self.should_stop() {
            return;
        }
        debug!(root = %root.path.display(), rank = root.rank, "scanning root");

        let cache = self.cache.filter(|_| root.is_archive());
        let fingerprint = self.spec.fingerprint();
        if let Some(cached) = cache.and_then(|c| c.get(&root.path, fingerprint)) {
            self.entries.fetch_add(cached.entries, Ordering::Relaxed);
            self.cached_roots.fetch_add(1, Ordering::Relaxed);
            for class in cached.classes {
                let provenance = provenance(root, class.ordinal, class.entry_name, class.location);
                self.builder.record(class.record, provenance);
            }
            return;
        }

        let collected: Option<Mutex<Vec<CachedClass>>> = cache.map(|_| Mutex::new(Vec::new()));
        // Entries that reported a diagnostic; a root with any is not cached.
        let failures = AtomicUsize::new(0);
        let root_entries = AtomicU64::new(0);

        self.reader
            .entries(root)
            .take_while(|_| !self.should_stop())
            .par_bridge()
            .for_each(|item| match item {
                Ok(entry) => {
                    root_entries.fetch_add(1, Ordering::Relaxed);
                    if self.should_stop() {
                        return;
                    }
                    if !self.decode(root, entry, collected.as_ref()) {
                        failures.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Err(error) => {
                    failures.fetch_add(1, Ordering::Relaxed);
                    self.diagnostics.report(error);
                }
            });

        let root_entries = root_entries.into_inner();
        self.entries.fetch_add(root_entries, Ordering::Relaxed);

        if let (Some(cache), Some(collected)) = (cache, collected) {
            if failures.into_inner() == 0 && !self.should_stop() {
                let mut classes = collected.into_inner().unwrap_or_default();
                classes.sort_by_key(|c| c.ordinal);
                if let Err(err) = cache.store(&root.path, fingerprint, root_entries, classes) {
                    debug!(root = %root.path.display(), "failed to cache archive: {err}");
                }
            }
        }
    }

    /// Decode one entry and record it, also keeping a copy for the cache
    /// when `collected` is given. Returns `false` if the entry produced any
    /// diagnostic, so the root is not cached and a rescan reports it again.
    fn decode(
        &self,
        root: &ScanRoot,
        entry: BinaryEntry,
        collected: Option<&Mutex<Vec<CachedClass>>>,
    ) -> bool {
        let decoded = match self.parser.decode(&entry.bytes) {
            Ok(decoded) => decoded,
            Err(source) => {
                self.diagnostics.report_with_payload(
                    ScanError::MalformedDescriptor {
                        location: entry.location,
                        source,
                    },
                    entry.bytes,
                );
                return false;
            }
        };

        let clean = decoded.signature_issues.is_empty();
        for issue in decoded.signature_issues {
            self.diagnostics.report(ScanError::MalformedSignature {
                location: entry.location.clone(),
                context: issue.context,
                source: issue.error,
            });
        }

        let record = decoded.record;
        if !self.spec.class_accepted(&record.name) {
            debug!(class = %record.name, "class outside accepted packages");
            return clean;
        }

        if let Some(collected) = collected {
            if let Ok(mut classes) = collected.lock() {
                classes.push(CachedClass {
                    ordinal: entry.ordinal,
                    entry_name: entry.name.clone(),
                    location: entry.location.clone(),
                    record: record.clone(),
                });
            }
        }
        let provenance = provenance(root, entry.ordinal, entry.name, entry.location);
        self.builder.record(record, provenance);
        clean
    }
}

fn provenance(root: &ScanRoot, ordinal: u64, entry_name: String, location: String) -> Provenance {
    Provenance {
        root_rank: root.rank,
        ordinal,
        root_path: root.path.clone(),
        entry_name,
        location,
        module: root.module.clone(),
    }
}

/// Scans a classpath into a frozen [`ClassGraph`].
pub struct ClasspathScanner {
    config: ScanConfig,
    cancel: CancelHandle,
    cache: Option<ParseCache>,
}

impl ClasspathScanner {
    pub fn new(config: ScanConfig) -> Self {
        let cache = if config.cache.enabled {
            ParseCache::new(config.cache.dir.clone()).ok()
        } else {
            None
        };
        Self {
            config,
            cancel: CancelHandle::default(),
            cache,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn cache(&self) -> Option<&ParseCache> {
        self.cache.as_ref()
    }

    /// Scan the loaders and plain paths named in the configuration.
    pub fn scan_config_classpath(&self) -> Result<ScanResult> {
        let mut loaders = loader::discover_all(&self.config.classpath.loaders);
        if !self.config.classpath.paths.is_empty() {
            let mut plain = LoaderPaths::new("config").with_delegation(Delegation::SelfFirst);
            plain.entries = self
                .config
                .classpath
                .paths
                .iter()
                .cloned()
                .map(PathEntry::new)
                .collect();
            loaders.push(plain);
        }
        self.scan(&loaders)
    }

    pub fn scan_paths(&self, paths: &[PathBuf]) -> Result<ScanResult> {
        let mut loader = LoaderPaths::new("paths").with_delegation(Delegation::SelfFirst);
        loader.entries = paths.iter().cloned().map(PathEntry::new).collect();
        self.scan(&[loader])
    }

    pub fn scan(&self, loaders: &[LoaderPaths]) -> Result<ScanResult> {
        let started = Instant::now();
        let settings = &self.config.scan;
        let spec = Arc::new(settings.scan_spec().context("invalid scan filters")?);

        let diagnostics = Diagnostics::new();
        let roots = PathOrderResolver::new(Arc::clone(&spec))
            .with_overrides(self.config.classpath.overrides.iter().cloned())
            .resolve(loaders, &diagnostics);
        info!(roots = roots.len(), "classpath resolved");

        let run = ScanRun {
            builder: GraphBuilder::new(),
            diagnostics,
            parser: DescriptorParser::new(DecodeOptions {
                invisible_annotations: settings.invisible_annotations,
            }),
            reader: ArchiveReader::new(Arc::clone(&spec))
                .with_max_nesting(settings.nested_archive_depth),
            spec: &spec,
            cache: self.cache.as_ref(),
            cancel: &self.cancel,
            deadline: settings.timeout().map(|t| started + t),
            entries: AtomicU64::new(0),
            cached_roots: AtomicUsize::new(0),
        };

        let work = || roots.par_iter().for_each(|root| run.scan_root(root));
        if settings.worker_threads > 0 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(settings.worker_threads)
                .build()
                .context("failed to build worker pool")?;
            pool.install(work);
        } else {
            work();
        }

        let completion = if self.cancel.is_cancelled() {
            run.diagnostics.report(ScanError::Cancelled);
            Completion::Cancelled
        } else if run.deadline.map_or(false, |d| Instant::now() >= d) {
            run.diagnostics.report(ScanError::TimedOut {
                elapsed: started.elapsed(),
            });
            Completion::TimedOut
        } else {
            Completion::Complete
        };

        let forward_references = run.builder.forward_references();
        let entries = run.entries.into_inner();
        let cached_roots = run.cached_roots.into_inner();
        let graph = run.builder.finish(&run.diagnostics);

        let stats = ScanStats {
            roots: roots.len(),
            entries,
            classes: graph.len(),
            shadowed: graph.shadowed().len(),
            dangling_edges: graph.dangling_edges().len(),
            forward_references,
            cached_roots,
            elapsed: started.elapsed(),
        };
        info!(
            classes = stats.classes,
            entries = stats.entries,
            shadowed = stats.shadowed,
            dangling = stats.dangling_edges,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            ?completion,
            "scan finished"
        );

        Ok(ScanResult {
            graph,
            roots: roots.iter().map(|root| ScanRoot::clone(root)).collect(),
            diagnostics: run.diagnostics.into_vec(),
            completion,
            stats,
        })
    }
}
