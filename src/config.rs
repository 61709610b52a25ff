use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::filter::ScanSpec;
use crate::core::scanner::DEFAULT_MAX_NESTING;
use crate::error::ScanError;
use crate::loader::LoaderDescription;

/// Top-level scanner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    #[serde(default)]
    pub scan: ScanSettings,
    #[serde(default)]
    pub classpath: ClasspathSettings,
    #[serde(default)]
    pub cache: CacheSettings,
}

/// Filters and limits for one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanSettings {
    /// Package prefixes to scan; empty scans everything.
    #[serde(default)]
    pub accept_packages: Vec<String>,
    #[serde(default)]
    pub reject_packages: Vec<String>,
    /// Glob patterns on archive file names.
    #[serde(default)]
    pub accept_archives: Vec<String>,
    #[serde(default)]
    pub reject_archives: Vec<String>,
    #[serde(default = "default_nested_archive_depth")]
    pub nested_archive_depth: usize,
    /// 0 uses rayon's global pool.
    #[serde(default)]
    pub worker_threads: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_true")]
    pub invisible_annotations: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClasspathSettings {
    /// Entries placed ahead of every loader.
    #[serde(default, rename = "override")]
    pub overrides: Vec<PathBuf>,
    /// Plain entries scanned as one self-first loader.
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub loaders: Vec<LoaderDescription>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default)]
    pub enabled: bool,
    /// Defaults to a directory under the system temp dir.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_nested_archive_depth() -> usize {
    DEFAULT_MAX_NESTING
}

fn default_true() -> bool {
    true
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            accept_packages: Vec::new(),
            reject_packages: Vec::new(),
            accept_archives: Vec::new(),
            reject_archives: Vec::new(),
            nested_archive_depth: default_nested_archive_depth(),
            worker_threads: 0,
            timeout_secs: None,
            invisible_annotations: true,
        }
    }
}

impl ScanSettings {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Compile the name-scope filters.
    pub fn scan_spec(&self) -> Result<ScanSpec, ScanError> {
        ScanSpec::new()
            .with_accept_packages(&self.accept_packages)
            .with_reject_packages(&self.reject_packages)
            .with_accept_archives(&self.accept_archives)?
            .with_reject_archives(&self.reject_archives)
    }
}

impl ScanConfig {
    /// Load config from a TOML file, falling back to defaults when the file is missing.
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(_) => Ok(Self::default()),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ScanError> {
        toml::from_str(contents).map_err(|err| ScanError::Config(err.to_string()))
    }
}
