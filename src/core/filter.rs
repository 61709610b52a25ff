use regex::Regex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::error::ScanError;
use crate::parsers::record::package_of;

/// Entry prefixes under which packaged applications keep their class tree.
pub const PACKAGE_ROOT_PREFIXES: &[&str] = &["BOOT-INF/classes/", "WEB-INF/classes/"];

pub const CLASS_SUFFIX: &str = ".class";

const ARCHIVE_EXTENSIONS: &[&str] = &["jar", "zip", "war", "ear"];

/// Name-scope filters shared by path resolution, archive reading and decoding.
///
/// Package filters are dotted prefixes matched on package boundaries, so
/// `com.acme` accepts `com.acme` and `com.acme.util` but not `com.acmex`.
/// Archive filters are globs (`*`, `?`) on the archive file name.
#[derive(Debug, Clone, Default)]
pub struct ScanSpec {
    accept_packages: Vec<String>,
    reject_packages: Vec<String>,
    accept_archive_globs: Vec<String>,
    reject_archive_globs: Vec<String>,
    accept_archives: Vec<Regex>,
    reject_archives: Vec<Regex>,
}

impl ScanSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accept_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.accept_packages
            .extend(packages.into_iter().map(|p| normalize_package(p.as_ref())));
        self
    }

    pub fn with_reject_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.reject_packages
            .extend(packages.into_iter().map(|p| normalize_package(p.as_ref())));
        self
    }

    pub fn with_accept_archives<I, S>(mut self, globs: I) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for glob in globs {
            let glob = glob.as_ref();
            self.accept_archives.push(glob_to_regex(glob)?);
            self.accept_archive_globs.push(glob.to_string());
        }
        Ok(self)
    }

    pub fn with_reject_archives<I, S>(mut self, globs: I) -> Result<Self, ScanError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for glob in globs {
            let glob = glob.as_ref();
            self.reject_archives.push(glob_to_regex(glob)?);
            self.reject_archive_globs.push(glob.to_string());
        }
        Ok(self)
    }

    pub fn package_accepted(&self, package: &str) -> bool {
        if self
            .reject_packages
            .iter()
            .any(|prefix| within_package(package, prefix))
        {
            return false;
        }
        self.accept_packages.is_empty()
            || self
                .accept_packages
                .iter()
                .any(|prefix| within_package(package, prefix))
    }

    pub fn class_accepted(&self, class_name: &str) -> bool {
        self.package_accepted(package_of(class_name))
    }

    /// Whether a directory holding `package` may contain accepted classes,
    /// either directly or in a subpackage. Used to prune traversal.
    pub fn package_may_contain_accepted(&self, package: &str) -> bool {
        if self
            .reject_packages
            .iter()
            .any(|prefix| within_package(package, prefix))
        {
            return false;
        }
        self.accept_packages.is_empty()
            || self.accept_packages.iter().any(|prefix| {
                within_package(package, prefix) || within_package(prefix, package)
            })
    }

    pub fn archive_accepted(&self, file_name: &str) -> bool {
        if self.reject_archives.iter().any(|re| re.is_match(file_name)) {
            return false;
        }
        self.accept_archives.is_empty() || self.accept_archives.iter().any(|re| re.is_match(file_name))
    }

    /// Stable hash of every filter, used to key cached archive contents.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.accept_packages.hash(&mut hasher);
        self.reject_packages.hash(&mut hasher);
        self.accept_archive_globs.hash(&mut hasher);
        self.reject_archive_globs.hash(&mut hasher);
        hasher.finish()
    }
}

/// Remove a packaged-application prefix such as `BOOT-INF/classes/`.
pub fn strip_package_root(entry_path: &str) -> &str {
    PACKAGE_ROOT_PREFIXES
        .iter()
        .find_map(|prefix| entry_path.strip_prefix(prefix))
        .unwrap_or(entry_path)
}

/// Dotted class name for a slash-delimited descriptor path, or `None` for
/// paths that do not hold a scannable class descriptor.
pub fn class_name_for_path(entry_path: &str) -> Option<String> {
    let stem = entry_path.strip_suffix(CLASS_SUFFIX)?;
    let file_name = stem.rsplit('/').next().unwrap_or(stem);
    if stem.is_empty() || file_name.is_empty() || file_name == "module-info" {
        return None;
    }
    Some(stem.replace('/', "."))
}

/// Archive extension or no extension at all: both are sniffed for archive magic.
pub fn may_be_archive(entry_path: &str) -> bool {
    let file_name = entry_path.rsplit('/').next().unwrap_or(entry_path);
    match file_name.rsplit_once('.') {
        Some((_, extension)) => ARCHIVE_EXTENSIONS
            .iter()
            .any(|known| extension.eq_ignore_ascii_case(known)),
        None => !file_name.is_empty(),
    }
}

fn normalize_package(package: &str) -> String {
    package
        .trim()
        .trim_end_matches(".*")
        .trim_end_matches('.')
        .replace('/', ".")
}

fn within_package(package: &str, prefix: &str) -> bool {
    prefix.is_empty()
        || package == prefix
        || (package.starts_with(prefix) && package[prefix.len()..].starts_with('.'))
}

fn glob_to_regex(glob: &str) -> Result<Regex, ScanError> {
    let mut pattern = String::with_capacity(glob.len() + 8);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern)
        .map_err(|err| ScanError::Config(format!("invalid archive pattern '{glob}': {err}")))
}
