use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{LoaderDescription, LoaderHandler, ResourceRoot};
use crate::core::classpath::{Delegation, LoaderPaths, PathEntry};

fn delegation(loader: &LoaderDescription, default_parent_first: bool) -> Delegation {
    if loader.parent_first.unwrap_or(default_parent_first) {
        Delegation::ParentFirst
    } else {
        Delegation::SelfFirst
    }
}

/// Plain path-list loaders (application, system, URL loaders).
pub struct ClasspathHandler;

impl LoaderHandler for ClasspathHandler {
    fn name(&self) -> &'static str {
        "classpath"
    }

    fn can_handle(&self, loader: &LoaderDescription) -> bool {
        matches!(loader.type_tag.as_str(), "classpath" | "app" | "system" | "url")
    }

    fn discover(&self, loader: &LoaderDescription) -> LoaderPaths {
        let mut paths =
            LoaderPaths::new(loader.display_name()).with_delegation(delegation(loader, true));
        paths.entries = loader.paths.iter().cloned().map(PathEntry::new).collect();
        paths
    }
}

/// Module-system loaders: one resource root list per module.
pub struct JBossModuleHandler;

impl JBossModuleHandler {
    /// Pick the on-disk location of a resource root. The classic candidate
    /// (packaged archive beside the physical file, the physical file, or the
    /// path name) wins when it is a regular file; otherwise the mount source,
    /// the archive file, then the classic candidate as given.
    fn resolve_root(root: &ResourceRoot) -> Option<PathBuf> {
        let classic = match (&root.physical_file, &root.name) {
            (Some(physical), Some(name)) => {
                let sibling = physical
                    .parent()
                    .map(|dir| dir.join(name))
                    .filter(|candidate| File::open(candidate).is_ok());
                Some(sibling.unwrap_or_else(|| physical.clone()))
            }
            (Some(physical), None) => Some(physical.clone()),
            (None, _) => root.path_name.clone(),
        };

        if let Some(path) = classic.as_ref().filter(|p| is_regular_file(p)) {
            return Some(path.clone());
        }
        root.mount_source
            .clone()
            .or_else(|| root.file_of_jar.clone())
            .or(classic)
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

impl LoaderHandler for JBossModuleHandler {
    fn name(&self) -> &'static str {
        "jboss-modules"
    }

    fn can_handle(&self, loader: &LoaderDescription) -> bool {
        loader.type_tag == "jboss-modules"
    }

    fn discover(&self, loader: &LoaderDescription) -> LoaderPaths {
        let mut paths =
            LoaderPaths::new(loader.display_name()).with_delegation(delegation(loader, true));
        let mut visited: HashSet<&str> = HashSet::new();

        for module in &loader.modules {
            if !visited.insert(module.name.as_str()) {
                debug!(module = %module.name, "module already visited");
                continue;
            }
            for root in &module.resource_roots {
                match Self::resolve_root(root) {
                    Some(path) => paths
                        .entries
                        .push(PathEntry::new(path).with_module(module.name.clone())),
                    None => warn!(module = %module.name, "could not determine path of resource root"),
                }
            }
        }
        paths
            .entries
            .extend(loader.paths.iter().cloned().map(PathEntry::new));
        paths
    }
}

/// Servlet-container web applications: `WEB-INF/classes`, then the archives
/// in `WEB-INF/lib`, looked up before the parent.
pub struct WebAppHandler;

impl LoaderHandler for WebAppHandler {
    fn name(&self) -> &'static str {
        "webapp"
    }

    fn can_handle(&self, loader: &LoaderDescription) -> bool {
        loader.type_tag == "webapp"
    }

    fn discover(&self, loader: &LoaderDescription) -> LoaderPaths {
        let mut paths =
            LoaderPaths::new(loader.display_name()).with_delegation(delegation(loader, false));

        if let Some(base) = &loader.base_dir {
            let web_inf = base.join("WEB-INF");
            let classes = web_inf.join("classes");
            if classes.is_dir() {
                paths.entries.push(PathEntry::directory(classes));
            }

            let mut jars: Vec<PathBuf> = fs::read_dir(web_inf.join("lib"))
                .map(|entries| {
                    entries
                        .filter_map(|e| e.ok())
                        .map(|e| e.path())
                        .filter(|p| {
                            p.extension()
                                .and_then(|ext| ext.to_str())
                                .map(|ext| ext.eq_ignore_ascii_case("jar"))
                                .unwrap_or(false)
                        })
                        .collect()
                })
                .unwrap_or_default();
            jars.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
            paths
                .entries
                .extend(jars.into_iter().map(PathEntry::archive));
        }

        paths
            .entries
            .extend(loader.paths.iter().cloned().map(PathEntry::new));
        paths
    }
}
