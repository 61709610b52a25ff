//! Path discovery for class loaders.
//!
//! A loader is described by data (a type tag plus whatever paths or module
//! layout its environment exposes). Each supported environment contributes a
//! [`LoaderHandler`]; the static table below is consulted in order and the
//! first handler whose tag matches turns the description into an ordered
//! [`LoaderPaths`] list.

pub mod handlers;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::core::classpath::LoaderPaths;
pub use handlers::{ClasspathHandler, JBossModuleHandler, WebAppHandler};

/// Environment-specific description of one loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderDescription {
    #[serde(rename = "type")]
    pub type_tag: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    #[serde(default)]
    pub parent_first: Option<bool>,
    /// Application root for web-app loaders.
    #[serde(default)]
    pub base_dir: Option<PathBuf>,
    #[serde(default)]
    pub modules: Vec<ModuleDescription>,
    #[serde(default)]
    pub parent: Option<Box<LoaderDescription>>,
}

impl LoaderDescription {
    pub fn new(type_tag: impl Into<String>) -> Self {
        Self {
            type_tag: type_tag.into(),
            ..Self::default()
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.type_tag)
    }
}

/// One module of a module-system loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescription {
    pub name: String,
    #[serde(default)]
    pub resource_roots: Vec<ResourceRoot>,
}

/// Candidate locations a module resource root may expose, most specific first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRoot {
    /// File name of the packaged archive next to `physical_file`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub physical_file: Option<PathBuf>,
    #[serde(default)]
    pub path_name: Option<PathBuf>,
    #[serde(default)]
    pub mount_source: Option<PathBuf>,
    #[serde(default)]
    pub file_of_jar: Option<PathBuf>,
}

pub trait LoaderHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn can_handle(&self, loader: &LoaderDescription) -> bool;

    /// Ordered path list of `loader` itself; parents are attached by the registry.
    fn discover(&self, loader: &LoaderDescription) -> LoaderPaths;
}

static HANDLERS: &[&dyn LoaderHandler] = &[&ClasspathHandler, &JBossModuleHandler, &WebAppHandler];

pub fn handlers() -> &'static [&'static dyn LoaderHandler] {
    HANDLERS
}

pub fn handler_for(loader: &LoaderDescription) -> Option<&'static dyn LoaderHandler> {
    HANDLERS.iter().copied().find(|h| h.can_handle(loader))
}

/// Discover `loader` and its parents. `None` if no handler accepts it.
pub fn discover(loader: &LoaderDescription) -> Option<LoaderPaths> {
    let Some(handler) = handler_for(loader) else {
        warn!(loader = loader.display_name(), tag = %loader.type_tag, "no handler for loader");
        return None;
    };
    let mut paths = handler.discover(loader);
    debug!(
        loader = loader.display_name(),
        handler = handler.name(),
        entries = paths.entries.len(),
        "loader discovered"
    );
    if let Some(parent) = &loader.parent {
        paths.parent = discover(parent).map(Box::new);
    }
    Some(paths)
}

pub fn discover_all(loaders: &[LoaderDescription]) -> Vec<LoaderPaths> {
    loaders.iter().filter_map(discover).collect()
}
