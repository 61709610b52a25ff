use std::collections::HashSet;

use super::graph::{ClassGraph, ClassNode, GraphEdge};
use crate::error::ScanError;
use crate::parsers::record::{package_of, Visibility};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyScope {
    #[default]
    All,
    /// Only references an outside class could reach through inheritance.
    AccessibleOnly,
}

/// The class asking: its package and whether it is a subtype of the
/// declaring class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessContext {
    pub package: String,
    pub is_subtype: bool,
}

impl AccessContext {
    pub fn new(package: impl Into<String>, is_subtype: bool) -> Self {
        Self {
            package: package.into(),
            is_subtype,
        }
    }

    /// Context of `class_name` looking at one of its supertypes.
    pub fn subtype(class_name: &str) -> Self {
        Self::new(package_of(class_name), true)
    }

    /// Context of `class_name` looking at an unrelated class.
    pub fn outsider(class_name: &str) -> Self {
        Self::new(package_of(class_name), false)
    }
}

/// Computes, per asking context, which references of a class are reachable
/// from outside it. Nothing is cached: results depend on the asker.
pub struct AccessibilityIndexer<'g> {
    graph: &'g ClassGraph,
}

impl<'g> AccessibilityIndexer<'g> {
    pub fn new(graph: &'g ClassGraph) -> Self {
        Self { graph }
    }

    pub fn is_accessible(edge: &GraphEdge, declaring_package: &str, context: &AccessContext) -> bool {
        match edge.origin.visibility() {
            Visibility::Public => true,
            Visibility::Protected => context.is_subtype || context.package == declaring_package,
            Visibility::PackagePrivate => context.package == declaring_package,
            Visibility::Private => false,
        }
    }

    /// Outgoing edges of `declaring` that `context` can reach.
    pub fn accessible_edges(
        &self,
        declaring: &str,
        context: &AccessContext,
    ) -> Result<Vec<&'g GraphEdge>, ScanError> {
        let node = self.graph.resolve(declaring)?;
        let package = node.record.package_name();
        Ok(node
            .edges
            .iter()
            .filter(|edge| Self::is_accessible(edge, package, context))
            .collect())
    }

    /// Classes `name` depends on: its own references, every scanned
    /// ancestor, and the ancestors' references (filtered to what `name`
    /// can reach when `scope` is [`DependencyScope::AccessibleOnly`]).
    pub fn dependencies(&self, name: &str, scope: DependencyScope) -> Result<Vec<&'g ClassNode>, ScanError> {
        let node = self.graph.resolve(name)?;
        let context = AccessContext::subtype(name);
        let mut collector = Collector::new(self.graph, name);

        for edge in &node.edges {
            collector.add(&edge.target);
        }
        for ancestor in self.graph.ancestors(name) {
            collector.add(ancestor.name());
            let package = ancestor.record.package_name();
            for edge in &ancestor.edges {
                if scope == DependencyScope::All || Self::is_accessible(edge, package, &context) {
                    collector.add(&edge.target);
                }
            }
        }
        Ok(collector.into_vec())
    }

    /// Classes referenced by `name` through declarations `context` can reach.
    pub fn dependencies_seen_by(
        &self,
        name: &str,
        context: &AccessContext,
    ) -> Result<Vec<&'g ClassNode>, ScanError> {
        let mut collector = Collector::new(self.graph, name);
        for edge in self.accessible_edges(name, context)? {
            collector.add(&edge.target);
        }
        Ok(collector.into_vec())
    }
}

struct Collector<'g> {
    graph: &'g ClassGraph,
    seen: HashSet<&'g str>,
    result: Vec<&'g ClassNode>,
}

impl<'g> Collector<'g> {
    fn new(graph: &'g ClassGraph, owner: &str) -> Self {
        let mut seen = HashSet::new();
        if let Some(node) = graph.get(owner) {
            seen.insert(node.name());
        }
        Self {
            graph,
            seen,
            result: Vec::new(),
        }
    }

    fn add(&mut self, name: &str) {
        if let Some(node) = self.graph.get(name) {
            if self.seen.insert(node.name()) {
                self.result.push(node);
            }
        }
    }

    fn into_vec(self) -> Vec<&'g ClassNode> {
        self.result
    }
}

impl ClassGraph {
    pub fn class_dependencies(
        &self,
        name: &str,
        scope: DependencyScope,
    ) -> Result<Vec<&ClassNode>, ScanError> {
        AccessibilityIndexer::new(self).dependencies(name, scope)
    }

    pub fn dependencies_seen_by(
        &self,
        name: &str,
        context: &AccessContext,
    ) -> Result<Vec<&ClassNode>, ScanError> {
        AccessibilityIndexer::new(self).dependencies_seen_by(name, context)
    }
}
