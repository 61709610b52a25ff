use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet, VecDeque};

use super::graph::{ClassGraph, ClassNode, DanglingEdge, EdgeKind, GraphEdge};

/// Read-only lookup tables over a frozen graph. Every list is kept in node
/// index order, which is arrival order.
#[derive(Debug, Default)]
pub struct QueryIndex {
    by_annotation: HashMap<String, Vec<NodeIndex>>,
    by_method_annotation: HashMap<String, Vec<NodeIndex>>,
    by_field_annotation: HashMap<String, Vec<NodeIndex>>,
    by_superclass: HashMap<String, Vec<NodeIndex>>,
    by_interface: HashMap<String, Vec<NodeIndex>>,
}

impl QueryIndex {
    pub(crate) fn build(
        graph: &DiGraph<ClassNode, GraphEdge>,
        index: &HashMap<String, NodeIndex>,
        dangling: &[DanglingEdge],
    ) -> Self {
        let mut query = QueryIndex::default();

        for ix in graph.node_indices() {
            let node = &graph[ix];
            for annotation in &node.record.annotations {
                push_unique(&mut query.by_annotation, &annotation.type_name, ix);
            }
            for method in &node.record.methods {
                let parameter_annotations = method.parameter_annotations.iter().flatten();
                for annotation in method.annotations.iter().chain(parameter_annotations) {
                    push_unique(&mut query.by_method_annotation, &annotation.type_name, ix);
                }
            }
            for field in &node.record.fields {
                for annotation in &field.annotations {
                    push_unique(&mut query.by_field_annotation, &annotation.type_name, ix);
                }
            }
            for edge in &node.edges {
                query.add_supertype(edge, ix);
            }
        }

        // Supertypes that never appeared still index their subtypes.
        for edge in dangling {
            if let Some(&ix) = index.get(&edge.from) {
                query.add_supertype(&edge.edge, ix);
            }
        }
        for list in query
            .by_superclass
            .values_mut()
            .chain(query.by_interface.values_mut())
        {
            list.sort();
        }

        query
    }

    fn add_supertype(&mut self, edge: &GraphEdge, ix: NodeIndex) {
        match edge.kind {
            EdgeKind::Extends => push_unique(&mut self.by_superclass, &edge.target, ix),
            EdgeKind::Implements => push_unique(&mut self.by_interface, &edge.target, ix),
            _ => {}
        }
    }

    pub fn annotated_with(&self, annotation: &str) -> &[NodeIndex] {
        lookup(&self.by_annotation, annotation)
    }

    pub fn with_method_annotation(&self, annotation: &str) -> &[NodeIndex] {
        lookup(&self.by_method_annotation, annotation)
    }

    pub fn with_field_annotation(&self, annotation: &str) -> &[NodeIndex] {
        lookup(&self.by_field_annotation, annotation)
    }

    pub fn direct_subclasses(&self, name: &str) -> &[NodeIndex] {
        lookup(&self.by_superclass, name)
    }

    pub fn direct_implementors(&self, name: &str) -> &[NodeIndex] {
        lookup(&self.by_interface, name)
    }
}

fn push_unique(map: &mut HashMap<String, Vec<NodeIndex>>, key: &str, ix: NodeIndex) {
    let list = map.entry(key.to_string()).or_default();
    if list.last() != Some(&ix) && !list.contains(&ix) {
        list.push(ix);
    }
}

fn lookup<'a>(map: &'a HashMap<String, Vec<NodeIndex>>, key: &str) -> &'a [NodeIndex] {
    map.get(key).map(Vec::as_slice).unwrap_or(&[])
}

impl ClassGraph {
    fn nodes_of(&self, mut indices: Vec<NodeIndex>) -> Vec<&ClassNode> {
        indices.sort();
        indices.dedup();
        indices.into_iter().map(|ix| &self.graph[ix]).collect()
    }

    /// Classes annotated with `annotation`, directly or through annotation
    /// types that are themselves (transitively) annotated with it.
    pub fn classes_with_annotation(&self, annotation: &str) -> Vec<&ClassNode> {
        let mut seen_annotations: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        let mut found = Vec::new();
        queue.push_back(annotation);
        seen_annotations.insert(annotation);

        while let Some(current) = queue.pop_front() {
            for &ix in self.query.annotated_with(current) {
                found.push(ix);
                let node = &self.graph[ix];
                if node.record.is_annotation() && seen_annotations.insert(node.name()) {
                    queue.push_back(node.name());
                }
            }
        }
        self.nodes_of(found)
    }

    pub fn classes_with_method_annotation(&self, annotation: &str) -> Vec<&ClassNode> {
        self.nodes_of(self.query.with_method_annotation(annotation).to_vec())
    }

    pub fn classes_with_field_annotation(&self, annotation: &str) -> Vec<&ClassNode> {
        self.nodes_of(self.query.with_field_annotation(annotation).to_vec())
    }

    /// Classes and interfaces that directly extend or implement `name`.
    pub fn direct_subtypes(&self, name: &str) -> Vec<&ClassNode> {
        let mut indices = self.query.direct_subclasses(name).to_vec();
        indices.extend_from_slice(self.query.direct_implementors(name));
        self.nodes_of(indices)
    }

    /// Transitive subclasses of `name`.
    pub fn subclasses(&self, name: &str) -> Vec<&ClassNode> {
        let mut found = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([name]);
        visited.insert(name);
        while let Some(current) = queue.pop_front() {
            for &ix in self.query.direct_subclasses(current) {
                let child = self.graph[ix].name();
                if visited.insert(child) {
                    found.push(ix);
                    queue.push_back(child);
                }
            }
        }
        self.nodes_of(found)
    }

    /// Every class or interface that implements `name`, through
    /// subinterfaces and through subclasses of implementors.
    pub fn implementors(&self, name: &str) -> Vec<&ClassNode> {
        let mut found = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue = VecDeque::from([name]);
        visited.insert(name);
        while let Some(current) = queue.pop_front() {
            let direct = self.query.direct_implementors(current).iter();
            let inherited = self.query.direct_subclasses(current).iter();
            let is_root = current == name;
            for &ix in direct.chain(inherited.filter(|_| !is_root)) {
                let child = self.graph[ix].name();
                if visited.insert(child) {
                    found.push(ix);
                    queue.push_back(child);
                }
            }
        }
        self.nodes_of(found)
    }

    /// Superclass chain of `name`, nearest first, limited to scanned classes.
    pub fn superclasses(&self, name: &str) -> Vec<&ClassNode> {
        let mut chain = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(name);
        let mut current = self.get(name);
        while let Some(node) = current {
            let parent = node
                .edges
                .iter()
                .find(|edge| edge.kind == EdgeKind::Extends)
                .and_then(|edge| self.get(&edge.target));
            match parent {
                Some(parent) if visited.insert(parent.name()) => {
                    chain.push(parent);
                    current = Some(parent);
                }
                _ => break,
            }
        }
        chain
    }

    /// All interfaces implemented by `name` or its superclasses, including
    /// superinterfaces, in discovery order.
    pub fn interfaces(&self, name: &str) -> Vec<&ClassNode> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        let mut queue: VecDeque<&ClassNode> = VecDeque::new();
        if let Some(node) = self.get(name) {
            queue.push_back(node);
            queue.extend(self.superclasses(name));
        }
        while let Some(node) = queue.pop_front() {
            for edge in node.edges.iter().filter(|e| e.kind == EdgeKind::Implements) {
                if let Some(interface) = self.get(&edge.target) {
                    if visited.insert(interface.name()) {
                        result.push(interface);
                        queue.push_back(interface);
                    }
                }
            }
        }
        result
    }

    /// Supertypes of `name` (superclass chain and all superinterfaces),
    /// breadth-first, nearest first.
    pub fn ancestors(&self, name: &str) -> Vec<&ClassNode> {
        let mut result = Vec::new();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(name);
        let mut queue: VecDeque<&ClassNode> = self.get(name).into_iter().collect();
        while let Some(node) = queue.pop_front() {
            for edge in node.edges.iter().filter(|e| e.kind.is_hierarchy()) {
                if let Some(parent) = self.get(&edge.target) {
                    if visited.insert(parent.name()) {
                        result.push(parent);
                        queue.push_back(parent);
                    }
                }
            }
        }
        result
    }
}
