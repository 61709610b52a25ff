use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::query::QueryIndex;
use crate::diagnostics::Diagnostics;
use crate::error::ScanError;
use crate::parsers::record::{AnnotationRecord, ClassRecord, Visibility};
use crate::parsers::signature::{parse_field_signature, parse_method_signature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Extends,
    Implements,
    AnnotatedBy,
    FieldType,
    MethodParamType,
    MethodReturnType,
    ThrowsType,
    Referenced,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
            EdgeKind::AnnotatedBy => "annotated_by",
            EdgeKind::FieldType => "field_type",
            EdgeKind::MethodParamType => "method_param_type",
            EdgeKind::MethodReturnType => "method_return_type",
            EdgeKind::ThrowsType => "throws_type",
            EdgeKind::Referenced => "referenced",
        }
    }

    pub fn is_hierarchy(self) -> bool {
        matches!(self, EdgeKind::Extends | EdgeKind::Implements)
    }
}

/// Where in the declaring class a reference was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum EdgeOrigin {
    /// Class header: supertypes, class signature, class annotations.
    Class,
    Field {
        name: String,
        visibility: Visibility,
    },
    Method {
        name: String,
        descriptor: String,
        visibility: Visibility,
    },
    /// Constant-pool reference not attributable to a member declaration.
    Body,
}

impl EdgeOrigin {
    /// Visibility of the declaration the reference belongs to.
    pub fn visibility(&self) -> Visibility {
        match self {
            EdgeOrigin::Class => Visibility::Public,
            EdgeOrigin::Field { visibility, .. } | EdgeOrigin::Method { visibility, .. } => {
                *visibility
            }
            EdgeOrigin::Body => Visibility::Private,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct GraphEdge {
    pub kind: EdgeKind,
    pub target: String,
    pub origin: EdgeOrigin,
    /// Reachable from a subtype in any package.
    pub accessible_from_subtype: bool,
}

impl GraphEdge {
    pub fn new(kind: EdgeKind, target: impl Into<String>, origin: EdgeOrigin) -> Self {
        let accessible_from_subtype = matches!(
            origin.visibility(),
            Visibility::Public | Visibility::Protected
        );
        Self {
            kind,
            target: target.into(),
            origin,
            accessible_from_subtype,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassState {
    Unseen,
    Recorded,
    Resolved,
}

/// Where a record came from. Ordering by `(root_rank, ordinal)` is the
/// arrival order of the scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub root_rank: usize,
    pub ordinal: u64,
    pub root_path: PathBuf,
    pub entry_name: String,
    pub location: String,
    pub module: Option<String>,
}

impl Provenance {
    pub fn arrival(&self) -> (usize, u64) {
        (self.root_rank, self.ordinal)
    }
}

#[derive(Debug, Clone)]
pub struct ClassNode {
    pub record: ClassRecord,
    pub provenance: Provenance,
    pub state: ClassState,
    /// Resolved outgoing edges in derivation order.
    pub edges: Vec<GraphEdge>,
}

impl ClassNode {
    pub fn name(&self) -> &str {
        &self.record.name
    }
}

/// Edge whose target never appeared in the scan.
#[derive(Debug, Clone, Serialize)]
pub struct DanglingEdge {
    pub from: String,
    pub edge: GraphEdge,
}

/// Lower-priority duplicate of an authoritative class.
#[derive(Debug, Clone)]
pub struct ShadowedDefinition {
    pub name: String,
    pub provenance: Provenance,
    pub authoritative: Provenance,
    pub record: ClassRecord,
}

/// Frozen class graph. Node indices follow arrival order.
#[derive(Debug, Default)]
pub struct ClassGraph {
    pub(crate) graph: DiGraph<ClassNode, GraphEdge>,
    pub(crate) index: HashMap<String, NodeIndex>,
    pub(crate) dangling: Vec<DanglingEdge>,
    pub(crate) shadowed: Vec<ShadowedDefinition>,
    pub(crate) query: QueryIndex,
}

impl ClassGraph {
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ClassNode> {
        self.index.get(name).map(|&ix| &self.graph[ix])
    }

    pub fn resolve(&self, name: &str) -> Result<&ClassNode, ScanError> {
        self.get(name).ok_or_else(|| ScanError::UnresolvedSymbol {
            name: name.to_string(),
        })
    }

    pub fn node_index(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    pub fn node(&self, index: NodeIndex) -> &ClassNode {
        &self.graph[index]
    }

    /// All authoritative classes in arrival order.
    pub fn classes(&self) -> impl Iterator<Item = &ClassNode> {
        self.graph.node_weights()
    }

    pub fn outgoing_edges(&self, name: &str) -> &[GraphEdge] {
        self.get(name).map(|node| node.edges.as_slice()).unwrap_or(&[])
    }

    pub fn dangling_edges(&self) -> &[DanglingEdge] {
        &self.dangling
    }

    pub fn shadowed(&self) -> &[ShadowedDefinition] {
        &self.shadowed
    }

    pub fn shadows_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ShadowedDefinition> + 'a {
        self.shadowed.iter().filter(move |s| s.name == name)
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// The underlying petgraph, for graph algorithms.
    pub fn as_petgraph(&self) -> &DiGraph<ClassNode, GraphEdge> {
        &self.graph
    }
}

pub(crate) struct PendingClass {
    pub(crate) record: ClassRecord,
    pub(crate) provenance: Provenance,
    pub(crate) edges: Vec<GraphEdge>,
}

pub(crate) struct NameSlot {
    pub(crate) authoritative: PendingClass,
    pub(crate) shadows: Vec<PendingClass>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// First record seen for this name.
    Recorded,
    /// Replaced a record that arrived earlier from a lower-priority root.
    Displaced,
    /// A higher-priority record already owns the name.
    Shadowed,
}

/// Concurrent builder. Insertion locks one name-table bucket at a time; the
/// graph is only assembled in [`GraphBuilder::finish`].
pub struct GraphBuilder {
    slots: DashMap<String, NameSlot>,
    forward_references: AtomicUsize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            forward_references: AtomicUsize::new(0),
        }
    }

    pub fn record(&self, record: ClassRecord, provenance: Provenance) -> RecordOutcome {
        let edges = derive_edges(&record);
        let forward = edges
            .iter()
            .filter(|edge| !self.slots.contains_key(&edge.target))
            .count();

        let outcome = match self.slots.entry(record.name.clone()) {
            Entry::Vacant(vacant) => {
                vacant.insert(NameSlot {
                    authoritative: PendingClass {
                        record,
                        provenance,
                        edges,
                    },
                    shadows: Vec::new(),
                });
                RecordOutcome::Recorded
            }
            Entry::Occupied(mut occupied) => {
                let slot = occupied.get_mut();
                if provenance.arrival() < slot.authoritative.provenance.arrival() {
                    let mut previous = std::mem::replace(
                        &mut slot.authoritative,
                        PendingClass {
                            record,
                            provenance,
                            edges,
                        },
                    );
                    previous.edges.clear();
                    slot.shadows.push(previous);
                    RecordOutcome::Displaced
                } else {
                    debug!(class = %record.name, location = %provenance.location, "shadowed definition");
                    slot.shadows.push(PendingClass {
                        record,
                        provenance,
                        edges: Vec::new(),
                    });
                    RecordOutcome::Shadowed
                }
            }
        };

        if outcome != RecordOutcome::Shadowed {
            self.forward_references.fetch_add(forward, Ordering::Relaxed);
        }
        outcome
    }

    pub fn state(&self, name: &str) -> ClassState {
        if self.slots.contains_key(name) {
            ClassState::Recorded
        } else {
            ClassState::Unseen
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Edges created before their target was recorded.
    pub fn forward_references(&self) -> usize {
        self.forward_references.load(Ordering::Relaxed)
    }

    /// Run the final resolution pass and freeze the graph.
    pub fn finish(self, diagnostics: &Diagnostics) -> ClassGraph {
        let slots: Vec<NameSlot> = self.slots.into_iter().map(|(_, slot)| slot).collect();
        super::resolver::freeze(slots, diagnostics)
    }
}

/// Every outgoing relation of `record`, deduplicated, in declaration order.
pub fn derive_edges(record: &ClassRecord) -> Vec<GraphEdge> {
    let mut edges = EdgeSet::new(&record.name);
    let mut names = Vec::new();

    if let Some(superclass) = &record.superclass {
        edges.push(EdgeKind::Extends, superclass, &EdgeOrigin::Class);
    }
    for interface in &record.interfaces {
        edges.push(EdgeKind::Implements, interface, &EdgeOrigin::Class);
    }
    if let Some(signature) = &record.parsed_signature {
        signature.referenced_classes(&mut names);
        edges.extend(EdgeKind::Referenced, names.drain(..), &EdgeOrigin::Class);
    }
    edges.annotations(&record.annotations, &EdgeOrigin::Class);

    for field in &record.fields {
        let origin = EdgeOrigin::Field {
            name: field.name.clone(),
            visibility: field.visibility(),
        };
        if let Ok(descriptor) = parse_field_signature(&field.descriptor) {
            descriptor.referenced_classes(&mut names);
        }
        if let Some(signature) = &field.parsed_signature {
            signature.referenced_classes(&mut names);
        }
        edges.extend(EdgeKind::FieldType, names.drain(..), &origin);
        edges.annotations(&field.annotations, &origin);
    }

    for method in &record.methods {
        let origin = EdgeOrigin::Method {
            name: method.name.clone(),
            descriptor: method.descriptor.clone(),
            visibility: method.visibility(),
        };
        let mut params = Vec::new();
        let mut results = Vec::new();
        let mut throws = Vec::new();
        let mut bounds = Vec::new();
        let signatures = parse_method_signature(&method.descriptor)
            .ok()
            .into_iter()
            .chain(method.parsed_signature.iter().cloned());
        for signature in signatures {
            for parameter in &signature.parameters {
                parameter.referenced_classes(&mut params);
            }
            if let Some(result) = &signature.result {
                result.referenced_classes(&mut results);
            }
            for thrown in &signature.throws {
                thrown.referenced_classes(&mut throws);
            }
            signature.type_parameter_references(&mut bounds);
        }
        throws.extend(method.exceptions.iter().cloned());

        edges.extend(EdgeKind::MethodParamType, params, &origin);
        edges.extend(EdgeKind::MethodReturnType, results, &origin);
        edges.extend(EdgeKind::ThrowsType, throws, &origin);
        edges.extend(EdgeKind::Referenced, bounds, &origin);
        edges.annotations(&method.annotations, &origin);
        for parameter in &method.parameter_annotations {
            edges.annotations(parameter, &origin);
        }
        if let Some(default) = &method.annotation_default {
            default.referenced_classes(&mut names);
            edges.extend(EdgeKind::Referenced, names.drain(..), &origin);
        }
    }

    let body: Vec<String> = record
        .referenced_classes
        .iter()
        .filter(|name| !edges.targets(name))
        .cloned()
        .collect();
    edges.extend(EdgeKind::Referenced, body, &EdgeOrigin::Body);

    edges.into_vec()
}

struct EdgeSet<'a> {
    owner: &'a str,
    edges: Vec<GraphEdge>,
}

impl<'a> EdgeSet<'a> {
    fn new(owner: &'a str) -> Self {
        Self {
            owner,
            edges: Vec::new(),
        }
    }

    fn push(&mut self, kind: EdgeKind, target: &str, origin: &EdgeOrigin) {
        // Self-supertypes are kept so the resolver can report the cycle.
        if target == self.owner && !kind.is_hierarchy() {
            return;
        }
        let duplicate = self.edges.iter().any(|edge| {
            edge.target == target
                && edge.origin == *origin
                && (edge.kind == kind || kind == EdgeKind::Referenced)
        });
        if !duplicate {
            self.edges
                .push(GraphEdge::new(kind, target, origin.clone()));
        }
    }

    fn extend<I: IntoIterator<Item = String>>(&mut self, kind: EdgeKind, targets: I, origin: &EdgeOrigin) {
        for target in targets {
            self.push(kind, &target, origin);
        }
    }

    fn annotations(&mut self, annotations: &[AnnotationRecord], origin: &EdgeOrigin) {
        let mut values = Vec::new();
        for annotation in annotations {
            self.push(EdgeKind::AnnotatedBy, &annotation.type_name, origin);
            for element in &annotation.values {
                element.value.referenced_classes(&mut values);
            }
        }
        self.extend(EdgeKind::Referenced, values, origin);
    }

    fn targets(&self, name: &str) -> bool {
        name == self.owner || self.edges.iter().any(|edge| edge.target == name)
    }

    fn into_vec(self) -> Vec<GraphEdge> {
        self.edges
    }
}
