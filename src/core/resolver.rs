use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use super::graph::{
    ClassGraph, ClassNode, ClassState, DanglingEdge, GraphEdge, NameSlot, ShadowedDefinition,
};
use super::query::QueryIndex;
use crate::diagnostics::Diagnostics;
use crate::error::ScanError;

/// Final linear pass over every recorded class: nodes are laid out in
/// arrival order, each edge is resolved by name or marked dangling, and
/// hierarchy cycles are reported and cut.
pub(crate) fn freeze(mut slots: Vec<NameSlot>, diagnostics: &Diagnostics) -> ClassGraph {
    slots.sort_by_key(|slot| slot.authoritative.provenance.arrival());

    let mut graph: DiGraph<ClassNode, GraphEdge> = DiGraph::with_capacity(slots.len(), 0);
    let mut index: HashMap<String, NodeIndex> = HashMap::with_capacity(slots.len());
    let mut pending_edges: Vec<Vec<GraphEdge>> = Vec::with_capacity(slots.len());
    let mut shadowed = Vec::new();

    for slot in slots {
        let authoritative = slot.authoritative;
        for shadow in slot.shadows {
            shadowed.push(ShadowedDefinition {
                name: shadow.record.name.clone(),
                provenance: shadow.provenance,
                authoritative: authoritative.provenance.clone(),
                record: shadow.record,
            });
        }
        let name = authoritative.record.name.clone();
        let ix = graph.add_node(ClassNode {
            record: authoritative.record,
            provenance: authoritative.provenance,
            state: ClassState::Recorded,
            edges: Vec::new(),
        });
        index.insert(name, ix);
        pending_edges.push(authoritative.edges);
    }
    shadowed.sort_by_key(|s: &ShadowedDefinition| s.provenance.arrival());

    let mut resolved: Vec<Vec<(NodeIndex, GraphEdge)>> = Vec::with_capacity(pending_edges.len());
    let mut dangling = Vec::new();
    for (position, edges) in pending_edges.into_iter().enumerate() {
        let from = NodeIndex::new(position);
        let mut targets = Vec::with_capacity(edges.len());
        for edge in edges {
            match index.get(&edge.target) {
                Some(&to) => targets.push((to, edge)),
                None => dangling.push(DanglingEdge {
                    from: graph[from].record.name.clone(),
                    edge,
                }),
            }
        }
        resolved.push(targets);
    }

    let cycles = hierarchy_cycles(graph.node_count(), &resolved);
    let mut cyclic: Vec<NodeIndex> = cycles.keys().copied().collect();
    cyclic.sort();
    for ix in cyclic {
        diagnostics.report(ScanError::CyclicHierarchy {
            name: graph[ix].record.name.clone(),
        });
    }

    for (position, targets) in resolved.into_iter().enumerate() {
        let from = NodeIndex::new(position);
        for (to, edge) in targets {
            let same_cycle = matches!(
                (cycles.get(&from), cycles.get(&to)),
                (Some(a), Some(b)) if a == b
            );
            if edge.kind.is_hierarchy() && same_cycle {
                debug!(from = %graph[from].record.name, to = %edge.target, "dropping cyclic supertype edge");
                continue;
            }
            graph[from].edges.push(edge.clone());
            graph.add_edge(from, to, edge);
        }
        graph[from].state = ClassState::Resolved;
    }

    info!(
        classes = graph.node_count(),
        edges = graph.edge_count(),
        dangling = dangling.len(),
        shadowed = shadowed.len(),
        "class graph resolved"
    );

    let query = QueryIndex::build(&graph, &index, &dangling);
    ClassGraph {
        graph,
        index,
        dangling,
        shadowed,
        query,
    }
}

/// Nodes on a supertype cycle, mapped to the id of their cycle.
fn hierarchy_cycles(
    nodes: usize,
    resolved: &[Vec<(NodeIndex, GraphEdge)>],
) -> HashMap<NodeIndex, usize> {
    let mut hierarchy: DiGraph<(), ()> = DiGraph::with_capacity(nodes, 0);
    for _ in 0..nodes {
        hierarchy.add_node(());
    }
    let mut self_loops = HashSet::new();
    for (position, targets) in resolved.iter().enumerate() {
        let from = NodeIndex::new(position);
        for (to, edge) in targets {
            if edge.kind.is_hierarchy() {
                if *to == from {
                    self_loops.insert(from);
                }
                hierarchy.add_edge(from, *to, ());
            }
        }
    }

    tarjan_scc(&hierarchy)
        .into_iter()
        .filter(|component| component.len() > 1 || self_loops.contains(&component[0]))
        .enumerate()
        .flat_map(|(id, component)| component.into_iter().map(move |ix| (ix, id)))
        .collect()
}
