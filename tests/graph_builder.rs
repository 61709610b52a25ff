mod common;

use classweave::core::graph::derive_edges;
use classweave::core::{
    ClassState, EdgeKind, EdgeOrigin, GraphBuilder, GraphEdge, Provenance, RecordOutcome,
};
use classweave::parsers::{AnnotationRecord, AnnotationValue, ClassRecord};
use classweave::{Diagnostics, ErrorKind};
use common::*;
use rayon::prelude::*;
use std::path::PathBuf;

fn provenance(root_rank: usize, ordinal: u64, name: &str) -> Provenance {
    Provenance {
        root_rank,
        ordinal,
        root_path: PathBuf::from(format!("root{root_rank}")),
        entry_name: format!("{}.class", name.replace('.', "/")),
        location: format!("root{root_rank}!/{name}"),
        module: None,
    }
}

fn edge_targets(edges: &[GraphEdge], kind: EdgeKind) -> Vec<&str> {
    edges
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.target.as_str())
        .collect()
}

#[test]
fn test_derive_edges_covers_every_relation() {
    let mut handler = method("handle", "(Lp/Request;I)Lp/Response;", PUBLIC);
    handler.exceptions = vec!["p.HandlerException".to_string()];
    handler
        .annotations
        .push(AnnotationRecord::new("p.Route").with_value(
            "kind",
            AnnotationValue::Enum {
                type_name: "p.Method".to_string(),
                constant: "GET".to_string(),
            },
        ));
    let mut record = class("p.Controller")
        .with_superclass(Some("p.Base"))
        .with_interface("p.Api")
        .with_annotation(AnnotationRecord::new("p.Component"))
        .with_field(field("repo", "Lp/Repository;", PRIVATE))
        .with_method(handler);
    record.referenced_classes = vec![
        "p.Base".to_string(),
        "p.Helper".to_string(),
        "p.Controller".to_string(),
    ];

    let edges = derive_edges(&record);

    assert_eq!(edge_targets(&edges, EdgeKind::Extends), vec!["p.Base"]);
    assert_eq!(edge_targets(&edges, EdgeKind::Implements), vec!["p.Api"]);
    assert_eq!(edge_targets(&edges, EdgeKind::AnnotatedBy), vec!["p.Component", "p.Route"]);
    assert_eq!(edge_targets(&edges, EdgeKind::FieldType), vec!["p.Repository"]);
    assert_eq!(edge_targets(&edges, EdgeKind::MethodParamType), vec!["p.Request"]);
    assert_eq!(edge_targets(&edges, EdgeKind::MethodReturnType), vec!["p.Response"]);
    assert_eq!(edge_targets(&edges, EdgeKind::ThrowsType), vec!["p.HandlerException"]);
    assert_eq!(edge_targets(&edges, EdgeKind::Referenced), vec!["p.Method", "p.Helper"]);

    let field_edge = edges.iter().find(|e| e.kind == EdgeKind::FieldType).unwrap();
    assert!(matches!(&field_edge.origin, EdgeOrigin::Field { name, .. } if name == "repo"));
    assert!(!field_edge.accessible_from_subtype);

    let body_edge = edges.iter().find(|e| e.target == "p.Helper").unwrap();
    assert_eq!(body_edge.origin, EdgeOrigin::Body);
    assert!(!body_edge.accessible_from_subtype);

    let return_edge = edges
        .iter()
        .find(|e| e.kind == EdgeKind::MethodReturnType)
        .unwrap();
    assert!(return_edge.accessible_from_subtype);
}

#[test]
fn test_derive_edges_uses_generic_signatures() {
    let mut items = field("items", "Ljava/util/List;", PROTECTED);
    items.signature = Some("Ljava/util/List<Lp/Item;>;".to_string());
    items.parsed_signature =
        Some(classweave::parsers::parse_field_signature("Ljava/util/List<Lp/Item;>;").unwrap());
    let record = class("p.Holder").with_field(items);

    let edges = derive_edges(&record);
    assert_eq!(
        edge_targets(&edges, EdgeKind::FieldType),
        vec!["java.util.List", "p.Item"]
    );
}

#[test]
fn test_graph_resolves_edges_and_dangling() {
    let builder = GraphBuilder::new();
    let sub = class("p.Sub")
        .with_superclass(Some("p.Base"))
        .with_interface("ext.Missing");
    let base = class("p.Base");

    assert_eq!(builder.record(sub, provenance(0, 0, "p.Sub")), RecordOutcome::Recorded);
    assert_eq!(builder.state("p.Base"), ClassState::Unseen);
    assert_eq!(builder.record(base, provenance(0, 1, "p.Base")), RecordOutcome::Recorded);
    assert_eq!(builder.state("p.Base"), ClassState::Recorded);
    // p.Base and ext.Missing from p.Sub, java.lang.Object from p.Base.
    assert_eq!(builder.forward_references(), 3);

    let diagnostics = Diagnostics::new();
    let graph = builder.finish(&diagnostics);

    assert!(diagnostics.is_empty());
    assert_eq!(graph.len(), 2);
    assert!(graph.contains("p.Sub"));
    assert_eq!(graph.get("p.Sub").unwrap().state, ClassState::Resolved);
    assert_eq!(graph.edge_count(), 1);
    let names: Vec<&str> = graph.classes().map(|n| n.name()).collect();
    assert_eq!(names, vec!["p.Sub", "p.Base"]);

    let dangling: Vec<(&str, &str)> = graph
        .dangling_edges()
        .iter()
        .map(|d| (d.from.as_str(), d.edge.target.as_str()))
        .collect();
    assert_eq!(
        dangling,
        vec![
            ("p.Sub", "ext.Missing"),
            ("p.Base", "java.lang.Object"),
        ]
    );
    assert_eq!(
        graph.resolve("p.Nope").unwrap_err().kind(),
        ErrorKind::UnresolvedSymbol
    );
}

#[test]
fn test_earlier_root_wins_regardless_of_insertion_order() {
    let builder = GraphBuilder::new();
    let late = class("p.Dup").with_field(field("fromLate", "I", PUBLIC));
    let early = class("p.Dup").with_field(field("fromEarly", "I", PUBLIC));

    assert_eq!(builder.record(late, provenance(1, 0, "p.Dup")), RecordOutcome::Recorded);
    assert_eq!(builder.record(early, provenance(0, 3, "p.Dup")), RecordOutcome::Displaced);
    let later = class("p.Dup").with_field(field("fromLater", "I", PUBLIC));
    assert_eq!(builder.record(later, provenance(2, 0, "p.Dup")), RecordOutcome::Shadowed);

    let graph = builder.finish(&Diagnostics::new());
    let node = graph.get("p.Dup").unwrap();
    assert!(node.record.field("fromEarly").is_some());
    assert_eq!(node.provenance.root_rank, 0);

    let shadows: Vec<usize> = graph.shadows_of("p.Dup").map(|s| s.provenance.root_rank).collect();
    assert_eq!(shadows, vec![1, 2]);
    assert!(graph
        .shadowed()
        .iter()
        .all(|s| s.authoritative.root_rank == 0));
}

#[test]
fn test_hierarchy_cycle_is_reported_and_cut() {
    let builder = GraphBuilder::new();
    builder.record(
        class("c.A").with_superclass(Some("c.B")),
        provenance(0, 0, "c.A"),
    );
    builder.record(
        class("c.B").with_superclass(Some("c.A")),
        provenance(0, 1, "c.B"),
    );
    builder.record(
        class("c.Leaf").with_superclass(Some("c.A")),
        provenance(0, 2, "c.Leaf"),
    );
    builder.record(
        class("c.Self").with_superclass(Some("c.Self")),
        provenance(0, 3, "c.Self"),
    );

    let diagnostics = Diagnostics::new();
    let graph = builder.finish(&diagnostics);

    let reported: Vec<String> = diagnostics
        .into_vec()
        .into_iter()
        .map(|d| {
            assert_eq!(d.kind(), ErrorKind::CyclicHierarchy);
            d.error.to_string()
        })
        .collect();
    assert_eq!(reported.len(), 3);
    assert!(reported[0].contains("c.A"));
    assert!(reported[1].contains("c.B"));
    assert!(reported[2].contains("c.Self"));

    assert!(graph.outgoing_edges("c.A").is_empty());
    assert!(graph.outgoing_edges("c.Self").is_empty());
    // Edges into the cycle from outside it are kept.
    assert_eq!(edge_targets(graph.outgoing_edges("c.Leaf"), EdgeKind::Extends), vec!["c.A"]);
    assert_eq!(graph.len(), 4);
    let chain: Vec<&str> = graph.superclasses("c.Leaf").iter().map(|n| n.name()).collect();
    assert_eq!(chain, vec!["c.A"]);
}

#[test]
fn test_concurrent_recording_is_deterministic() {
    let mut records: Vec<(ClassRecord, Provenance)> = Vec::new();
    for root in 0..4usize {
        for i in 0..50u64 {
            let name = format!("gen.C{i}");
            let record = class(&name)
                .with_superclass(Some(if i == 0 { "java.lang.Object" } else { "gen.C0" }))
                .with_field(field(&format!("root{root}"), "I", PUBLIC));
            records.push((record, provenance(root, i, &name)));
        }
    }
    records.reverse();

    let builder = GraphBuilder::new();
    records.into_par_iter().for_each(|(record, provenance)| {
        builder.record(record, provenance);
    });
    let graph = builder.finish(&Diagnostics::new());

    assert_eq!(graph.len(), 50);
    assert_eq!(graph.shadowed().len(), 150);
    for node in graph.classes() {
        assert_eq!(node.provenance.root_rank, 0);
        assert!(node.record.field("root0").is_some());
    }
    let order: Vec<u64> = graph.classes().map(|n| n.provenance.ordinal).collect();
    assert_eq!(order, (0..50).collect::<Vec<_>>());
    assert_eq!(graph.direct_subtypes("gen.C0").len(), 49);
}
