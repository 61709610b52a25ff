mod common;

use classweave::core::{AccessContext, AccessibilityIndexer, DependencyScope, EdgeKind};
use classweave::{ClassGraph, ClasspathScanner, ErrorKind, ScanConfig};
use common::*;
use std::collections::BTreeSet;
use tempfile::TempDir;

fn scan(records: &[classweave::parsers::ClassRecord]) -> (TempDir, ClassGraph) {
    let temp = TempDir::new().unwrap();
    write_classes(temp.path(), records);
    let result = ClasspathScanner::new(ScanConfig::default())
        .scan_paths(&[temp.path().to_path_buf()])
        .unwrap();
    assert!(result.is_complete());
    (temp, result.graph)
}

fn names(nodes: &[&classweave::ClassNode]) -> BTreeSet<String> {
    nodes.iter().map(|n| n.name().to_string()).collect()
}

fn set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// `Sub extends Parent`, where `Parent` declares one member per visibility.
fn inheritance_fixture(sub_package: &str) -> Vec<classweave::parsers::ClassRecord> {
    let parent = class("app.Parent")
        .with_method(method("publicDep", "()Lapp/PublicDep;", PUBLIC))
        .with_field(field("protField", "Lapp/ProtFieldDep;", PROTECTED))
        .with_method(method("pkgDep", "()Lapp/PkgDep;", PACKAGE))
        .with_method(method("privDep", "()Lapp/PrivDep;", PRIVATE));
    let sub = class(&format!("{sub_package}.Sub")).with_superclass(Some("app.Parent"));
    vec![
        sub,
        parent,
        class("app.PublicDep"),
        class("app.ProtFieldDep"),
        class("app.PkgDep"),
        class("app.PrivDep"),
    ]
}

#[test]
fn test_accessible_only_dependencies_same_package() {
    let (_temp, graph) = scan(&inheritance_fixture("app"));

    let accessible = graph
        .class_dependencies("app.Sub", DependencyScope::AccessibleOnly)
        .unwrap();
    assert_eq!(
        names(&accessible),
        set(&["app.Parent", "app.PublicDep", "app.ProtFieldDep", "app.PkgDep"])
    );

    let all = graph
        .class_dependencies("app.Sub", DependencyScope::All)
        .unwrap();
    assert_eq!(
        names(&all),
        set(&[
            "app.Parent",
            "app.PublicDep",
            "app.ProtFieldDep",
            "app.PkgDep",
            "app.PrivDep"
        ])
    );
    assert_eq!(all[0].name(), "app.Parent");
}

#[test]
fn test_subtype_in_other_package_loses_package_private() {
    let (_temp, graph) = scan(&inheritance_fixture("other"));

    let accessible = graph
        .class_dependencies("other.Sub", DependencyScope::AccessibleOnly)
        .unwrap();
    assert_eq!(
        names(&accessible),
        set(&["app.Parent", "app.PublicDep", "app.ProtFieldDep"])
    );
}

#[test]
fn test_dependencies_seen_by_context() {
    let (_temp, graph) = scan(&inheritance_fixture("app"));

    let outsider = AccessContext::outsider("elsewhere.Client");
    let seen = graph.dependencies_seen_by("app.Parent", &outsider).unwrap();
    assert_eq!(names(&seen), set(&["app.PublicDep"]));

    let subtype = AccessContext::new("elsewhere", true);
    let seen = graph.dependencies_seen_by("app.Parent", &subtype).unwrap();
    assert_eq!(names(&seen), set(&["app.PublicDep", "app.ProtFieldDep"]));

    let neighbour = AccessContext::outsider("app.Neighbour");
    let seen = graph.dependencies_seen_by("app.Parent", &neighbour).unwrap();
    assert_eq!(
        names(&seen),
        set(&["app.PublicDep", "app.ProtFieldDep", "app.PkgDep"])
    );
}

#[test]
fn test_accessible_edges_keep_edge_details() {
    let (_temp, graph) = scan(&inheritance_fixture("app"));
    let indexer = AccessibilityIndexer::new(&graph);

    let edges = indexer
        .accessible_edges("app.Parent", &AccessContext::outsider("x.Y"))
        .unwrap();
    let kinds: Vec<(EdgeKind, &str)> = edges
        .iter()
        .map(|e| (e.kind, e.target.as_str()))
        .collect();
    assert_eq!(kinds, vec![(EdgeKind::MethodReturnType, "app.PublicDep")]);
}

#[test]
fn test_inherited_through_interfaces_and_grandparents() {
    let (_temp, graph) = scan(&[
        class("h.Leaf")
            .with_superclass(Some("h.Middle"))
            .with_interface("h.Named"),
        class("h.Middle").with_superclass(Some("h.Root")),
        class("h.Root").with_field(field("shared", "Lh/Shared;", PROTECTED)),
        interface("h.Named").with_method(method("label", "()Lh/Label;", PUBLIC)),
        class("h.Shared"),
        class("h.Label"),
    ]);

    let deps = graph
        .class_dependencies("h.Leaf", DependencyScope::AccessibleOnly)
        .unwrap();
    assert_eq!(
        names(&deps),
        set(&["h.Middle", "h.Named", "h.Root", "h.Shared", "h.Label"])
    );

    let ancestors: Vec<&str> = graph.ancestors("h.Leaf").iter().map(|n| n.name()).collect();
    assert_eq!(ancestors, vec!["h.Middle", "h.Named", "h.Root"]);
}

#[test]
fn test_unknown_class_is_unresolved() {
    let (_temp, graph) = scan(&[class("a.Only")]);
    let error = graph
        .class_dependencies("a.Missing", DependencyScope::All)
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::UnresolvedSymbol);
    assert!(graph
        .dependencies_seen_by("a.Missing", &AccessContext::outsider("b.C"))
        .is_err());
}

/// `other.Derived extends gen.Base`; `Base` exposes a protected method and
/// touches `gen.BodyDep` only from a method body.
fn member_kinds_fixture() -> Vec<classweave::parsers::ClassRecord> {
    let mut base = class("gen.Base")
        .with_method(method("create", "()Lgen/ProtMethodDep;", PROTECTED))
        .with_method(method("run", "()V", PUBLIC));
    base.referenced_classes = vec!["gen.BodyDep".to_string()];
    vec![
        class("other.Derived").with_superclass(Some("gen.Base")),
        base,
        class("gen.ProtMethodDep"),
        class("gen.BodyDep"),
    ]
}

#[test]
fn test_protected_method_and_body_references() {
    let (_temp, graph) = scan(&member_kinds_fixture());

    let accessible = graph
        .class_dependencies("other.Derived", DependencyScope::AccessibleOnly)
        .unwrap();
    assert_eq!(names(&accessible), set(&["gen.Base", "gen.ProtMethodDep"]));

    let all = graph
        .class_dependencies("other.Derived", DependencyScope::All)
        .unwrap();
    assert_eq!(
        names(&all),
        set(&["gen.Base", "gen.ProtMethodDep", "gen.BodyDep"])
    );

    let outsider = AccessContext::outsider("elsewhere.Client");
    let seen = graph.dependencies_seen_by("gen.Base", &outsider).unwrap();
    assert!(names(&seen).is_empty());
    let subtype = AccessContext::new("elsewhere", true);
    let seen = graph.dependencies_seen_by("gen.Base", &subtype).unwrap();
    assert_eq!(names(&seen), set(&["gen.ProtMethodDep"]));
}

#[test]
fn test_repeated_queries_return_the_same_order() {
    let (_temp, graph) = scan(&inheritance_fixture("other"));
    let ordered = |nodes: Vec<&classweave::ClassNode>| -> Vec<String> {
        nodes.iter().map(|n| n.name().to_string()).collect()
    };

    for scope in [DependencyScope::AccessibleOnly, DependencyScope::All] {
        let first = ordered(graph.class_dependencies("other.Sub", scope).unwrap());
        let second = ordered(graph.class_dependencies("other.Sub", scope).unwrap());
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    let context = AccessContext::new("other", true);
    let first = ordered(graph.dependencies_seen_by("app.Parent", &context).unwrap());
    let second = ordered(graph.dependencies_seen_by("app.Parent", &context).unwrap());
    assert_eq!(first, vec!["app.ProtFieldDep", "app.PublicDep"]);
    assert_eq!(first, second);
}
