mod common;

use classweave::core::{Completion, LoaderPaths, PathEntry};
use classweave::parsers::{AnnotationRecord, ClassRecord};
use classweave::{ClassNode, ClasspathScanner, ErrorKind, ScanConfig};
use common::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn scanner() -> ClasspathScanner {
    ClasspathScanner::new(ScanConfig::default())
}

fn dir_with(root: &Path, name: &str, records: &[ClassRecord]) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    write_classes(&dir, records);
    dir
}

/// Descriptor whose `this_class` index points past a three-slot constant pool.
fn truncated_pool_descriptor() -> Vec<u8> {
    let mut bytes = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 52, 0, 3];
    bytes.push(1);
    bytes.extend_from_slice(&3u16.to_be_bytes());
    bytes.extend_from_slice(b"p/X");
    bytes.push(7);
    bytes.extend_from_slice(&1u16.to_be_bytes());
    bytes.extend_from_slice(&0x21u16.to_be_bytes());
    bytes.extend_from_slice(&40u16.to_be_bytes());
    bytes.extend_from_slice(&0u16.to_be_bytes());
    bytes
}

#[test]
fn test_first_root_owns_duplicate_class() {
    let temp = TempDir::new().unwrap();
    let r1 = dir_with(
        temp.path(),
        "r1",
        &[class("dup.X").with_field(field("fromFirst", "I", PUBLIC))],
    );
    let r2 = write_jar(
        &temp.path().join("r2.jar"),
        &class_entries(&[
            class("dup.X").with_field(field("fromSecond", "J", PUBLIC)),
            class("dup.Only"),
        ]),
    );

    let result = scanner().scan_paths(&[r1.clone(), r2.clone()]).unwrap();

    assert!(result.is_complete());
    assert!(result.diagnostics.is_empty());
    let x = result.graph.get("dup.X").unwrap();
    assert!(x.record.field("fromFirst").is_some());
    assert!(x.record.field("fromSecond").is_none());
    assert_eq!(x.provenance.root_rank, 0);
    assert_eq!(x.provenance.root_path, r1.canonicalize().unwrap());

    let shadows: Vec<_> = result.graph.shadows_of("dup.X").collect();
    assert_eq!(shadows.len(), 1);
    assert_eq!(shadows[0].provenance.root_rank, 1);
    assert!(shadows[0].record.field("fromSecond").is_some());
    assert_eq!(result.stats.shadowed, 1);
    assert_eq!(result.graph.len(), 2);

    // Reversing root order flips ownership.
    let result = scanner().scan_paths(&[r2, r1]).unwrap();
    let x = result.graph.get("dup.X").unwrap();
    assert!(x.record.field("fromSecond").is_some());
}

#[test]
fn test_malformed_entry_does_not_stop_its_root() {
    let temp = TempDir::new().unwrap();
    let mut entries = class_entries(&[class("good.A"), class("good.B")]);
    entries.insert(1, ("bad/X.class".to_string(), truncated_pool_descriptor()));
    entries.push(("good/C.class".to_string(), encode(&class("good.C"))));
    let jar = write_jar(&temp.path().join("mixed.jar"), &entries);

    let result = scanner().scan_paths(&[jar.clone()]).unwrap();

    let names: Vec<&str> = result.graph.classes().map(|n| n.name()).collect();
    assert_eq!(names, vec!["good.A", "good.B", "good.C"]);
    assert_eq!(result.stats.entries, 4);
    assert_eq!(result.diagnostics.len(), 1);

    let diagnostic = &result.diagnostics[0];
    assert_eq!(diagnostic.kind(), ErrorKind::MalformedDescriptor);
    assert!(diagnostic.error.to_string().contains("bad/X.class"));
    assert_eq!(diagnostic.payload.as_deref(), Some(&truncated_pool_descriptor()[..]));
    assert!(result.is_complete());
}

fn encode(record: &ClassRecord) -> Vec<u8> {
    classweave::parsers::encode_class(record)
}

#[test]
fn test_missing_and_unreadable_roots_are_diagnostics() {
    let temp = TempDir::new().unwrap();
    let good = dir_with(temp.path(), "good", &[class("ok.A")]);
    let not_zip = temp.path().join("broken.jar");
    fs::write(&not_zip, b"not a zip at all").unwrap();

    let result = scanner()
        .scan_paths(&[temp.path().join("missing.jar"), not_zip, good])
        .unwrap();

    let kinds: Vec<ErrorKind> = result.diagnostics.iter().map(|d| d.kind()).collect();
    assert!(kinds.contains(&ErrorKind::PathNotFound));
    assert!(kinds.contains(&ErrorKind::ArchiveRead));
    assert_eq!(result.roots.len(), 2);
    assert!(result.graph.contains("ok.A"));
}

#[test]
fn test_malformed_signature_keeps_class() {
    let temp = TempDir::new().unwrap();
    let mut record = class("sig.Broken");
    record.signature = Some("<T:Ljava/lang/Object;>Ljava/lang/Object".to_string());
    let dir = dir_with(temp.path(), "classes", &[record]);

    let result = scanner().scan_paths(&[dir]).unwrap();

    assert!(result.graph.contains("sig.Broken"));
    assert_eq!(result.diagnostics.len(), 1);
    assert_eq!(result.diagnostics[0].kind(), ErrorKind::MalformedSignature);
    let node = result.graph.get("sig.Broken").unwrap();
    assert!(node.record.parsed_signature.is_none());
    assert_eq!(node.record.signature.as_deref(), Some("<T:Ljava/lang/Object;>Ljava/lang/Object"));
}

#[test]
fn test_annotation_and_hierarchy_queries() {
    let temp = TempDir::new().unwrap();
    let mut handler = method("handle", "()V", PUBLIC);
    handler.annotations.push(AnnotationRecord::new("q.Route"));
    let mut injected = field("dep", "Lq/Base;", PRIVATE);
    injected.annotations.push(AnnotationRecord::new("q.Inject"));

    let dir = dir_with(
        temp.path(),
        "classes",
        &[
            annotation_type("q.Component"),
            annotation_type("q.Service").with_annotation(AnnotationRecord::new("q.Component")),
            interface("q.Api"),
            interface("q.ExtendedApi").with_interface("q.Api"),
            class("q.Base").with_interface("q.ExtendedApi"),
            class("q.Impl")
                .with_superclass(Some("q.Base"))
                .with_annotation(AnnotationRecord::new("q.Service"))
                .with_method(handler)
                .with_field(injected),
            class("q.Leaf")
                .with_superclass(Some("q.Impl"))
                .with_annotation(AnnotationRecord::new("q.Component")),
        ],
    );

    let result = scanner().scan_paths(&[dir]).unwrap();
    let graph = &result.graph;

    assert_eq!(
        sorted_names(graph.classes_with_annotation("q.Component")),
        vec!["q.Impl", "q.Leaf", "q.Service"]
    );
    assert_eq!(sorted_names(graph.classes_with_annotation("q.Service")), vec!["q.Impl"]);
    assert_eq!(sorted_names(graph.classes_with_method_annotation("q.Route")), vec!["q.Impl"]);
    assert_eq!(sorted_names(graph.classes_with_field_annotation("q.Inject")), vec!["q.Impl"]);
    assert!(graph.classes_with_annotation("q.Unknown").is_empty());

    assert_eq!(sorted_names(graph.direct_subtypes("q.Base")), vec!["q.Impl"]);
    assert_eq!(sorted_names(graph.subclasses("q.Base")), vec!["q.Impl", "q.Leaf"]);
    assert_eq!(
        sorted_names(graph.implementors("q.Api")),
        vec!["q.Base", "q.ExtendedApi", "q.Impl", "q.Leaf"]
    );
    // Supertypes outside the scan still index their subtypes.
    assert_eq!(graph.direct_subtypes("java.lang.Object").len(), 5);

    let chain: Vec<&str> = graph.superclasses("q.Leaf").iter().map(|n| n.name()).collect();
    assert_eq!(chain, vec!["q.Impl", "q.Base"]);
    let interfaces: Vec<&str> = graph.interfaces("q.Leaf").iter().map(|n| n.name()).collect();
    assert_eq!(interfaces, vec!["q.ExtendedApi", "q.Api"]);
}

fn sorted_names(nodes: Vec<&ClassNode>) -> Vec<String> {
    let mut names: Vec<String> = nodes.iter().map(|n| n.name().to_string()).collect();
    names.sort();
    names
}

#[test]
fn test_cancel_before_scan() {
    let temp = TempDir::new().unwrap();
    let dir = dir_with(temp.path(), "classes", &[class("c.A")]);
    let scanner = scanner();

    let handle = scanner.cancel_handle();
    handle.cancel();
    let result = scanner.scan_paths(&[dir.clone()]).unwrap();

    assert_eq!(result.completion, Completion::Cancelled);
    assert!(!result.is_complete());
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.kind() == ErrorKind::Cancelled));
    assert!(result.graph.is_empty());

    handle.reset();
    let result = scanner.scan_paths(&[dir]).unwrap();
    assert_eq!(result.completion, Completion::Complete);
    assert!(result.graph.contains("c.A"));
}

#[test]
fn test_zero_timeout_reports_timed_out() {
    let temp = TempDir::new().unwrap();
    let dir = dir_with(temp.path(), "classes", &[class("t.A")]);
    let mut config = ScanConfig::default();
    config.scan.timeout_secs = Some(0);

    let result = ClasspathScanner::new(config).scan_paths(&[dir]).unwrap();

    assert_eq!(result.completion, Completion::TimedOut);
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.kind() == ErrorKind::TimedOut));
}

#[test]
fn test_dedicated_worker_pool() {
    let temp = TempDir::new().unwrap();
    let records: Vec<ClassRecord> = (0..40).map(|i| class(&format!("w.C{i:02}"))).collect();
    let jar = write_jar(&temp.path().join("many.jar"), &class_entries(&records));
    let mut config = ScanConfig::default();
    config.scan.worker_threads = 2;

    let result = ClasspathScanner::new(config).scan_paths(&[jar]).unwrap();

    assert_eq!(result.graph.len(), 40);
    let names: Vec<&str> = result.graph.classes().map(|n| n.name()).collect();
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn test_package_filters_apply_to_scan() {
    let temp = TempDir::new().unwrap();
    let dir = dir_with(
        temp.path(),
        "classes",
        &[class("keep.A"), class("keep.internal.B"), class("other.C")],
    );
    let mut config = ScanConfig::default();
    config.scan.accept_packages = vec!["keep".to_string()];
    config.scan.reject_packages = vec!["keep.internal".to_string()];

    let result = ClasspathScanner::new(config).scan_paths(&[dir]).unwrap();
    let names: Vec<&str> = result.graph.classes().map(|n| n.name()).collect();
    assert_eq!(names, vec!["keep.A"]);
}

#[test]
fn test_scan_from_config_file() {
    let temp = TempDir::new().unwrap();
    let patched = dir_with(
        temp.path(),
        "patched",
        &[class("cfg.Shared").with_field(field("patched", "Z", PUBLIC))],
    );
    let app = dir_with(
        temp.path(),
        "app",
        &[class("cfg.Shared"), class("cfg.App")],
    );
    let extra = write_jar(
        &temp.path().join("extra.jar"),
        &class_entries(&[class("cfg.Extra")]),
    );

    let toml = format!(
        r#"
[scan]
nested_archive_depth = 2
worker_threads = 1

[classpath]
override = ['{patched}']
paths = ['{extra}']

[[classpath.loaders]]
type = "app"
name = "application"
paths = ['{app}']
"#,
        patched = patched.display(),
        extra = extra.display(),
        app = app.display(),
    );
    let config_path = temp.path().join("classweave.toml");
    fs::write(&config_path, toml).unwrap();

    let config = ScanConfig::load(&config_path).unwrap();
    assert_eq!(config.scan.nested_archive_depth, 2);
    assert_eq!(config.classpath.loaders.len(), 1);
    assert_eq!(config.classpath.loaders[0].display_name(), "application");

    let result = ClasspathScanner::new(config).scan_config_classpath().unwrap();

    let roots: Vec<&Path> = result.roots.iter().map(|r| r.path.as_path()).collect();
    assert_eq!(
        roots,
        vec![
            patched.canonicalize().unwrap().as_path(),
            app.canonicalize().unwrap().as_path(),
            extra.canonicalize().unwrap().as_path(),
        ]
    );
    let shared = result.graph.get("cfg.Shared").unwrap();
    assert!(shared.record.field("patched").is_some());
    assert!(result.graph.contains("cfg.App"));
    assert!(result.graph.contains("cfg.Extra"));
}

#[test]
fn test_config_errors() {
    let error = ScanConfig::from_toml_str("[scan]\nnested_archive_depth = \"deep\"").unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Config);

    let defaults = ScanConfig::load(Path::new("/definitely/not/here.toml")).unwrap();
    assert_eq!(defaults.scan.nested_archive_depth, 1);
    assert!(defaults.scan.invisible_annotations);
    assert!(!defaults.cache.enabled);
}

#[test]
fn test_explicit_loader_paths_with_module_tags() {
    let temp = TempDir::new().unwrap();
    let dir = dir_with(temp.path(), "mod", &[class("m.A")]);
    let loader = LoaderPaths::new("modules").with_entry(PathEntry::directory(&dir).with_module("m.core"));

    let result = scanner().scan(&[loader]).unwrap();

    assert_eq!(result.roots[0].module.as_deref(), Some("m.core"));
    let node = result.graph.get("m.A").unwrap();
    assert_eq!(node.provenance.module.as_deref(), Some("m.core"));
    assert_eq!(node.provenance.entry_name, "m/A.class");
}
