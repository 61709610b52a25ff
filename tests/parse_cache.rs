mod common;

use classweave::config::CacheSettings;
use classweave::error::ErrorKind;
use classweave::parsers::cache::{CachedClass, ParseCache};
use classweave::{ClasspathScanner, ScanConfig};
use common::*;
use std::fs;
use tempfile::TempDir;

fn cached(name: &str, ordinal: u64) -> CachedClass {
    CachedClass {
        ordinal,
        entry_name: format!("{}.class", name.replace('.', "/")),
        location: format!("lib.jar!/{}", name.replace('.', "/")),
        record: class(name).with_field(field("value", "I", PUBLIC)),
    }
}

#[test]
fn test_store_and_get_in_memory() {
    let temp = TempDir::new().unwrap();
    let jar = write_jar(&temp.path().join("lib.jar"), &class_entries(&[class("p.A")]));
    let cache = ParseCache::in_memory_only();

    assert!(cache.get(&jar, 7).is_none());
    cache
        .store(&jar, 7, 1, vec![cached("p.A", 0)])
        .unwrap();

    let entry = cache.get(&jar, 7).unwrap();
    assert_eq!(entry.entries, 1);
    assert_eq!(entry.classes, vec![cached("p.A", 0)]);
    assert_eq!(cache.stats().memory_entries, 1);
    assert_eq!(cache.stats().disk_entries, 0);
}

#[test]
fn test_fingerprint_mismatch_misses() {
    let temp = TempDir::new().unwrap();
    let jar = write_jar(&temp.path().join("lib.jar"), &class_entries(&[class("p.A")]));
    let cache = ParseCache::in_memory_only();
    cache.store(&jar, 1, 1, vec![cached("p.A", 0)]).unwrap();

    assert!(cache.get(&jar, 2).is_none());
}

#[test]
fn test_changed_archive_invalidates_entry() {
    let temp = TempDir::new().unwrap();
    let jar = write_jar(&temp.path().join("lib.jar"), &class_entries(&[class("p.A")]));
    let cache = ParseCache::in_memory_only();
    cache.store(&jar, 1, 1, vec![cached("p.A", 0)]).unwrap();

    write_jar(&jar, &class_entries(&[class("p.A"), class("p.B")]));
    assert!(cache.get(&jar, 1).is_none());
}

#[test]
fn test_disk_layer_survives_new_instance() {
    let temp = TempDir::new().unwrap();
    let cache_dir = temp.path().join("cache");
    let jar = write_jar(&temp.path().join("lib.jar"), &class_entries(&[class("p.A")]));

    {
        let cache = ParseCache::new(Some(cache_dir.clone())).unwrap();
        cache
            .store(&jar, 3, 2, vec![cached("p.A", 0), cached("p.B", 1)])
            .unwrap();
        assert_eq!(cache.stats().disk_entries, 1);
    }

    let reopened = ParseCache::new(Some(cache_dir.clone())).unwrap();
    let entry = reopened.get(&jar, 3).unwrap();
    assert_eq!(entry.classes.len(), 2);
    assert_eq!(entry.classes[1].record.name, "p.B");
    assert_eq!(reopened.stats().memory_entries, 1);

    reopened.clear().unwrap();
    assert_eq!(reopened.stats().disk_entries, 0);
    assert!(reopened.get(&jar, 3).is_none());
    assert!(cache_dir.is_dir());
}

#[test]
fn test_scanner_reuses_cached_archive() {
    let temp = TempDir::new().unwrap();
    let jar = write_jar(
        &temp.path().join("lib.jar"),
        &class_entries(&[class("p.A"), class("p.B").with_superclass(Some("p.A"))]),
    );
    let classes = temp.path().join("classes");
    fs::create_dir_all(&classes).unwrap();
    write_classes(&classes, &[class("q.C")]);

    let mut config = ScanConfig::default();
    config.cache = CacheSettings {
        enabled: true,
        dir: Some(temp.path().join("cache")),
    };
    let scanner = ClasspathScanner::new(config);

    let first = scanner.scan_paths(&[jar.clone(), classes.clone()]).unwrap();
    assert_eq!(first.stats.cached_roots, 0);
    assert_eq!(first.graph.len(), 3);

    let second = scanner.scan_paths(&[jar, classes]).unwrap();
    // Directories are always re-read.
    assert_eq!(second.stats.cached_roots, 1);
    assert_eq!(second.stats.entries, first.stats.entries);
    assert_eq!(second.graph.len(), 3);
    let names: Vec<&str> = second.graph.classes().map(|n| n.name()).collect();
    assert_eq!(names, vec!["p.A", "p.B", "q.C"]);
    assert_eq!(second.graph.direct_subtypes("p.A").len(), 1);
}

#[test]
fn test_failed_archive_is_not_cached() {
    let temp = TempDir::new().unwrap();
    let mut entries = class_entries(&[class("p.Good")]);
    entries.push(("p/Bad.class".to_string(), vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0]));
    let jar = write_jar(&temp.path().join("lib.jar"), &entries);

    let mut config = ScanConfig::default();
    config.cache.enabled = true;
    config.cache.dir = Some(temp.path().join("cache"));
    let scanner = ClasspathScanner::new(config);

    let first = scanner.scan_paths(&[jar.clone()]).unwrap();
    assert_eq!(first.diagnostics.len(), 1);
    let second = scanner.scan_paths(&[jar]).unwrap();
    assert_eq!(second.stats.cached_roots, 0);
    assert_eq!(second.diagnostics.len(), 1);
}

#[test]
fn test_archive_with_signature_issue_reports_on_every_scan() {
    let temp = TempDir::new().unwrap();
    let mut broken = field("items", "Ljava/util/List;", PUBLIC);
    broken.signature = Some("Ljava/util/List<TT;>".to_string());
    let jar = write_jar(
        &temp.path().join("lib.jar"),
        &class_entries(&[class("p.Broken").with_field(broken), class("p.Fine")]),
    );

    let mut config = ScanConfig::default();
    config.cache.enabled = true;
    config.cache.dir = Some(temp.path().join("cache"));
    let scanner = ClasspathScanner::new(config);

    let kinds = |diagnostics: &[classweave::diagnostics::Diagnostic]| -> Vec<ErrorKind> {
        diagnostics.iter().map(|d| d.kind()).collect()
    };

    let first = scanner.scan_paths(&[jar.clone()]).unwrap();
    assert_eq!(kinds(&first.diagnostics), vec![ErrorKind::MalformedSignature]);
    assert_eq!(first.graph.len(), 2);

    let second = scanner.scan_paths(&[jar]).unwrap();
    assert_eq!(second.stats.cached_roots, 0);
    assert_eq!(kinds(&second.diagnostics), kinds(&first.diagnostics));
    assert_eq!(second.graph.len(), 2);
}
