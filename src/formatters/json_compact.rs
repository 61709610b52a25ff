use anyhow::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::core::{ClassNode, EdgeKind, EdgeOrigin, ScanResult};
use crate::parsers::record::Visibility;

/// Compact JSON dump of a scan result
pub struct JsonCompactFormatter {
    /// Omit member lists and edge origins
    minimal: bool,
}

impl Default for JsonCompactFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonCompactFormatter {
    pub fn new() -> Self {
        Self { minimal: true }
    }

    pub fn full() -> Self {
        Self { minimal: false }
    }

    pub fn format_to_file(&self, result: &ScanResult, output_path: &Path) -> Result<()> {
        let json_content = self.format_result(result)?;
        fs::write(output_path, json_content)?;
        Ok(())
    }

    pub fn format_result(&self, result: &ScanResult) -> Result<String> {
        Ok(serde_json::to_string(&self.to_value(result))?)
    }

    pub fn to_value(&self, result: &ScanResult) -> Value {
        let graph = &result.graph;

        let roots: Vec<Value> = result
            .roots
            .iter()
            .map(|root| {
                json!({
                    "p": root.path.to_string_lossy(),
                    "k": root.kind,
                    "m": root.module,
                })
            })
            .collect();

        let mut class_ids: HashMap<&str, usize> = HashMap::with_capacity(graph.len());
        let mut classes = Vec::with_capacity(graph.len());
        for (id, node) in graph.classes().enumerate() {
            class_ids.insert(node.name(), id);
            classes.push(self.class_json(node));
        }

        let mut edges = Vec::with_capacity(graph.edge_count());
        for node in graph.classes() {
            let src = class_ids[node.name()];
            for edge in &node.edges {
                if let Some(&tgt) = class_ids.get(edge.target.as_str()) {
                    let edge_json = if self.minimal {
                        json!([src, tgt, edge_code(edge.kind)])
                    } else {
                        json!({
                            "src": src,
                            "tgt": tgt,
                            "type": edge.kind.as_str(),
                            "at": origin_label(&edge.origin),
                            "sub": edge.accessible_from_subtype,
                        })
                    };
                    edges.push(edge_json);
                }
            }
        }

        let dangling: Vec<Value> = graph
            .dangling_edges()
            .iter()
            .map(|d| json!([class_ids.get(d.from.as_str()), d.edge.target, edge_code(d.edge.kind)]))
            .collect();

        let shadowed: Vec<Value> = graph
            .shadowed()
            .iter()
            .map(|s| {
                json!({
                    "n": s.name,
                    "r": s.provenance.root_rank,
                    "loc": s.provenance.location,
                    "by": s.authoritative.root_rank,
                })
            })
            .collect();

        let diagnostics: Vec<Value> = result
            .diagnostics
            .iter()
            .map(|d| json!({ "k": format!("{:?}", d.kind()), "msg": d.error.to_string() }))
            .collect();

        json!({
            "meta": {
                "classes": graph.len(),
                "edges": graph.edge_count(),
                "roots": result.roots.len(),
                "entries": result.stats.entries,
                "completion": result.completion,
                "elapsed_ms": result.stats.elapsed.as_millis() as u64,
                "format": if self.minimal { "compact" } else { "full" },
            },
            "roots": roots,
            "classes": classes,
            "edges": edges,
            "dangling": dangling,
            "shadowed": shadowed,
            "diagnostics": diagnostics,
        })
    }

    fn class_json(&self, node: &ClassNode) -> Value {
        let record = &node.record;
        let mut class = json!({
            "n": record.name,
            "t": kind_code(node),
            "v": visibility_code(record.visibility()),
            "r": node.provenance.root_rank,
        });
        if !self.minimal {
            class["loc"] = json!(node.provenance.location);
            class["sup"] = json!(record.superclass);
            class["ifs"] = json!(record.interfaces);
            class["ann"] = json!(record
                .annotations
                .iter()
                .map(|a| a.type_name.as_str())
                .collect::<Vec<_>>());
            class["f"] = json!(record
                .fields
                .iter()
                .map(|f| json!([f.name, f.descriptor, visibility_code(f.visibility())]))
                .collect::<Vec<_>>());
            class["m"] = json!(record
                .methods
                .iter()
                .map(|m| json!([m.name, m.descriptor, visibility_code(m.visibility())]))
                .collect::<Vec<_>>());
            if let Some(signature) = &record.signature {
                class["sig"] = json!(signature);
            }
            if let Some(module) = &node.provenance.module {
                class["mod"] = json!(module);
            }
        }
        class
    }
}

fn kind_code(node: &ClassNode) -> u8 {
    let record = &node.record;
    if record.is_annotation() {
        3
    } else if record.is_interface() {
        1
    } else if record.is_enum() {
        2
    } else {
        0
    }
}

fn visibility_code(visibility: Visibility) -> u8 {
    match visibility {
        Visibility::Public => 0,
        Visibility::Protected => 1,
        Visibility::PackagePrivate => 2,
        Visibility::Private => 3,
    }
}

fn edge_code(kind: EdgeKind) -> u8 {
    match kind {
        EdgeKind::Extends => 0,
        EdgeKind::Implements => 1,
        EdgeKind::AnnotatedBy => 2,
        EdgeKind::FieldType => 3,
        EdgeKind::MethodParamType => 4,
        EdgeKind::MethodReturnType => 5,
        EdgeKind::ThrowsType => 6,
        EdgeKind::Referenced => 7,
    }
}

fn origin_label(origin: &EdgeOrigin) -> String {
    match origin {
        EdgeOrigin::Class => "class".to_string(),
        EdgeOrigin::Field { name, .. } => format!("field:{name}"),
        EdgeOrigin::Method {
            name, descriptor, ..
        } => format!("method:{name}{descriptor}"),
        EdgeOrigin::Body => "body".to_string(),
    }
}
