#![allow(dead_code)]

use classweave::parsers::record::{
    binary_to_internal, AccessFlags, ClassRecord, FieldRecord, MethodRecord,
};
use classweave::parsers::writer::encode_class;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

pub const PUBLIC: u16 = AccessFlags::PUBLIC;
pub const PROTECTED: u16 = AccessFlags::PROTECTED;
pub const PRIVATE: u16 = AccessFlags::PRIVATE;
pub const PACKAGE: u16 = 0;

pub fn class(name: &str) -> ClassRecord {
    ClassRecord::new(name)
}

pub fn interface(name: &str) -> ClassRecord {
    ClassRecord::new(name)
        .with_access(AccessFlags::PUBLIC | AccessFlags::INTERFACE | AccessFlags::ABSTRACT)
}

pub fn annotation_type(name: &str) -> ClassRecord {
    ClassRecord::new(name)
        .with_access(
            AccessFlags::PUBLIC
                | AccessFlags::INTERFACE
                | AccessFlags::ABSTRACT
                | AccessFlags::ANNOTATION,
        )
        .with_interface("java.lang.annotation.Annotation")
}

pub fn field(name: &str, descriptor: &str, access: u16) -> FieldRecord {
    FieldRecord::new(name, descriptor, access)
}

pub fn method(name: &str, descriptor: &str, access: u16) -> MethodRecord {
    MethodRecord::new(name, descriptor, access)
}

/// Path of a class descriptor inside a root, e.g. `p/Sub.class`.
pub fn entry_name(record: &ClassRecord) -> String {
    format!("{}.class", binary_to_internal(&record.name))
}

/// Write each record as a `.class` file under `dir`.
pub fn write_classes(dir: &Path, records: &[ClassRecord]) {
    for record in records {
        let path = dir.join(entry_name(record));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, encode_class(record)).unwrap();
    }
}

/// In-memory zip archive holding the given raw entries.
pub fn zip_bytes(entries: &[(String, Vec<u8>)]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default();
    for (name, bytes) in entries {
        writer.start_file(name.as_str(), options).unwrap();
        writer.write_all(bytes).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn class_entries(records: &[ClassRecord]) -> Vec<(String, Vec<u8>)> {
    records
        .iter()
        .map(|r| (entry_name(r), encode_class(r)))
        .collect()
}

pub fn write_jar(path: &Path, entries: &[(String, Vec<u8>)]) -> PathBuf {
    fs::write(path, zip_bytes(entries)).unwrap();
    path.to_path_buf()
}
