use std::collections::HashMap;

use super::classfile::MAGIC;
use super::reader::encode_modified_utf8;
use super::record::{
    binary_to_internal, AnnotationRecord, AnnotationValue, ClassRecord, ConstantValue,
    FieldRecord, MethodRecord,
};

/// Encode a record as a class descriptor that [`super::classfile::decode_class`]
/// reads back. All annotations are written as runtime-visible.
pub fn encode_class(record: &ClassRecord) -> Vec<u8> {
    let mut pool = PoolBuilder::default();
    let mut body = Vec::new();

    put_u2(&mut body, record.access.0);
    put_u2(&mut body, pool.class(&record.name));
    put_u2(
        &mut body,
        record.superclass.as_deref().map(|s| pool.class(s)).unwrap_or(0),
    );
    put_u2(&mut body, record.interfaces.len() as u16);
    for interface in &record.interfaces {
        put_u2(&mut body, pool.class(interface));
    }

    put_u2(&mut body, record.fields.len() as u16);
    for field in &record.fields {
        write_field(&mut body, &mut pool, field);
    }
    put_u2(&mut body, record.methods.len() as u16);
    for method in &record.methods {
        write_method(&mut body, &mut pool, method);
    }

    let mut attributes = Vec::new();
    if let Some(signature) = &record.signature {
        let index = pool.utf8(signature);
        attributes.push(("Signature", index.to_be_bytes().to_vec()));
    }
    if !record.annotations.is_empty() {
        let encoded = annotations_body(&mut pool, &record.annotations);
        attributes.push(("RuntimeVisibleAnnotations", encoded));
    }
    if !record.inner_classes.is_empty() {
        let mut encoded = Vec::new();
        put_u2(&mut encoded, record.inner_classes.len() as u16);
        for entry in &record.inner_classes {
            put_u2(&mut encoded, pool.class(&entry.inner));
            put_u2(
                &mut encoded,
                entry.outer.as_deref().map(|o| pool.class(o)).unwrap_or(0),
            );
            put_u2(
                &mut encoded,
                entry.simple_name.as_deref().map(|n| pool.utf8(n)).unwrap_or(0),
            );
            put_u2(&mut encoded, entry.access.0);
        }
        attributes.push(("InnerClasses", encoded));
    }
    write_attributes(&mut body, &mut pool, attributes);

    for referenced in &record.referenced_classes {
        pool.class(referenced);
    }

    let mut out = Vec::with_capacity(10 + pool.bytes.len() + body.len());
    out.extend_from_slice(&MAGIC.to_be_bytes());
    put_u2(&mut out, record.minor_version);
    put_u2(&mut out, record.major_version);
    put_u2(&mut out, pool.next_index);
    out.extend_from_slice(&pool.bytes);
    out.extend_from_slice(&body);
    out
}

fn write_field(out: &mut Vec<u8>, pool: &mut PoolBuilder, field: &FieldRecord) {
    put_u2(out, field.access.0);
    put_u2(out, pool.utf8(&field.name));
    put_u2(out, pool.utf8(&field.descriptor));

    let mut attributes = Vec::new();
    if let Some(signature) = &field.signature {
        attributes.push(("Signature", pool.utf8(signature).to_be_bytes().to_vec()));
    }
    if let Some(value) = &field.constant_value {
        let index = match value {
            ConstantValue::Int(v) => pool.integer(*v),
            ConstantValue::Long(v) => pool.long(*v),
            ConstantValue::Float(v) => pool.float(*v),
            ConstantValue::Double(v) => pool.double(*v),
            ConstantValue::String(v) => pool.string(v),
        };
        attributes.push(("ConstantValue", index.to_be_bytes().to_vec()));
    }
    if !field.annotations.is_empty() {
        let encoded = annotations_body(pool, &field.annotations);
        attributes.push(("RuntimeVisibleAnnotations", encoded));
    }
    write_attributes(out, pool, attributes);
}

fn write_method(out: &mut Vec<u8>, pool: &mut PoolBuilder, method: &MethodRecord) {
    put_u2(out, method.access.0);
    put_u2(out, pool.utf8(&method.name));
    put_u2(out, pool.utf8(&method.descriptor));

    let mut attributes = Vec::new();
    if let Some(signature) = &method.signature {
        attributes.push(("Signature", pool.utf8(signature).to_be_bytes().to_vec()));
    }
    if !method.exceptions.is_empty() {
        let mut encoded = Vec::new();
        put_u2(&mut encoded, method.exceptions.len() as u16);
        for exception in &method.exceptions {
            put_u2(&mut encoded, pool.class(exception));
        }
        attributes.push(("Exceptions", encoded));
    }
    if !method.annotations.is_empty() {
        let encoded = annotations_body(pool, &method.annotations);
        attributes.push(("RuntimeVisibleAnnotations", encoded));
    }
    if !method.parameter_annotations.is_empty() {
        let mut encoded = vec![method.parameter_annotations.len() as u8];
        for parameter in &method.parameter_annotations {
            encoded.extend(annotations_body(pool, parameter));
        }
        attributes.push(("RuntimeVisibleParameterAnnotations", encoded));
    }
    if let Some(value) = &method.annotation_default {
        let mut encoded = Vec::new();
        write_element_value(&mut encoded, pool, value);
        attributes.push(("AnnotationDefault", encoded));
    }
    write_attributes(out, pool, attributes);
}

fn write_attributes(out: &mut Vec<u8>, pool: &mut PoolBuilder, attributes: Vec<(&str, Vec<u8>)>) {
    put_u2(out, attributes.len() as u16);
    for (name, body) in attributes {
        put_u2(out, pool.utf8(name));
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
    }
}

fn annotations_body(pool: &mut PoolBuilder, annotations: &[AnnotationRecord]) -> Vec<u8> {
    let mut out = Vec::new();
    put_u2(&mut out, annotations.len() as u16);
    for annotation in annotations {
        write_annotation(&mut out, pool, annotation);
    }
    out
}

fn write_annotation(out: &mut Vec<u8>, pool: &mut PoolBuilder, annotation: &AnnotationRecord) {
    put_u2(out, pool.utf8(&class_descriptor(&annotation.type_name)));
    put_u2(out, annotation.values.len() as u16);
    for element in &annotation.values {
        put_u2(out, pool.utf8(&element.name));
        write_element_value(out, pool, &element.value);
    }
}

fn write_element_value(out: &mut Vec<u8>, pool: &mut PoolBuilder, value: &AnnotationValue) {
    match value {
        AnnotationValue::Byte(v) => tagged(out, b'B', pool.integer(*v as i32)),
        AnnotationValue::Char(v) => tagged(out, b'C', pool.integer(*v as i32)),
        AnnotationValue::Short(v) => tagged(out, b'S', pool.integer(*v as i32)),
        AnnotationValue::Boolean(v) => tagged(out, b'Z', pool.integer(*v as i32)),
        AnnotationValue::Int(v) => tagged(out, b'I', pool.integer(*v)),
        AnnotationValue::Long(v) => tagged(out, b'J', pool.long(*v)),
        AnnotationValue::Float(v) => tagged(out, b'F', pool.float(*v)),
        AnnotationValue::Double(v) => tagged(out, b'D', pool.double(*v)),
        AnnotationValue::String(v) => tagged(out, b's', pool.utf8(v)),
        AnnotationValue::Enum {
            type_name,
            constant,
        } => {
            out.push(b'e');
            put_u2(out, pool.utf8(&class_descriptor(type_name)));
            put_u2(out, pool.utf8(constant));
        }
        AnnotationValue::Class(descriptor) => tagged(out, b'c', pool.utf8(descriptor)),
        AnnotationValue::Annotation(annotation) => {
            out.push(b'@');
            write_annotation(out, pool, annotation);
        }
        AnnotationValue::Array(values) => {
            out.push(b'[');
            put_u2(out, values.len() as u16);
            for value in values {
                write_element_value(out, pool, value);
            }
        }
    }
}

fn tagged(out: &mut Vec<u8>, tag: u8, index: u16) {
    out.push(tag);
    put_u2(out, index);
}

fn class_descriptor(binary_name: &str) -> String {
    format!("L{};", binary_to_internal(binary_name))
}

fn put_u2(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Deduplicating constant pool under construction.
struct PoolBuilder {
    bytes: Vec<u8>,
    next_index: u16,
    lookup: HashMap<(u8, Vec<u8>), u16>,
}

impl Default for PoolBuilder {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            next_index: 1,
            lookup: HashMap::new(),
        }
    }
}

impl PoolBuilder {
    fn intern(&mut self, tag: u8, payload: Vec<u8>, slots: u16) -> u16 {
        if let Some(&index) = self.lookup.get(&(tag, payload.clone())) {
            return index;
        }
        let index = self.next_index;
        self.bytes.push(tag);
        self.bytes.extend_from_slice(&payload);
        self.next_index += slots;
        self.lookup.insert((tag, payload), index);
        index
    }

    fn utf8(&mut self, text: &str) -> u16 {
        let encoded = encode_modified_utf8(text);
        let mut payload = Vec::with_capacity(encoded.len() + 2);
        payload.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
        payload.extend_from_slice(&encoded);
        self.intern(1, payload, 1)
    }

    fn class(&mut self, binary_name: &str) -> u16 {
        let name_index = self.utf8(&binary_to_internal(binary_name));
        self.intern(7, name_index.to_be_bytes().to_vec(), 1)
    }

    fn string(&mut self, text: &str) -> u16 {
        let string_index = self.utf8(text);
        self.intern(8, string_index.to_be_bytes().to_vec(), 1)
    }

    fn integer(&mut self, value: i32) -> u16 {
        self.intern(3, value.to_be_bytes().to_vec(), 1)
    }

    fn float(&mut self, value: f32) -> u16 {
        self.intern(4, value.to_bits().to_be_bytes().to_vec(), 1)
    }

    fn long(&mut self, value: i64) -> u16 {
        self.intern(5, value.to_be_bytes().to_vec(), 2)
    }

    fn double(&mut self, value: f64) -> u16 {
        self.intern(6, value.to_bits().to_be_bytes().to_vec(), 2)
    }
}
