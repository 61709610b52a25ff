use super::constant_pool::{Constant, ConstantPool};
use super::reader::ByteReader;
use super::record::{internal_to_binary, AnnotationElement, AnnotationRecord, AnnotationValue};
use crate::error::DescriptorError;

/// Deepest nesting of annotation and array element values accepted.
pub const MAX_ELEMENT_NESTING: usize = 256;

/// `Lpkg/Name;` to `pkg.Name`; anything else is converted as a bare internal name.
pub fn descriptor_to_class_name(descriptor: &str) -> String {
    descriptor
        .strip_prefix('L')
        .and_then(|rest| rest.strip_suffix(';'))
        .map(internal_to_binary)
        .unwrap_or_else(|| internal_to_binary(descriptor))
}

pub fn read_annotations(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<AnnotationRecord>, DescriptorError> {
    let count = reader.read_u2()?;
    let mut annotations = Vec::with_capacity(count as usize);
    for _ in 0..count {
        annotations.push(read_annotation(reader, pool)?);
    }
    Ok(annotations)
}

pub fn read_parameter_annotations(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<Vec<AnnotationRecord>>, DescriptorError> {
    let parameters = reader.read_u1()?;
    let mut result = Vec::with_capacity(parameters as usize);
    for _ in 0..parameters {
        result.push(read_annotations(reader, pool)?);
    }
    Ok(result)
}

pub fn read_annotation(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<AnnotationRecord, DescriptorError> {
    annotation_at(reader, pool, 0)
}

pub fn read_element_value(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<AnnotationValue, DescriptorError> {
    element_value_at(reader, pool, 0)
}

fn annotation_at(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> Result<AnnotationRecord, DescriptorError> {
    let type_index = reader.read_u2()?;
    let type_name = descriptor_to_class_name(pool.utf8(type_index)?);
    let pairs = reader.read_u2()?;
    let mut values = Vec::with_capacity(pairs as usize);
    for _ in 0..pairs {
        let name = pool.utf8(reader.read_u2()?)?.to_string();
        let value = element_value_at(reader, pool, depth + 1)?;
        values.push(AnnotationElement { name, value });
    }
    Ok(AnnotationRecord { type_name, values })
}

fn element_value_at(
    reader: &mut ByteReader<'_>,
    pool: &ConstantPool,
    depth: usize,
) -> Result<AnnotationValue, DescriptorError> {
    if depth > MAX_ELEMENT_NESTING {
        return Err(DescriptorError::NestingTooDeep {
            limit: MAX_ELEMENT_NESTING,
        });
    }
    let tag = reader.read_u1()?;
    let value = match tag {
        b'B' => AnnotationValue::Byte(integer(pool, reader.read_u2()?)? as i8),
        b'C' => {
            let code = integer(pool, reader.read_u2()?)? as u32;
            AnnotationValue::Char(char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER))
        }
        b'S' => AnnotationValue::Short(integer(pool, reader.read_u2()?)? as i16),
        b'Z' => AnnotationValue::Boolean(integer(pool, reader.read_u2()?)? != 0),
        b'I' => AnnotationValue::Int(integer(pool, reader.read_u2()?)?),
        b'J' => {
            let index = reader.read_u2()?;
            match pool.get(index)? {
                Constant::Long(value) => AnnotationValue::Long(*value),
                _ => return Err(mismatch(index, "Long")),
            }
        }
        b'F' => {
            let index = reader.read_u2()?;
            match pool.get(index)? {
                Constant::Float(value) => AnnotationValue::Float(*value),
                _ => return Err(mismatch(index, "Float")),
            }
        }
        b'D' => {
            let index = reader.read_u2()?;
            match pool.get(index)? {
                Constant::Double(value) => AnnotationValue::Double(*value),
                _ => return Err(mismatch(index, "Double")),
            }
        }
        b's' => AnnotationValue::String(pool.utf8(reader.read_u2()?)?.to_string()),
        b'e' => {
            let type_name = descriptor_to_class_name(pool.utf8(reader.read_u2()?)?);
            let constant = pool.utf8(reader.read_u2()?)?.to_string();
            AnnotationValue::Enum {
                type_name,
                constant,
            }
        }
        b'c' => AnnotationValue::Class(pool.utf8(reader.read_u2()?)?.to_string()),
        b'@' => {
            AnnotationValue::Annotation(Box::new(annotation_at(reader, pool, depth + 1)?))
        },
        b'[' => {
            let count = reader.read_u2()?;
            let mut values = Vec::with_capacity(count as usize);
            for _ in 0..count {
                values.push(element_value_at(reader, pool, depth + 1)?);
            }
            AnnotationValue::Array(values)
        }
        other => {
            return Err(DescriptorError::InvalidAnnotationTag {
                tag: other as char,
            })
        }
    };
    Ok(value)
}

fn integer(pool: &ConstantPool, index: u16) -> Result<i32, DescriptorError> {
    match pool.get(index)? {
        Constant::Integer(value) => Ok(*value),
        _ => Err(mismatch(index, "Integer")),
    }
}

fn mismatch(index: u16, expected: &'static str) -> DescriptorError {
    DescriptorError::ConstantTypeMismatch { index, expected }
}

impl AnnotationValue {
    /// Binary names of classes named by this value (class literals, enum
    /// types, nested annotation types), recursively.
    pub fn referenced_classes(&self, out: &mut Vec<String>) {
        match self {
            AnnotationValue::Enum { type_name, .. } => out.push(type_name.clone()),
            AnnotationValue::Class(descriptor) => {
                let element = descriptor.trim_start_matches('[');
                if element.starts_with('L') {
                    out.push(descriptor_to_class_name(element));
                }
            }
            AnnotationValue::Annotation(annotation) => annotation.referenced_classes(out),
            AnnotationValue::Array(values) => {
                for value in values {
                    value.referenced_classes(out);
                }
            }
            _ => {}
        }
    }
}

impl AnnotationRecord {
    pub fn referenced_classes(&self, out: &mut Vec<String>) {
        out.push(self.type_name.clone());
        for element in &self.values {
            element.value.referenced_classes(out);
        }
    }
}
