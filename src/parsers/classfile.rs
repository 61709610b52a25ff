use super::annotations::{
    descriptor_to_class_name, read_annotations, read_element_value, read_parameter_annotations,
};
use super::constant_pool::{Constant, ConstantPool};
use super::reader::ByteReader;
use super::record::{
    internal_to_binary, AccessFlags, ClassRecord, ConstantValue, FieldRecord, InnerClassEntry,
    MethodRecord,
};
use super::signature::{
    parse_class_signature, parse_field_signature, parse_method_signature, SignatureError,
};
use crate::error::DescriptorError;

pub const MAGIC: u32 = 0xCAFE_BABE;
pub const MIN_MAJOR_VERSION: u16 = 45;

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Also decode `RuntimeInvisible*Annotations` attributes.
    pub invisible_annotations: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            invisible_annotations: true,
        }
    }
}

/// A signature attribute that failed to parse; the raw text stays on the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureIssue {
    pub context: String,
    pub error: SignatureError,
}

#[derive(Debug, Clone)]
pub struct DecodedClass {
    pub record: ClassRecord,
    pub signature_issues: Vec<SignatureIssue>,
}

pub fn decode_class(bytes: &[u8]) -> Result<DecodedClass, DescriptorError> {
    DescriptorParser::new(DecodeOptions::default()).decode(bytes)
}

/// Decodes one class descriptor into a [`ClassRecord`]. Pure: no state is
/// shared between calls, so one parser can serve every worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct DescriptorParser {
    options: DecodeOptions,
}

impl DescriptorParser {
    pub fn new(options: DecodeOptions) -> Self {
        Self { options }
    }

    pub fn decode(&self, bytes: &[u8]) -> Result<DecodedClass, DescriptorError> {
        let mut reader = ByteReader::new(bytes);
        let magic = reader.read_u4()?;
        if magic != MAGIC {
            return Err(DescriptorError::InvalidMagic { found: magic });
        }
        let minor_version = reader.read_u2()?;
        let major_version = reader.read_u2()?;
        if major_version < MIN_MAJOR_VERSION {
            return Err(DescriptorError::UnsupportedVersion {
                major: major_version,
                minor: minor_version,
            });
        }

        let pool = ConstantPool::parse(&mut reader)?;
        let access = AccessFlags(reader.read_u2()?);
        let this_class = pool.class_name(reader.read_u2()?)?;
        let name = internal_to_binary(this_class);
        let superclass = pool
            .optional_class_name(reader.read_u2()?)?
            .map(internal_to_binary);

        let interfaces_count = reader.read_u2()?;
        let mut interfaces = Vec::with_capacity(interfaces_count as usize);
        for _ in 0..interfaces_count {
            interfaces.push(internal_to_binary(pool.class_name(reader.read_u2()?)?));
        }

        let mut issues = Vec::new();

        let fields_count = reader.read_u2()?;
        let mut fields = Vec::with_capacity(fields_count as usize);
        for _ in 0..fields_count {
            fields.push(self.read_field(&mut reader, &pool, &mut issues)?);
        }

        let methods_count = reader.read_u2()?;
        let mut methods = Vec::with_capacity(methods_count as usize);
        for _ in 0..methods_count {
            methods.push(self.read_method(&mut reader, &pool, &mut issues)?);
        }

        let mut record = ClassRecord {
            name,
            access,
            minor_version,
            major_version,
            superclass,
            interfaces,
            fields,
            methods,
            annotations: Vec::new(),
            signature: None,
            parsed_signature: None,
            outer_class: None,
            inner_classes: Vec::new(),
            referenced_classes: Vec::new(),
        };

        let attributes_count = reader.read_u2()?;
        for_each_attribute(&mut reader, &pool, attributes_count, |name, body| {
            match name {
                "Signature" => record.signature = Some(pool.utf8(body.read_u2()?)?.to_string()),
                "RuntimeVisibleAnnotations" => {
                    record.annotations.extend(read_annotations(body, &pool)?)
                }
                "RuntimeInvisibleAnnotations" if self.options.invisible_annotations => {
                    record.annotations.extend(read_annotations(body, &pool)?)
                }
                "InnerClasses" => record.inner_classes = read_inner_classes(body, &pool)?,
                _ => {}
            }
            Ok(())
        })?;

        if let Some(text) = &record.signature {
            match parse_class_signature(text) {
                Ok(parsed) => record.parsed_signature = Some(parsed),
                Err(error) => issues.push(SignatureIssue {
                    context: "class signature".to_string(),
                    error,
                }),
            }
        }

        record.outer_class = record
            .inner_classes
            .iter()
            .find(|entry| entry.inner == record.name)
            .and_then(|entry| entry.outer.clone());
        record.referenced_classes = referenced_classes(&pool, &record.name)?;

        Ok(DecodedClass {
            record,
            signature_issues: issues,
        })
    }

    fn read_field(
        &self,
        reader: &mut ByteReader<'_>,
        pool: &ConstantPool,
        issues: &mut Vec<SignatureIssue>,
    ) -> Result<FieldRecord, DescriptorError> {
        let access = reader.read_u2()?;
        let name = pool.utf8(reader.read_u2()?)?;
        let descriptor = pool.utf8(reader.read_u2()?)?;
        let mut field = FieldRecord::new(name, descriptor, access);

        let attributes_count = reader.read_u2()?;
        for_each_attribute(reader, pool, attributes_count, |attribute, body| {
            match attribute {
                "Signature" => field.signature = Some(pool.utf8(body.read_u2()?)?.to_string()),
                "ConstantValue" => field.constant_value = Some(constant_value(pool, body.read_u2()?)?),
                "RuntimeVisibleAnnotations" => field.annotations.extend(read_annotations(body, pool)?),
                "RuntimeInvisibleAnnotations" if self.options.invisible_annotations => {
                    field.annotations.extend(read_annotations(body, pool)?)
                }
                _ => {}
            }
            Ok(())
        })?;

        if let Some(text) = &field.signature {
            match parse_field_signature(text) {
                Ok(parsed) => field.parsed_signature = Some(parsed),
                Err(error) => issues.push(SignatureIssue {
                    context: format!("field {}", field.name),
                    error,
                }),
            }
        }
        Ok(field)
    }

    fn read_method(
        &self,
        reader: &mut ByteReader<'_>,
        pool: &ConstantPool,
        issues: &mut Vec<SignatureIssue>,
    ) -> Result<MethodRecord, DescriptorError> {
        let access = reader.read_u2()?;
        let name = pool.utf8(reader.read_u2()?)?;
        let descriptor = pool.utf8(reader.read_u2()?)?;
        let mut method = MethodRecord::new(name, descriptor, access);

        let attributes_count = reader.read_u2()?;
        for_each_attribute(reader, pool, attributes_count, |attribute, body| {
            match attribute {
                "Signature" => method.signature = Some(pool.utf8(body.read_u2()?)?.to_string()),
                "Exceptions" => {
                    let count = body.read_u2()?;
                    for _ in 0..count {
                        method
                            .exceptions
                            .push(internal_to_binary(pool.class_name(body.read_u2()?)?));
                    }
                }
                "RuntimeVisibleAnnotations" => {
                    method.annotations.extend(read_annotations(body, pool)?)
                }
                "RuntimeInvisibleAnnotations" if self.options.invisible_annotations => {
                    method.annotations.extend(read_annotations(body, pool)?)
                }
                "RuntimeVisibleParameterAnnotations" => {
                    merge_parameter_annotations(&mut method, read_parameter_annotations(body, pool)?)
                }
                "RuntimeInvisibleParameterAnnotations" if self.options.invisible_annotations => {
                    merge_parameter_annotations(&mut method, read_parameter_annotations(body, pool)?)
                }
                "AnnotationDefault" => {
                    method.annotation_default = Some(read_element_value(body, pool)?)
                }
                _ => {}
            }
            Ok(())
        })?;

        if let Some(text) = &method.signature {
            match parse_method_signature(text) {
                Ok(parsed) => method.parsed_signature = Some(parsed),
                Err(error) => issues.push(SignatureIssue {
                    context: format!("method {}{}", method.name, method.descriptor),
                    error,
                }),
            }
        }
        Ok(method)
    }
}

/// Walk `count` attributes, handing each body to `visit` as its own reader.
/// Bodies are sliced by declared length, so unknown kinds are skipped and a
/// handler can never read into the next attribute.
fn for_each_attribute<'a, F>(
    reader: &mut ByteReader<'a>,
    pool: &ConstantPool,
    count: u16,
    mut visit: F,
) -> Result<(), DescriptorError>
where
    F: FnMut(&str, &mut ByteReader<'a>) -> Result<(), DescriptorError>,
{
    for _ in 0..count {
        let name_index = reader.read_u2()?;
        let length = reader.read_u4()? as usize;
        let name = pool.utf8(name_index)?;
        let body = reader.read_slice(length)?;
        visit(name, &mut ByteReader::new(body))?;
    }
    Ok(())
}

fn merge_parameter_annotations(
    method: &mut MethodRecord,
    parameters: Vec<Vec<super::record::AnnotationRecord>>,
) {
    if method.parameter_annotations.len() < parameters.len() {
        method
            .parameter_annotations
            .resize_with(parameters.len(), Vec::new);
    }
    for (slot, annotations) in method.parameter_annotations.iter_mut().zip(parameters) {
        slot.extend(annotations);
    }
}

fn constant_value(pool: &ConstantPool, index: u16) -> Result<ConstantValue, DescriptorError> {
    match pool.get(index)? {
        Constant::Integer(value) => Ok(ConstantValue::Int(*value)),
        Constant::Long(value) => Ok(ConstantValue::Long(*value)),
        Constant::Float(value) => Ok(ConstantValue::Float(*value)),
        Constant::Double(value) => Ok(ConstantValue::Double(*value)),
        Constant::String { string_index } => {
            Ok(ConstantValue::String(pool.utf8(*string_index)?.to_string()))
        }
        _ => Err(DescriptorError::ConstantTypeMismatch {
            index,
            expected: "constant value",
        }),
    }
}

fn read_inner_classes(
    body: &mut ByteReader<'_>,
    pool: &ConstantPool,
) -> Result<Vec<InnerClassEntry>, DescriptorError> {
    let count = body.read_u2()?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let inner = internal_to_binary(pool.class_name(body.read_u2()?)?);
        let outer = pool
            .optional_class_name(body.read_u2()?)?
            .map(internal_to_binary);
        let simple_name = pool.optional_utf8(body.read_u2()?)?.map(str::to_string);
        let access = AccessFlags(body.read_u2()?);
        entries.push(InnerClassEntry {
            inner,
            outer,
            simple_name,
            access,
        });
    }
    Ok(entries)
}

/// Class constants other than the class itself, deduplicated in pool order.
/// Array descriptors are reduced to their element class.
fn referenced_classes(pool: &ConstantPool, own_name: &str) -> Result<Vec<String>, DescriptorError> {
    let mut names: Vec<String> = Vec::new();
    for internal in pool.class_names()? {
        let name = if internal.starts_with('[') {
            let element = internal.trim_start_matches('[');
            if !element.starts_with('L') {
                continue;
            }
            descriptor_to_class_name(element)
        } else {
            internal_to_binary(internal)
        };
        if name != own_name && !names.contains(&name) {
            names.push(name);
        }
    }
    Ok(names)
}
