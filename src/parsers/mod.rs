pub mod annotations;
pub mod cache;
pub mod classfile;
pub mod constant_pool;
pub mod reader;
pub mod record;
pub mod signature;
pub mod writer;

pub use classfile::{decode_class, DecodeOptions, DecodedClass, DescriptorParser, SignatureIssue};
pub use record::{
    AccessFlags, AnnotationElement, AnnotationRecord, AnnotationValue, ClassRecord,
    ConstantValue, FieldRecord, InnerClassEntry, MethodRecord, Visibility,
};
pub use signature::{
    parse_class_signature, parse_field_signature, parse_method_signature, ClassSignature,
    ClassTypeSignature, MethodSignature, SignatureError, TypeSignature,
};
pub use writer::encode_class;
