use serde::{Deserialize, Serialize};

use super::signature::{ClassSignature, MethodSignature, TypeSignature};

/// Raw access/property flags of a class, field, method or inner-class entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessFlags(pub u16);

impl AccessFlags {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SYNCHRONIZED: u16 = 0x0020;
    pub const VOLATILE: u16 = 0x0040;
    pub const TRANSIENT: u16 = 0x0080;
    pub const NATIVE: u16 = 0x0100;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
    pub const SYNTHETIC: u16 = 0x1000;
    pub const ANNOTATION: u16 = 0x2000;
    pub const ENUM: u16 = 0x4000;

    pub fn contains(self, flag: u16) -> bool {
        self.0 & flag == flag
    }

    pub fn visibility(self) -> Visibility {
        if self.contains(Self::PUBLIC) {
            Visibility::Public
        } else if self.contains(Self::PROTECTED) {
            Visibility::Protected
        } else if self.contains(Self::PRIVATE) {
            Visibility::Private
        } else {
            Visibility::PackagePrivate
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    Public,
    Protected,
    PackagePrivate,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
            Visibility::PackagePrivate => "package",
            Visibility::Private => "private",
        }
    }
}

/// One decoded class or interface descriptor. Names use the dotted binary
/// form (`a.b.Outer$Inner`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub name: String,
    pub access: AccessFlags,
    pub minor_version: u16,
    pub major_version: u16,
    /// `None` only for the root type.
    pub superclass: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldRecord>,
    pub methods: Vec<MethodRecord>,
    pub annotations: Vec<AnnotationRecord>,
    pub signature: Option<String>,
    pub parsed_signature: Option<ClassSignature>,
    pub outer_class: Option<String>,
    pub inner_classes: Vec<InnerClassEntry>,
    /// Every class named by the constant pool, in pool order.
    pub referenced_classes: Vec<String>,
}

impl ClassRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            access: AccessFlags(AccessFlags::PUBLIC | AccessFlags::SYNCHRONIZED),
            minor_version: 0,
            major_version: 52,
            superclass: Some("java.lang.Object".to_string()),
            interfaces: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            annotations: Vec::new(),
            signature: None,
            parsed_signature: None,
            outer_class: None,
            inner_classes: Vec::new(),
            referenced_classes: Vec::new(),
        }
    }

    pub fn package_name(&self) -> &str {
        package_of(&self.name)
    }

    pub fn simple_name(&self) -> &str {
        let tail = self.name.rsplit('.').next().unwrap_or(&self.name);
        tail.rsplit('$').next().unwrap_or(tail)
    }

    pub fn visibility(&self) -> Visibility {
        self.access.visibility()
    }

    pub fn is_interface(&self) -> bool {
        self.access.contains(AccessFlags::INTERFACE)
    }

    pub fn is_annotation(&self) -> bool {
        self.access.contains(AccessFlags::ANNOTATION)
    }

    pub fn is_enum(&self) -> bool {
        self.access.contains(AccessFlags::ENUM)
    }

    pub fn is_abstract(&self) -> bool {
        self.access.contains(AccessFlags::ABSTRACT)
    }

    pub fn has_annotation(&self, type_name: &str) -> bool {
        self.annotations.iter().any(|a| a.type_name == type_name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldRecord> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodRecord> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn with_superclass(mut self, superclass: Option<&str>) -> Self {
        self.superclass = superclass.map(str::to_string);
        self
    }

    pub fn with_access(mut self, access: u16) -> Self {
        self.access = AccessFlags(access);
        self
    }

    pub fn with_interface(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.to_string());
        self
    }

    pub fn with_field(mut self, field: FieldRecord) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_method(mut self, method: MethodRecord) -> Self {
        self.methods.push(method);
        self
    }

    pub fn with_annotation(mut self, annotation: AnnotationRecord) -> Self {
        self.annotations.push(annotation);
        self
    }
}

/// Package of a dotted binary name; empty for the default package.
pub fn package_of(class_name: &str) -> &str {
    class_name
        .rsplit_once('.')
        .map(|(package, _)| package)
        .unwrap_or("")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub annotations: Vec<AnnotationRecord>,
    pub signature: Option<String>,
    pub parsed_signature: Option<TypeSignature>,
    pub constant_value: Option<ConstantValue>,
}

impl FieldRecord {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access: u16) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access: AccessFlags(access),
            annotations: Vec::new(),
            signature: None,
            parsed_signature: None,
            constant_value: None,
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.access.visibility()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodRecord {
    pub name: String,
    pub descriptor: String,
    pub access: AccessFlags,
    pub annotations: Vec<AnnotationRecord>,
    pub parameter_annotations: Vec<Vec<AnnotationRecord>>,
    pub signature: Option<String>,
    pub parsed_signature: Option<MethodSignature>,
    /// Declared thrown types from the `Exceptions` attribute.
    pub exceptions: Vec<String>,
    pub annotation_default: Option<AnnotationValue>,
}

impl MethodRecord {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>, access: u16) -> Self {
        Self {
            name: name.into(),
            descriptor: descriptor.into(),
            access: AccessFlags(access),
            annotations: Vec::new(),
            parameter_annotations: Vec::new(),
            signature: None,
            parsed_signature: None,
            exceptions: Vec::new(),
            annotation_default: None,
        }
    }

    pub fn visibility(&self) -> Visibility {
        self.access.visibility()
    }

    pub fn is_constructor(&self) -> bool {
        self.name == "<init>"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub type_name: String,
    pub values: Vec<AnnotationElement>,
}

impl AnnotationRecord {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            values: Vec::new(),
        }
    }

    pub fn with_value(mut self, name: impl Into<String>, value: AnnotationValue) -> Self {
        self.values.push(AnnotationElement {
            name: name.into(),
            value,
        });
        self
    }

    pub fn value(&self, name: &str) -> Option<&AnnotationValue> {
        self.values.iter().find(|e| e.name == name).map(|e| &e.value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationElement {
    pub name: String,
    pub value: AnnotationValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AnnotationValue {
    Byte(i8),
    Char(char),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
    String(String),
    Enum { type_name: String, constant: String },
    /// Class literal, kept as its return descriptor (`Ljava/lang/String;`, `I`, `V`).
    Class(String),
    Annotation(Box<AnnotationRecord>),
    Array(Vec<AnnotationValue>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstantValue {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerClassEntry {
    pub inner: String,
    pub outer: Option<String>,
    pub simple_name: Option<String>,
    pub access: AccessFlags,
}

pub fn internal_to_binary(name: &str) -> String {
    name.replace('/', ".")
}

pub fn binary_to_internal(name: &str) -> String {
    name.replace('.', "/")
}
