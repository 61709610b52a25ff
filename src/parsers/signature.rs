//! Recursive-descent parser for generic signatures and plain type descriptors.
//!
//! The grammar is LL(1) at the character level: every decision is taken on the
//! current byte, so the cursor only moves forward. Plain field and method
//! descriptors are a subset of the signature grammar and go through the same
//! entry points.
//!
//! Class type signatures keep the boundary kind of every name segment. A
//! segment that follows the package path is introduced by `/`, while a segment
//! introduced by `.` names an inner class of the previous segment. The binary
//! name always joins inner segments with `$`, so
//! `La/b/Outer<TT;>.InnerA.InnerB;` resolves to `a.b.Outer$InnerA$InnerB`.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Deepest type-argument nesting accepted before parsing gives up.
pub const MAX_TYPE_NESTING: usize = 256;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("unexpected end of signature at offset {offset}")]
    UnexpectedEnd { offset: usize },
    #[error("unexpected character '{found}' at offset {offset}, expected {expected}")]
    UnexpectedChar {
        found: char,
        offset: usize,
        expected: &'static str,
    },
    #[error("trailing input at offset {offset}")]
    TrailingInput { offset: usize },
    #[error("empty identifier at offset {offset}")]
    EmptyIdentifier { offset: usize },
    #[error("type arguments nested deeper than {limit} at offset {offset}")]
    TooDeep { offset: usize, limit: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BaseType {
    Byte,
    Char,
    Double,
    Float,
    Int,
    Long,
    Short,
    Boolean,
}

impl BaseType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'B' => Some(BaseType::Byte),
            b'C' => Some(BaseType::Char),
            b'D' => Some(BaseType::Double),
            b'F' => Some(BaseType::Float),
            b'I' => Some(BaseType::Int),
            b'J' => Some(BaseType::Long),
            b'S' => Some(BaseType::Short),
            b'Z' => Some(BaseType::Boolean),
            _ => None,
        }
    }

    pub fn code(self) -> char {
        match self {
            BaseType::Byte => 'B',
            BaseType::Char => 'C',
            BaseType::Double => 'D',
            BaseType::Float => 'F',
            BaseType::Int => 'I',
            BaseType::Long => 'J',
            BaseType::Short => 'S',
            BaseType::Boolean => 'Z',
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BaseType::Byte => "byte",
            BaseType::Char => "char",
            BaseType::Double => "double",
            BaseType::Float => "float",
            BaseType::Int => "int",
            BaseType::Long => "long",
            BaseType::Short => "short",
            BaseType::Boolean => "boolean",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeSignature {
    Base(BaseType),
    Class(ClassTypeSignature),
    TypeVariable(String),
    Array(ArrayTypeSignature),
    /// Only valid as a type argument.
    Wildcard(WildcardSignature),
}

/// How a class-name segment was introduced in the encoded text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentSeparator {
    /// First segment, qualified by the package path.
    Package,
    /// Inner class of the preceding segment.
    Inner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassSegment {
    pub name: String,
    pub separator: SegmentSeparator,
    pub type_arguments: Vec<TypeSignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassTypeSignature {
    /// Dotted package name, empty for the default package.
    pub package: String,
    /// Outer-to-inner name segments; never empty.
    pub segments: Vec<ClassSegment>,
}

impl ClassTypeSignature {
    /// Binary name of the innermost segment, inner levels joined with `$`.
    pub fn binary_name(&self) -> String {
        let mut name = String::with_capacity(self.package.len() + 16);
        if !self.package.is_empty() {
            name.push_str(&self.package);
            name.push('.');
        }
        for segment in &self.segments {
            if segment.separator == SegmentSeparator::Inner {
                name.push('$');
            }
            name.push_str(&segment.name);
        }
        name
    }

    pub fn type_arguments(&self) -> impl Iterator<Item = &TypeSignature> {
        self.segments.iter().flat_map(|s| s.type_arguments.iter())
    }

    pub fn referenced_classes(&self, out: &mut Vec<String>) {
        out.push(self.binary_name());
        for argument in self.type_arguments() {
            argument.referenced_classes(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArrayTypeSignature {
    pub dimensions: usize,
    pub element: Box<TypeSignature>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WildcardBound {
    Unbounded,
    Extends,
    Super,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WildcardSignature {
    pub bound: WildcardBound,
    pub signature: Option<Box<TypeSignature>>,
}

impl TypeSignature {
    /// Binary names of every class mentioned, including type arguments.
    pub fn referenced_classes(&self, out: &mut Vec<String>) {
        match self {
            TypeSignature::Base(_) | TypeSignature::TypeVariable(_) => {}
            TypeSignature::Class(class) => class.referenced_classes(out),
            TypeSignature::Array(array) => array.element.referenced_classes(out),
            TypeSignature::Wildcard(wildcard) => {
                if let Some(signature) = &wildcard.signature {
                    signature.referenced_classes(out);
                }
            }
        }
    }

    /// Erased class name of this type, looking through arrays.
    pub fn erased_class_name(&self) -> Option<String> {
        match self {
            TypeSignature::Class(class) => Some(class.binary_name()),
            TypeSignature::Array(array) => array.element.erased_class_name(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeParameter {
    pub name: String,
    pub class_bound: Option<TypeSignature>,
    pub interface_bounds: Vec<TypeSignature>,
}

fn type_parameter_references(parameters: &[TypeParameter], out: &mut Vec<String>) {
    for parameter in parameters {
        if let Some(bound) = &parameter.class_bound {
            bound.referenced_classes(out);
        }
        for bound in &parameter.interface_bounds {
            bound.referenced_classes(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClassSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub superclass: ClassTypeSignature,
    pub interfaces: Vec<ClassTypeSignature>,
}

impl ClassSignature {
    pub fn referenced_classes(&self, out: &mut Vec<String>) {
        type_parameter_references(&self.type_parameters, out);
        self.superclass.referenced_classes(out);
        for interface in &self.interfaces {
            interface.referenced_classes(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodSignature {
    pub type_parameters: Vec<TypeParameter>,
    pub parameters: Vec<TypeSignature>,
    /// `None` for `void`.
    pub result: Option<TypeSignature>,
    pub throws: Vec<TypeSignature>,
}

impl MethodSignature {
    pub fn type_parameter_references(&self, out: &mut Vec<String>) {
        type_parameter_references(&self.type_parameters, out);
    }
}

pub fn parse_class_signature(text: &str) -> Result<ClassSignature, SignatureError> {
    let mut parser = SignatureParser::new(text);
    let type_parameters = parser.optional_type_parameters()?;
    let superclass = parser.class_type()?;
    let mut interfaces = Vec::new();
    while !parser.at_end() {
        interfaces.push(parser.class_type()?);
    }
    Ok(ClassSignature {
        type_parameters,
        superclass,
        interfaces,
    })
}

pub fn parse_method_signature(text: &str) -> Result<MethodSignature, SignatureError> {
    let mut parser = SignatureParser::new(text);
    let type_parameters = parser.optional_type_parameters()?;
    parser.expect(b'(', "'('")?;
    let mut parameters = Vec::new();
    while parser.peek()? != b')' {
        parameters.push(parser.java_type()?);
    }
    parser.advance();

    let result = if parser.peek()? == b'V' {
        parser.advance();
        None
    } else {
        Some(parser.java_type()?)
    };

    let mut throws = Vec::new();
    while !parser.at_end() {
        parser.expect(b'^', "'^'")?;
        let thrown = match parser.peek()? {
            b'L' => TypeSignature::Class(parser.class_type()?),
            b'T' => parser.type_variable()?,
            _ => return Err(parser.unexpected("class or type variable")),
        };
        throws.push(thrown);
    }

    Ok(MethodSignature {
        type_parameters,
        parameters,
        result,
        throws,
    })
}

/// Parse a field signature or a plain field descriptor.
pub fn parse_field_signature(text: &str) -> Result<TypeSignature, SignatureError> {
    let mut parser = SignatureParser::new(text);
    let signature = parser.java_type()?;
    parser.finish()?;
    Ok(signature)
}

struct SignatureParser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
}

impl<'a> SignatureParser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
            depth: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn peek(&self) -> Result<u8, SignatureError> {
        self.bytes
            .get(self.pos)
            .copied()
            .ok_or(SignatureError::UnexpectedEnd { offset: self.pos })
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn unexpected(&self, expected: &'static str) -> SignatureError {
        match self.text[self.pos..].chars().next() {
            Some(found) => SignatureError::UnexpectedChar {
                found,
                offset: self.pos,
                expected,
            },
            None => SignatureError::UnexpectedEnd { offset: self.pos },
        }
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), SignatureError> {
        if self.peek()? != byte {
            return Err(self.unexpected(expected));
        }
        self.advance();
        Ok(())
    }

    fn finish(&self) -> Result<(), SignatureError> {
        if self.at_end() {
            Ok(())
        } else {
            Err(SignatureError::TrailingInput { offset: self.pos })
        }
    }

    fn identifier(&mut self) -> Result<&'a str, SignatureError> {
        let start = self.pos;
        while let Some(&byte) = self.bytes.get(self.pos) {
            if matches!(byte, b'.' | b';' | b'[' | b'/' | b'<' | b'>' | b':') {
                break;
            }
            self.pos += 1;
        }
        if self.pos == start {
            return if self.at_end() {
                Err(SignatureError::UnexpectedEnd { offset: self.pos })
            } else {
                Err(SignatureError::EmptyIdentifier { offset: self.pos })
            };
        }
        Ok(&self.text[start..self.pos])
    }

    fn optional_type_parameters(&mut self) -> Result<Vec<TypeParameter>, SignatureError> {
        if self.bytes.get(self.pos) != Some(&b'<') {
            return Ok(Vec::new());
        }
        self.advance();
        let mut parameters = Vec::new();
        loop {
            let name = self.identifier()?.to_string();
            self.expect(b':', "':'")?;
            let class_bound = if matches!(self.peek()?, b'L' | b'T' | b'[') {
                Some(self.reference_type()?)
            } else {
                None
            };
            let mut interface_bounds = Vec::new();
            while self.peek()? == b':' {
                self.advance();
                interface_bounds.push(self.reference_type()?);
            }
            parameters.push(TypeParameter {
                name,
                class_bound,
                interface_bounds,
            });
            if self.peek()? == b'>' {
                self.advance();
                return Ok(parameters);
            }
        }
    }

    fn java_type(&mut self) -> Result<TypeSignature, SignatureError> {
        let byte = self.peek()?;
        match BaseType::from_code(byte) {
            Some(base) => {
                self.advance();
                Ok(TypeSignature::Base(base))
            }
            None => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Result<TypeSignature, SignatureError> {
        match self.peek()? {
            b'L' => Ok(TypeSignature::Class(self.class_type()?)),
            b'T' => self.type_variable(),
            b'[' => self.array_type(),
            _ => Err(self.unexpected("reference type")),
        }
    }

    fn type_variable(&mut self) -> Result<TypeSignature, SignatureError> {
        self.expect(b'T', "'T'")?;
        let name = self.identifier()?.to_string();
        self.expect(b';', "';'")?;
        Ok(TypeSignature::TypeVariable(name))
    }

    fn array_type(&mut self) -> Result<TypeSignature, SignatureError> {
        let mut dimensions = 0;
        while self.peek()? == b'[' {
            dimensions += 1;
            self.advance();
        }
        let element = self.java_type()?;
        Ok(TypeSignature::Array(ArrayTypeSignature {
            dimensions,
            element: Box::new(element),
        }))
    }

    fn class_type(&mut self) -> Result<ClassTypeSignature, SignatureError> {
        self.expect(b'L', "'L'")?;
        let mut package: Vec<&str> = Vec::new();
        let mut segments = Vec::new();
        let mut separator = SegmentSeparator::Package;

        loop {
            let name = self.identifier()?;
            let byte = self.peek()?;
            if byte == b'/' {
                if !segments.is_empty() {
                    return Err(self.unexpected("'.' or ';' after inner class"));
                }
                package.push(name);
                self.advance();
                continue;
            }

            let type_arguments = if byte == b'<' {
                self.type_arguments()?
            } else {
                Vec::new()
            };
            segments.push(ClassSegment {
                name: name.to_string(),
                separator,
                type_arguments,
            });

            match self.peek()? {
                b'.' => {
                    self.advance();
                    separator = SegmentSeparator::Inner;
                }
                b';' => {
                    self.advance();
                    break;
                }
                _ => return Err(self.unexpected("'.' or ';'")),
            }
        }

        Ok(ClassTypeSignature {
            package: package.join("."),
            segments,
        })
    }

    fn type_arguments(&mut self) -> Result<Vec<TypeSignature>, SignatureError> {
        self.expect(b'<', "'<'")?;
        if self.depth >= MAX_TYPE_NESTING {
            return Err(SignatureError::TooDeep {
                offset: self.pos,
                limit: MAX_TYPE_NESTING,
            });
        }
        self.depth += 1;
        let arguments = self.type_argument_list();
        self.depth -= 1;
        arguments
    }

    fn type_argument_list(&mut self) -> Result<Vec<TypeSignature>, SignatureError> {
        let mut arguments = Vec::new();
        loop {
            let argument = match self.peek()? {
                b'>' if !arguments.is_empty() => {
                    self.advance();
                    return Ok(arguments);
                }
                b'*' => {
                    self.advance();
                    TypeSignature::Wildcard(WildcardSignature {
                        bound: WildcardBound::Unbounded,
                        signature: None,
                    })
                }
                b'+' | b'-' => {
                    let bound = if self.peek()? == b'+' {
                        WildcardBound::Extends
                    } else {
                        WildcardBound::Super
                    };
                    self.advance();
                    TypeSignature::Wildcard(WildcardSignature {
                        bound,
                        signature: Some(Box::new(self.reference_type()?)),
                    })
                }
                _ => self.reference_type()?,
            };
            arguments.push(argument);
        }
    }
}

impl fmt::Display for TypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSignature::Base(base) => f.write_str(base.name()),
            TypeSignature::Class(class) => write!(f, "{}", class),
            TypeSignature::TypeVariable(name) => f.write_str(name),
            TypeSignature::Array(array) => {
                write!(f, "{}", array.element)?;
                for _ in 0..array.dimensions {
                    f.write_str("[]")?;
                }
                Ok(())
            }
            TypeSignature::Wildcard(wildcard) => match (&wildcard.bound, &wildcard.signature) {
                (WildcardBound::Extends, Some(bound)) => write!(f, "? extends {}", bound),
                (WildcardBound::Super, Some(bound)) => write!(f, "? super {}", bound),
                _ => f.write_str("?"),
            },
        }
    }
}

impl fmt::Display for ClassTypeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.package.is_empty() {
            write!(f, "{}.", self.package)?;
        }
        for segment in &self.segments {
            if segment.separator == SegmentSeparator::Inner {
                f.write_str("$")?;
            }
            f.write_str(&segment.name)?;
            if !segment.type_arguments.is_empty() {
                f.write_str("<")?;
                for (i, argument) in segment.type_arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", argument)?;
                }
                f.write_str(">")?;
            }
        }
        Ok(())
    }
}
