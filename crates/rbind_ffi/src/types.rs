use std::fmt;

use ahash::AHashMap;

pub const DEFAULT_RUNTIME: &str = "rbind_runtime";

/// Scalar kinds understood by the bridge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Complex64,
    Complex128,
    String,
}

impl BasicKind {
    pub const ALL: [Self; 16] = [
        Self::Bool,
        Self::Int,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::Uint,
        Self::Uint8,
        Self::Uint16,
        Self::Uint32,
        Self::Uint64,
        Self::Float32,
        Self::Float64,
        Self::Complex64,
        Self::Complex128,
        Self::String,
    ];

    /// Stable literal used both in bridge files and in mangled identities.
    pub fn ident(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint => "uint",
            Self::Uint8 => "uint8",
            Self::Uint16 => "uint16",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::String => "string",
        }
    }

    pub fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "byte" => Some(Self::Uint8),
            "rune" => Some(Self::Int32),
            other => Self::ALL.into_iter().find(|kind| kind.ident() == other),
        }
    }

    /// Rust spelling of the kind. Complex kinds name the runtime's `#[repr(C)]` structs.
    pub fn rust_type(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int => "isize",
            Self::Int8 => "i8",
            Self::Int16 => "i16",
            Self::Int32 => "i32",
            Self::Int64 => "i64",
            Self::Uint => "usize",
            Self::Uint8 => "u8",
            Self::Uint16 => "u16",
            Self::Uint32 => "u32",
            Self::Uint64 => "u64",
            Self::Float32 => "f32",
            Self::Float64 => "f64",
            Self::Complex64 => "Complex64",
            Self::Complex128 => "Complex128",
            Self::String => "String",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Self::Int
                | Self::Int8
                | Self::Int16
                | Self::Int32
                | Self::Int64
                | Self::Uint
                | Self::Uint8
                | Self::Uint16
                | Self::Uint32
                | Self::Uint64
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    pub fn is_complex(self) -> bool {
        matches!(self, Self::Complex64 | Self::Complex128)
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ident())
    }
}

/// `::`-separated path of a declared type, e.g. `geom::Point`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName(String);

impl QualifiedName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split("::")
    }

    /// Whether every segment is a Rust identifier, i.e. the name can be spelled in generated code.
    pub fn is_rust_path(&self) -> bool {
        !self.0.is_empty() && self.segments().all(is_identifier)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QualifiedName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Structural description of a bridged type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeRef {
    Basic(BasicKind),
    /// Declared type; its underlying shape lives in the bridge's [`TypeTable`].
    Named(QualifiedName),
    Pointer(Box<TypeRef>),
    Array { elem: Box<TypeRef>, len: usize },
    Slice(Box<TypeRef>),
    Map { key: Box<TypeRef>, elem: Box<TypeRef> },
    Struct(Vec<Field>),
    Error,
}

impl TypeRef {
    pub fn basic(kind: BasicKind) -> Self {
        Self::Basic(kind)
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(QualifiedName::new(name))
    }

    pub fn pointer(elem: TypeRef) -> Self {
        Self::Pointer(Box::new(elem))
    }

    pub fn slice(elem: TypeRef) -> Self {
        Self::Slice(Box::new(elem))
    }

    pub fn array(elem: TypeRef, len: usize) -> Self {
        Self::Array {
            elem: Box::new(elem),
            len,
        }
    }

    pub fn map(key: TypeRef, elem: TypeRef) -> Self {
        Self::Map {
            key: Box::new(key),
            elem: Box::new(elem),
        }
    }

    pub fn as_basic(&self) -> Option<BasicKind> {
        match self {
            Self::Basic(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_slice(&self) -> bool {
        matches!(self, Self::Slice(_))
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(kind) => write!(f, "{kind}"),
            Self::Named(name) => write!(f, "{name}"),
            Self::Pointer(elem) => write!(f, "*{elem}"),
            Self::Array { elem, len } => write!(f, "[{len}]{elem}"),
            Self::Slice(elem) => write!(f, "[]{elem}"),
            Self::Map { key, elem } => write!(f, "map[{key}]{elem}"),
            Self::Struct(fields) => {
                write!(f, "struct{{")?;
                for (idx, field) in fields.iter().enumerate() {
                    if idx > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{} {}", field.name, field.ty)?;
                    if let Some(rename) = &field.rename {
                        write!(f, " as {rename}")?;
                    }
                }
                write!(f, "}}")
            }
            Self::Error => write!(f, "error"),
        }
    }
}

/// Record field with an optional foreign-side name override.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: TypeRef,
    pub rename: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: TypeRef) -> Self {
        Self {
            name: name.into(),
            ty,
            rename: None,
        }
    }

    pub fn renamed(mut self, rename: impl Into<String>) -> Self {
        self.rename = Some(rename.into());
        self
    }

    /// Name the field is addressed by on the R side.
    pub fn foreign_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: TypeRef,
}

impl Param {
    pub fn new(name: Option<&str>, ty: TypeRef) -> Self {
        Self {
            name: name.map(str::to_string),
            ty,
        }
    }
}

/// Immutable description of one bridged function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub params: Vec<Param>,
    pub results: Vec<Param>,
    pub variadic: bool,
    pub doc: Option<String>,
}

impl Signature {
    pub fn new(name: impl Into<String>, params: Vec<Param>, results: Vec<Param>) -> Self {
        Self {
            name: name.into(),
            params,
            results,
            variadic: false,
            doc: None,
        }
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: QualifiedName,
    pub underlying: TypeRef,
}

/// Declared named types, in declaration order.
#[derive(Clone, Debug, Default)]
pub struct TypeTable {
    decls: Vec<TypeDecl>,
    index: AHashMap<QualifiedName, usize>,
}

impl TypeTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `name`. Returns the previous underlying type when the name was already declared.
    pub fn declare(&mut self, name: QualifiedName, underlying: TypeRef) -> Option<TypeRef> {
        if let Some(&idx) = self.index.get(&name) {
            let previous = std::mem::replace(&mut self.decls[idx].underlying, underlying);
            return Some(previous);
        }
        self.index.insert(name.clone(), self.decls.len());
        self.decls.push(TypeDecl { name, underlying });
        None
    }

    pub fn underlying(&self, name: &QualifiedName) -> Option<&TypeRef> {
        self.index.get(name).map(|&idx| &self.decls[idx].underlying)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDecl> {
        self.decls.iter()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }
}

/// Everything one generation run consumes.
#[derive(Clone, Debug)]
pub struct BridgeSpec {
    /// R package the native library is loaded into.
    pub package: String,
    /// Rust path holding the bridged functions.
    pub crate_path: String,
    /// Rust path of the runtime support crate as seen from generated code.
    pub runtime_path: String,
    pub types: TypeTable,
    pub functions: Vec<Signature>,
}

impl BridgeSpec {
    pub fn new(package: impl Into<String>, crate_path: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            crate_path: crate_path.into(),
            runtime_path: DEFAULT_RUNTIME.to_string(),
            types: TypeTable::new(),
            functions: Vec::new(),
        }
    }

    pub fn with_type(mut self, name: &str, underlying: TypeRef) -> Self {
        self.types.declare(QualifiedName::new(name), underlying);
        self
    }

    pub fn with_function(mut self, signature: Signature) -> Self {
        self.functions.push(signature);
        self
    }
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|ch| ch == '_' || ch.is_ascii_alphanumeric())
}
