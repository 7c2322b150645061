//! Names and foreign-side shapes shared by both emitters.

use std::fmt;

use rbind_ffi::{BasicKind, Param, TypeRef, TypeTable};

use crate::plan::{Storage, element_storage};

const R_RESERVED: &[&str] = &[
    "if",
    "else",
    "repeat",
    "while",
    "function",
    "for",
    "in",
    "next",
    "break",
    "TRUE",
    "FALSE",
    "NULL",
    "Inf",
    "NaN",
    "NA",
    "NA_integer_",
    "NA_real_",
    "NA_complex_",
    "NA_character_",
    "T",
    "F",
];

/// Name of the native argument carrying parameter `idx`.
pub fn native_arg(idx: usize, param: &Param) -> String {
    match &param.name {
        Some(name) => format!("arg_{name}"),
        None => format!("arg_{idx}"),
    }
}

/// R-side parameter name: the declared name, or `p<idx>` when unnamed.
pub fn r_param(idx: usize, param: &Param) -> String {
    match param.name.as_deref() {
        Some(name) if name.starts_with('_') => format!("p{name}"),
        Some(name) if R_RESERVED.contains(&name) => format!("{name}_"),
        Some(name) => name.to_string(),
        None => format!("p{idx}"),
    }
}

/// Element name of result `idx` in a multi-result list.
pub fn result_key(idx: usize, result: &Param) -> String {
    result
        .name
        .clone()
        .unwrap_or_else(|| format!("r{idx}"))
}

/// R vector class as tested by `is.<class>()`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ForeignClass {
    Logical,
    Integer,
    Double,
    Complex,
    Character,
    Raw,
    List,
}

impl ForeignClass {
    pub fn r_name(self) -> &'static str {
        match self {
            Self::Logical => "logical",
            Self::Integer => "integer",
            Self::Double => "double",
            Self::Complex => "complex",
            Self::Character => "character",
            Self::Raw => "raw",
            Self::List => "list",
        }
    }

    /// Zero-length value of this class.
    pub fn empty(self) -> &'static str {
        match self {
            Self::Logical => "logical(0)",
            Self::Integer => "integer(0)",
            Self::Double => "double(0)",
            Self::Complex => "complex(0)",
            Self::Character => "character(0)",
            Self::Raw => "raw(0)",
            Self::List => "list()",
        }
    }

    fn from_storage(storage: Storage) -> Self {
        match storage {
            Storage::Logical => Self::Logical,
            Storage::Integer => Self::Integer,
            Storage::Real => Self::Double,
            Storage::Complex => Self::Complex,
            Storage::Character => Self::Character,
            Storage::List => Self::List,
        }
    }
}

impl fmt::Display for ForeignClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.r_name())
    }
}

/// What an R value must look like to be accepted for a given type.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ForeignShape {
    pub class: ForeignClass,
    /// Exact length required, if any.
    pub len: Option<usize>,
    pub nullable: bool,
    /// Non-empty values must carry `names`.
    pub named: bool,
    /// Declared record the list stands for.
    pub record: Option<String>,
    /// Foreign names of the record's fields.
    pub fields: Vec<String>,
}

impl ForeignShape {
    fn of_class(class: ForeignClass, len: Option<usize>) -> Self {
        Self {
            class,
            len,
            nullable: false,
            named: false,
            record: None,
            fields: Vec::new(),
        }
    }

    /// Compact form hashed into the artifact fingerprint.
    pub fn signature(&self) -> String {
        let len = self.len.map_or_else(|| "*".to_string(), |len| len.to_string());
        let fields = if self.fields.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", self.fields.join(","))
        };
        format!(
            "{}[{len}]{}{}{fields}",
            self.class,
            if self.nullable { "?" } else { "" },
            if self.named { "@names" } else { "" }
        )
    }

    /// Human-readable description used in R documentation, without an article.
    pub fn describe(&self) -> String {
        if let Some(record) = &self.record {
            return format!("list corresponding to {record}");
        }
        let class = self.class.r_name();
        if self.named {
            return match self.class {
                ForeignClass::List => "named list".to_string(),
                _ => format!("named {class} vector"),
            };
        }
        match (self.class, self.len) {
            (ForeignClass::List, _) => "list".to_string(),
            (_, None) => format!("{class} vector"),
            (_, Some(1)) => format!("{class} value"),
            (_, Some(len)) => format!("{class} vector with {len} elements"),
        }
    }
}

pub fn foreign_shape(ty: &TypeRef, types: &TypeTable) -> ForeignShape {
    shape_within(ty, types, 0)
}

fn shape_within(ty: &TypeRef, types: &TypeTable, depth: usize) -> ForeignShape {
    match ty {
        TypeRef::Basic(BasicKind::Uint8) => ForeignShape::of_class(ForeignClass::Integer, Some(1)),
        TypeRef::Basic(kind) => ForeignShape::of_class(
            ForeignClass::from_storage(crate::plan::basic_storage(*kind)),
            Some(1),
        ),
        TypeRef::Error => ForeignShape {
            nullable: true,
            ..ForeignShape::of_class(ForeignClass::Character, Some(1))
        },
        TypeRef::Pointer(elem) => {
            // Pointer chains through aliases can loop; stop at an unconstrained list.
            if depth > types.len() {
                return ForeignShape {
                    nullable: true,
                    ..ForeignShape::of_class(ForeignClass::List, None)
                };
            }
            ForeignShape {
                nullable: true,
                ..shape_within(elem, types, depth + 1)
            }
        }
        TypeRef::Slice(elem) => ForeignShape::of_class(vector_class(elem, types), None),
        TypeRef::Array { elem, len } => {
            ForeignShape::of_class(vector_class(elem, types), Some(*len))
        }
        TypeRef::Map { elem, .. } => ForeignShape {
            named: true,
            ..ForeignShape::of_class(
                ForeignClass::from_storage(element_storage(elem, types)),
                None,
            )
        },
        TypeRef::Struct(_) => ForeignShape::of_class(ForeignClass::List, None),
        TypeRef::Named(name) => match types.underlying(name) {
            Some(TypeRef::Struct(fields)) => ForeignShape {
                record: Some(name.to_string()),
                fields: fields
                    .iter()
                    .map(|field| field.foreign_name().to_string())
                    .collect(),
                ..ForeignShape::of_class(ForeignClass::List, None)
            },
            Some(underlying) if depth <= types.len() => shape_within(underlying, types, depth + 1),
            _ => ForeignShape::of_class(ForeignClass::List, None),
        },
    }
}

/// Class of an R vector holding `elem`; byte slices travel as raw vectors.
fn vector_class(elem: &TypeRef, types: &TypeTable) -> ForeignClass {
    if elem.as_basic() == Some(BasicKind::Uint8) {
        ForeignClass::Raw
    } else {
        ForeignClass::from_storage(element_storage(elem, types))
    }
}

/// Prefix `noun` with "a" or "an".
pub fn article(noun: &str, capital: bool) -> String {
    let vowel = noun
        .chars()
        .next()
        .is_some_and(|ch| matches!(ch.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u'));
    let article = match (vowel, capital) {
        (true, true) => "An",
        (true, false) => "an",
        (false, true) => "A",
        (false, false) => "a",
    };
    format!("{article} {noun}")
}
