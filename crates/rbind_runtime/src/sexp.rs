use std::error::Error;
use std::ffi::c_void;
use std::fmt;

/// Opaque handle to an R object.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Sexp(*mut c_void);

impl Sexp {
    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    pub const fn as_raw(self) -> *mut c_void {
        self.0
    }
}

/// R object kinds the bridge reads and writes; everything else is `Other`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SexpType {
    Nil,
    Logical,
    Integer,
    Real,
    Complex,
    Character,
    List,
    Raw,
    Other(u32),
}

impl SexpType {
    pub const fn code(self) -> u32 {
        match self {
            Self::Nil => 0,
            Self::Logical => 10,
            Self::Integer => 13,
            Self::Real => 14,
            Self::Complex => 15,
            Self::Character => 16,
            Self::List => 19,
            Self::Raw => 24,
            Self::Other(code) => code,
        }
    }

    pub const fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Nil,
            10 => Self::Logical,
            13 => Self::Integer,
            14 => Self::Real,
            15 => Self::Complex,
            16 => Self::Character,
            19 => Self::List,
            24 => Self::Raw,
            other => Self::Other(other),
        }
    }

    /// Name used by R's `typeof()`.
    pub const fn r_name(self) -> &'static str {
        match self {
            Self::Nil => "NULL",
            Self::Logical => "logical",
            Self::Integer => "integer",
            Self::Real => "double",
            Self::Complex => "complex",
            Self::Character => "character",
            Self::List => "list",
            Self::Raw => "raw",
            Self::Other(_) => "unsupported object",
        }
    }
}

impl fmt::Display for SexpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.r_name())
    }
}

/// `NA_integer_` and `NA` (logical) share the same bit pattern.
pub const NA_INTEGER: i32 = i32::MIN;
pub const NA_LOGICAL: i32 = i32::MIN;

/// Layout-compatible with R's `Rcomplex`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex128 {
    pub re: f64,
    pub im: f64,
}

impl Complex128 {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Complex64 {
    pub re: f32,
    pub im: f32,
}

impl Complex64 {
    pub const fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

impl From<Complex64> for Complex128 {
    fn from(value: Complex64) -> Self {
        Self::new(f64::from(value.re), f64::from(value.im))
    }
}

impl From<Complex128> for Complex64 {
    fn from(value: Complex128) -> Self {
        Self::new(value.re as f32, value.im as f32)
    }
}

/// Native error value: `None` is success.
pub type NativeError = Option<Box<dyn Error + Send + Sync>>;

/// Error reconstructed from the message an R caller passed in.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct ForeignError(pub String);
