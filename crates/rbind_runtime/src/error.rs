use thiserror::Error;

use crate::sexp::SexpType;

/// Failure raised while marshaling a bridged call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: SexpType,
    },
    #[error("expected length {expected}, found length {found}")]
    LengthMismatch { expected: usize, found: usize },
    #[error("missing element `{field}` for {record}")]
    MissingField { record: String, field: String },
    #[error("expected a named {0}")]
    MissingNames(&'static str),
    #[error("NA is not a valid {0}")]
    NaValue(&'static str),
    #[error("string contains a NUL byte: {0:?}")]
    InvalidString(String),
    #[error("string is not valid UTF-8: {0:?}")]
    InvalidUtf8(String),
    #[error("argument `{name}`: {source}")]
    Argument {
        name: String,
        #[source]
        source: Box<BridgeError>,
    },
    #[error("panic: {0}")]
    Panic(String),
}

impl BridgeError {
    /// Attributes a conversion failure to the named parameter.
    pub fn for_argument(self, name: &str) -> Self {
        Self::Argument {
            name: name.to_string(),
            source: Box::new(self),
        }
    }
}
