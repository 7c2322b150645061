use std::fmt;

use rbind_ffi::RegistryError;
use thiserror::Error;

/// Which part of which signature a failure was found in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Location {
    pub function: String,
    pub item: LocationItem,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocationItem {
    Function,
    Param { idx: usize, name: Option<String> },
    Result { idx: usize, name: Option<String> },
}

impl Location {
    pub fn function(function: &str) -> Self {
        Self {
            function: function.to_string(),
            item: LocationItem::Function,
        }
    }

    pub fn param(function: &str, idx: usize, name: Option<&str>) -> Self {
        Self {
            function: function.to_string(),
            item: LocationItem::Param {
                idx,
                name: name.map(str::to_string),
            },
        }
    }

    pub fn result(function: &str, idx: usize, name: Option<&str>) -> Self {
        Self {
            function: function.to_string(),
            item: LocationItem::Result {
                idx,
                name: name.map(str::to_string),
            },
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function `{}`", self.function)?;
        match &self.item {
            LocationItem::Function => Ok(()),
            LocationItem::Param {
                name: Some(name), ..
            } => write!(f, " parameter `{name}`"),
            LocationItem::Param { idx, name: None } => write!(f, " parameter {idx}"),
            LocationItem::Result {
                name: Some(name), ..
            } => write!(f, " result `{name}`"),
            LocationItem::Result { idx, name: None } => write!(f, " result {idx}"),
        }
    }
}

/// Configuration errors that abort a generation run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("types `{first}` and `{second}` share the mangled identity `{id}`")]
    MangleCollision {
        id: String,
        first: String,
        second: String,
    },
    #[error("unsupported type `{ty}` in {location}: {reason}")]
    UnsupportedType {
        ty: String,
        reason: &'static str,
        location: Location,
    },
    #[error("unknown type `{name}` in {location}")]
    UnknownType { name: String, location: Location },
    #[error("type `{name}` contains itself without a pointer in {location}: {path}")]
    TypeCycle {
        name: String,
        path: String,
        location: Location,
    },
    #[error("map key type `{key}` in {location} is not string-like")]
    NonStringMapKey { key: String, location: Location },
    #[error("variadic {location} must take a slice as its last parameter")]
    BadVariadic { location: Location },
    #[error("`{name}` in {location} is not a valid identifier")]
    InvalidName { name: String, location: Location },
    #[error("type `{ty}` has no marshal plan")]
    Unplannable { ty: String },
    #[error("`{name}` is used more than once in {location}")]
    DuplicateName { name: String, location: Location },
    #[error("{location} becomes the R argument `{name}`, which an earlier parameter already uses")]
    ForeignNameClash { name: String, location: Location },
}

impl GenError {
    pub fn location(&self) -> Option<&Location> {
        match self {
            Self::UnsupportedType { location, .. }
            | Self::UnknownType { location, .. }
            | Self::TypeCycle { location, .. }
            | Self::NonStringMapKey { location, .. }
            | Self::BadVariadic { location }
            | Self::InvalidName { location, .. }
            | Self::DuplicateName { location, .. }
            | Self::ForeignNameClash { location, .. } => Some(location),
            Self::Registry(_) | Self::MangleCollision { .. } | Self::Unplannable { .. } => None,
        }
    }

    /// Function the error should be reported against, when there is one.
    pub fn function(&self) -> Option<&str> {
        match self {
            Self::Registry(RegistryError::DuplicateFunction(function)) => Some(function),
            Self::Registry(RegistryError::WrapperClash { second, .. }) => Some(second),
            other => other.location().map(|location| location.function.as_str()),
        }
    }
}
