//! Bridge description model.
//!
//! Signatures, the structural type model and the declarative bridge file
//! loader consumed by the code generator.

pub mod metadata;
pub mod symbol_registry;
pub mod types;

pub use metadata::{SourceFormat, load_bridge_spec, parse_bridge_spec, parse_type};
pub use symbol_registry::{
    BridgeSymbol, BridgeSymbolRegistry, ENTRY_PREFIX, RegistryError, SnakeCaseNaming,
    WrapperNaming, entry_symbol,
};
pub use types::{
    BasicKind, BridgeSpec, DEFAULT_RUNTIME, Field, Param, QualifiedName, Signature, TypeDecl,
    TypeRef, TypeTable, is_identifier,
};
