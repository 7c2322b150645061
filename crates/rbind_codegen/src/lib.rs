//! Type-directed generator for Rust/R bridges.
//!
//! [`generate`] takes a [`BridgeSpec`] through the whole pipeline: the type
//! closure is collected, every member gets a marshal plan keyed by its
//! mangled identity, and both emitters render from the same
//! [`GenerationContext`] so the two artifacts agree on entry points, arity
//! and representation.

pub mod collect;
pub mod context;
pub mod error;
pub mod foreign;
pub mod mangle;
pub mod naming;
pub mod native;
pub mod plan;
pub mod writer;

use rbind_ffi::{BridgeSpec, QualifiedName, SnakeCaseNaming, WrapperNaming};
use tracing::info;

pub use collect::{ClosureEntry, TypeClosure, collect};
pub use context::GenerationContext;
pub use error::{GenError, Location, LocationItem};
pub use foreign::emit_foreign;
pub use mangle::mangle;
pub use native::emit_native;
pub use plan::{MarshalPlan, PlanKind, PlanSet, Storage, plan_closure};

/// First line of every generated file, after the comment marker.
pub const GENERATED_BY: &str = "Code generated by rbind; DO NOT EDIT.";

/// The two generated sources and the fingerprint both carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifacts {
    pub native: String,
    pub foreign: String,
    pub fingerprint: String,
    /// Declared types that no function reaches; nothing is generated for them.
    pub unused_types: Vec<QualifiedName>,
}

/// Generate both artifacts, naming R wrappers in snake_case.
pub fn generate(spec: &BridgeSpec) -> Result<Artifacts, GenError> {
    generate_with(spec, &SnakeCaseNaming)
}

pub fn generate_with(spec: &BridgeSpec, naming: &dyn WrapperNaming) -> Result<Artifacts, GenError> {
    let ctx = GenerationContext::build(spec, naming)?;
    let (native, foreign) = rayon::join(|| emit_native(&ctx), || emit_foreign(&ctx));
    info!(
        package = %spec.package,
        functions = ctx.symbols.len(),
        types = ctx.plans.len(),
        "generated bridge"
    );
    let unused_types = ctx.unused_types();
    Ok(Artifacts {
        native,
        foreign,
        fingerprint: ctx.fingerprint,
        unused_types,
    })
}
