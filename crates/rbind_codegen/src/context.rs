use rbind_ffi::{
    BridgeSpec, BridgeSymbol, BridgeSymbolRegistry, QualifiedName, Signature, TypeRef, TypeTable,
    WrapperNaming,
};
use sha1::{Digest, Sha1};
use tracing::debug;

use crate::collect::{TypeClosure, collect};
use crate::error::GenError;
use crate::mangle::mangle;
use crate::naming::{ForeignShape, foreign_shape};
use crate::plan::{MarshalPlan, PlanSet, plan_closure};

/// Everything both emitters read, computed once per run.
pub struct GenerationContext<'a> {
    pub spec: &'a BridgeSpec,
    pub closure: TypeClosure,
    pub plans: PlanSet,
    pub symbols: BridgeSymbolRegistry,
    pub fingerprint: String,
}

impl<'a> GenerationContext<'a> {
    pub fn build(spec: &'a BridgeSpec, naming: &dyn WrapperNaming) -> Result<Self, GenError> {
        let symbols = BridgeSymbolRegistry::build(&spec.functions, naming)?;
        let closure = collect(spec)?;
        let plans = plan_closure(&closure, &spec.types)?;
        let fingerprint = fingerprint(spec, &symbols);
        debug!(
            package = %spec.package,
            functions = symbols.len(),
            plans = plans.len(),
            %fingerprint,
            "built generation context"
        );
        Ok(Self {
            spec,
            closure,
            plans,
            symbols,
            fingerprint,
        })
    }

    pub fn types(&self) -> &TypeTable {
        &self.spec.types
    }

    pub fn plan_for(&self, ty: &TypeRef) -> Option<&MarshalPlan> {
        self.plans.get(&mangle(ty))
    }

    pub fn shape(&self, ty: &TypeRef) -> ForeignShape {
        foreign_shape(ty, self.types())
    }

    /// Declared types no bridged function reaches, in declaration order.
    pub fn unused_types(&self) -> Vec<QualifiedName> {
        self.spec
            .types
            .iter()
            .filter(|decl| !self.closure.contains(&mangle(&TypeRef::Named(decl.name.clone()))))
            .map(|decl| decl.name.clone())
            .collect()
    }

    pub fn signatures(&self) -> impl Iterator<Item = (&'a Signature, &BridgeSymbol)> {
        self.spec.functions.iter().filter_map(|signature| {
            self.symbols
                .get(&signature.name)
                .map(|symbol| (signature, symbol))
        })
    }
}

/// SHA-1 over the entry symbol, arity and argument shapes of every function.
fn fingerprint(spec: &BridgeSpec, symbols: &BridgeSymbolRegistry) -> String {
    let mut hasher = Sha1::new();
    for symbol in symbols.iter() {
        let Some(signature) = spec.functions.iter().find(|s| s.name == symbol.function) else {
            continue;
        };
        hasher.update(symbol.entry_symbol.as_bytes());
        hasher.update(symbol.arity.to_le_bytes());
        for param in &signature.params {
            hasher.update(b"\0");
            hasher.update(foreign_shape(&param.ty, &spec.types).signature().as_bytes());
        }
        hasher.update(b"\n");
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbind_ffi::{BasicKind, Param, SnakeCaseNaming};

    fn spec_with(param: TypeRef) -> BridgeSpec {
        BridgeSpec::new("p", "p").with_function(Signature::new(
            "f",
            vec![Param::new(Some("x"), param)],
            Vec::new(),
        ))
    }

    #[test]
    fn fingerprint_tracks_argument_shapes() -> anyhow::Result<()> {
        let ints = spec_with(TypeRef::slice(TypeRef::basic(BasicKind::Int)));
        let same = spec_with(TypeRef::slice(TypeRef::basic(BasicKind::Int16)));
        let doubles = spec_with(TypeRef::slice(TypeRef::basic(BasicKind::Float64)));

        let a = GenerationContext::build(&ints, &SnakeCaseNaming)?;
        let b = GenerationContext::build(&same, &SnakeCaseNaming)?;
        let c = GenerationContext::build(&doubles, &SnakeCaseNaming)?;
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
        assert_eq!(a.fingerprint.len(), 40);
        Ok(())
    }

    #[test]
    fn unreached_declarations_are_reported() -> anyhow::Result<()> {
        let spec = spec_with(TypeRef::named("geom::Point"))
            .with_type("geom::Label", TypeRef::basic(BasicKind::String))
            .with_type("geom::Point", TypeRef::basic(BasicKind::Float64))
            .with_type("geom::Unused", TypeRef::basic(BasicKind::Int));
        let ctx = GenerationContext::build(&spec, &SnakeCaseNaming)?;
        assert_eq!(
            ctx.unused_types(),
            [QualifiedName::new("geom::Label"), QualifiedName::new("geom::Unused")]
        );
        Ok(())
    }

    #[test]
    fn registry_errors_surface_as_generation_errors() {
        let spec = spec_with(TypeRef::basic(BasicKind::Int)).with_function(Signature::new(
            "f",
            Vec::new(),
            Vec::new(),
        ));
        let err = GenerationContext::build(&spec, &SnakeCaseNaming).err();
        assert!(matches!(err, Some(GenError::Registry(_))));
    }
}
