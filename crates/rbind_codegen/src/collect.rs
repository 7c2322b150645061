use ahash::{AHashMap, AHashSet};
use rbind_ffi::{BridgeSpec, QualifiedName, Signature, TypeRef, TypeTable, is_identifier};
use tracing::trace;

use crate::error::{GenError, Location};
use crate::mangle::mangle;
use crate::naming::r_param;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClosureEntry {
    pub id: String,
    pub ty: TypeRef,
}

/// Every type reachable from the bridged signatures, dependencies first.
#[derive(Clone, Debug, Default)]
pub struct TypeClosure {
    entries: Vec<ClosureEntry>,
    index: AHashMap<String, usize>,
}

impl TypeClosure {
    pub fn get(&self, id: &str) -> Option<&ClosureEntry> {
        self.index.get(id).map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClosureEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn insert(&mut self, id: String, ty: TypeRef) {
        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(ClosureEntry { id, ty });
    }
}

/// Walk every parameter and result of `spec` and gather the type closure.
///
/// Signatures are also validated here: names must be identifiers, variadic
/// functions must end in a slice, and every named type must be declared.
pub fn collect(spec: &BridgeSpec) -> Result<TypeClosure, GenError> {
    let mut collector = Collector {
        types: &spec.types,
        closure: TypeClosure::default(),
        in_progress: Vec::new(),
        pointer_depth: 0,
    };
    for signature in &spec.functions {
        validate_signature(signature)?;
        for (idx, param) in signature.params.iter().enumerate() {
            let location = Location::param(&signature.name, idx, param.name.as_deref());
            collector.visit(&param.ty, &location)?;
        }
        for (idx, result) in signature.results.iter().enumerate() {
            let location = Location::result(&signature.name, idx, result.name.as_deref());
            collector.visit(&result.ty, &location)?;
        }
    }
    trace!(types = collector.closure.len(), "collected type closure");
    Ok(collector.closure)
}

fn validate_signature(signature: &Signature) -> Result<(), GenError> {
    if !is_identifier(&signature.name) {
        return Err(GenError::InvalidName {
            name: signature.name.clone(),
            location: Location::function(&signature.name),
        });
    }

    let named = |items: &[rbind_ffi::Param], result: bool| -> Result<(), GenError> {
        let mut seen = AHashSet::new();
        for (idx, item) in items.iter().enumerate() {
            let Some(name) = item.name.as_deref() else {
                continue;
            };
            let location = if result {
                Location::result(&signature.name, idx, Some(name))
            } else {
                Location::param(&signature.name, idx, Some(name))
            };
            if !is_identifier(name) {
                return Err(GenError::InvalidName {
                    name: name.to_string(),
                    location,
                });
            }
            if !seen.insert(name) {
                return Err(GenError::DuplicateName {
                    name: name.to_string(),
                    location,
                });
            }
        }
        Ok(())
    };
    named(&signature.params, false)?;
    named(&signature.results, true)?;

    let mut formals = AHashSet::new();
    for (idx, param) in signature.params.iter().enumerate() {
        let formal = r_param(idx, param);
        if !formals.insert(formal.clone()) {
            return Err(GenError::ForeignNameClash {
                name: formal,
                location: Location::param(&signature.name, idx, param.name.as_deref()),
            });
        }
    }

    if signature.variadic && !signature.params.last().is_some_and(|p| p.ty.is_slice()) {
        return Err(GenError::BadVariadic {
            location: Location::function(&signature.name),
        });
    }
    Ok(())
}

struct Collector<'a> {
    types: &'a TypeTable,
    closure: TypeClosure,
    /// Named types being expanded, with the pointer depth at which each was entered.
    in_progress: Vec<(QualifiedName, usize)>,
    pointer_depth: usize,
}

impl Collector<'_> {
    fn visit(&mut self, ty: &TypeRef, location: &Location) -> Result<(), GenError> {
        let id = mangle(ty);
        if let Some(existing) = self.closure.get(&id) {
            if existing.ty != *ty {
                return Err(GenError::MangleCollision {
                    id,
                    first: existing.ty.to_string(),
                    second: ty.to_string(),
                });
            }
            return Ok(());
        }

        match ty {
            TypeRef::Basic(_) | TypeRef::Error => {}
            TypeRef::Pointer(elem) => {
                self.pointer_depth += 1;
                let visited = self.visit(elem, location);
                self.pointer_depth -= 1;
                visited?;
            }
            TypeRef::Slice(elem) | TypeRef::Array { elem, .. } => self.visit(elem, location)?,
            TypeRef::Map { key, elem } => {
                if !self.is_string_like(key) {
                    return Err(GenError::NonStringMapKey {
                        key: key.to_string(),
                        location: location.clone(),
                    });
                }
                self.visit(key, location)?;
                self.visit(elem, location)?;
            }
            TypeRef::Struct(_) => {
                return Err(GenError::UnsupportedType {
                    ty: ty.to_string(),
                    reason: "struct types must be declared as named types",
                    location: location.clone(),
                });
            }
            TypeRef::Named(name) => {
                if let Some(pos) = self.in_progress.iter().position(|(n, _)| n == name) {
                    if self.pointer_depth > self.in_progress[pos].1 {
                        // Registered once its own expansion finishes.
                        return Ok(());
                    }
                    let mut path: Vec<&str> = self.in_progress[pos..]
                        .iter()
                        .map(|(n, _)| n.as_str())
                        .collect();
                    path.push(name.as_str());
                    return Err(GenError::TypeCycle {
                        name: name.to_string(),
                        path: path.join(" -> "),
                        location: location.clone(),
                    });
                }
                self.visit_named(name, location)?;
            }
        }

        trace!(%id, "registered type");
        self.closure.insert(id, ty.clone());
        Ok(())
    }

    fn visit_named(&mut self, name: &QualifiedName, location: &Location) -> Result<(), GenError> {
        let types = self.types;
        let underlying = types
            .underlying(name)
            .ok_or_else(|| GenError::UnknownType {
                name: name.to_string(),
                location: location.clone(),
            })?;

        self.in_progress.push((name.clone(), self.pointer_depth));
        let expanded = match underlying {
            TypeRef::Struct(fields) => {
                let mut seen = AHashSet::new();
                fields.iter().try_for_each(|field| {
                    if !is_identifier(&field.name) {
                        return Err(GenError::InvalidName {
                            name: format!("{name}.{}", field.name),
                            location: location.clone(),
                        });
                    }
                    if !seen.insert(field.foreign_name()) {
                        return Err(GenError::DuplicateName {
                            name: format!("{name}.{}", field.foreign_name()),
                            location: location.clone(),
                        });
                    }
                    self.visit(&field.ty, location)
                })
            }
            other => self.visit(other, location),
        };
        self.in_progress.pop();
        expanded
    }

    /// `string`, or a named type whose underlying type is string-like.
    fn is_string_like(&self, ty: &TypeRef) -> bool {
        let mut current = ty;
        for _ in 0..=self.types.len() {
            match current {
                TypeRef::Basic(rbind_ffi::BasicKind::String) => return true,
                TypeRef::Named(name) => match self.types.underlying(name) {
                    Some(next) => current = next,
                    None => return false,
                },
                _ => return false,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbind_ffi::{BasicKind, Field, Param};

    fn int() -> TypeRef {
        TypeRef::basic(BasicKind::Int)
    }

    fn single(ty: TypeRef) -> BridgeSpec {
        BridgeSpec::new("p", "p").with_function(Signature::new(
            "f",
            vec![Param::new(Some("x"), ty)],
            Vec::new(),
        ))
    }

    fn ids(closure: &TypeClosure) -> Vec<&str> {
        closure.iter().map(|entry| entry.id.as_str()).collect()
    }

    #[test]
    fn closure_is_post_order() -> anyhow::Result<()> {
        let closure = collect(&single(TypeRef::map(
            TypeRef::basic(BasicKind::String),
            TypeRef::slice(int()),
        )))?;
        assert_eq!(
            ids(&closure),
            ["string", "int", "slice_int", "map_string_slice_int"]
        );
        Ok(())
    }

    #[test]
    fn shared_types_are_registered_once() -> anyhow::Result<()> {
        let spec = BridgeSpec::new("p", "p").with_function(Signature::new(
            "f",
            vec![
                Param::new(Some("a"), TypeRef::slice(int())),
                Param::new(Some("b"), TypeRef::slice(int())),
            ],
            vec![Param::new(None, int())],
        ));
        assert_eq!(ids(&collect(&spec)?), ["int", "slice_int"]);
        Ok(())
    }

    #[test]
    fn named_struct_registers_only_the_name() -> anyhow::Result<()> {
        let spec = single(TypeRef::named("geom::Point")).with_type(
            "geom::Point",
            TypeRef::Struct(vec![
                Field::new("x", TypeRef::basic(BasicKind::Float64)),
                Field::new("y", TypeRef::basic(BasicKind::Float64)).renamed("Y"),
            ]),
        );
        assert_eq!(
            ids(&collect(&spec)?),
            ["float64", "named_17_geom_3a__3a_Point"]
        );
        Ok(())
    }

    #[test]
    fn anonymous_structs_are_rejected() {
        let err = collect(&single(TypeRef::Struct(vec![Field::new("a", int())]))).unwrap_err();
        assert!(matches!(err, GenError::UnsupportedType { .. }));
        assert_eq!(err.function(), Some("f"));
    }

    #[test]
    fn unknown_names_report_location() {
        let err = collect(&single(TypeRef::named("geom::Missing"))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown type `geom::Missing` in function `f` parameter `x`"
        );
    }

    #[test]
    fn cycles_through_pointers_are_lazy() -> anyhow::Result<()> {
        let spec = single(TypeRef::named("list::Node")).with_type(
            "list::Node",
            TypeRef::Struct(vec![
                Field::new("value", int()),
                Field::new("next", TypeRef::pointer(TypeRef::named("list::Node"))),
            ]),
        );
        let closure = collect(&spec)?;
        assert_eq!(
            ids(&closure),
            ["int", "ptr_named_16_list_3a__3a_Node", "named_16_list_3a__3a_Node"]
        );
        Ok(())
    }

    #[test]
    fn direct_cycles_are_rejected() {
        let spec = single(TypeRef::named("a::A"))
            .with_type("a::A", TypeRef::slice(TypeRef::named("a::B")))
            .with_type("a::B", TypeRef::Struct(vec![Field::new("a", TypeRef::named("a::A"))]));
        match collect(&spec).unwrap_err() {
            GenError::TypeCycle { path, .. } => assert_eq!(path, "a::A -> a::B -> a::A"),
            other => panic!("expected a cycle, got {other}"),
        }
    }

    #[test]
    fn map_keys_must_be_string_like() {
        let err = collect(&single(TypeRef::map(int(), int()))).unwrap_err();
        assert!(matches!(err, GenError::NonStringMapKey { .. }));

        let spec = single(TypeRef::map(TypeRef::named("p::Key"), int()))
            .with_type("p::Key", TypeRef::basic(BasicKind::String));
        assert!(collect(&spec).is_ok());
    }

    #[test]
    fn variadic_requires_trailing_slice() {
        let mut signature = Signature::new("f", vec![Param::new(Some("x"), int())], Vec::new());
        signature.variadic = true;
        let err = collect(&BridgeSpec::new("p", "p").with_function(signature)).unwrap_err();
        assert!(matches!(err, GenError::BadVariadic { .. }));
    }

    #[test]
    fn duplicate_parameter_names_are_rejected() {
        let spec = BridgeSpec::new("p", "p").with_function(Signature::new(
            "f",
            vec![Param::new(Some("x"), int()), Param::new(Some("x"), int())],
            Vec::new(),
        ));
        assert!(matches!(
            collect(&spec).unwrap_err(),
            GenError::DuplicateName { .. }
        ));
    }

    #[test]
    fn r_argument_names_must_be_distinct() {
        let positional = BridgeSpec::new("p", "p").with_function(Signature::new(
            "f",
            vec![Param::new(Some("p1"), int()), Param::new(None, int())],
            Vec::new(),
        ));
        assert_eq!(
            collect(&positional).unwrap_err(),
            GenError::ForeignNameClash {
                name: "p1".into(),
                location: Location::param("f", 1, None),
            }
        );

        let prefixed = BridgeSpec::new("p", "p").with_function(Signature::new(
            "g",
            vec![Param::new(Some("_x"), int()), Param::new(Some("p_x"), int())],
            Vec::new(),
        ));
        assert_eq!(
            collect(&prefixed).unwrap_err().to_string(),
            "function `g` parameter `p_x` becomes the R argument `p_x`, which an earlier parameter already uses"
        );
    }
}
