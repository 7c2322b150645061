use std::fmt;

use ahash::AHashMap;
use rbind_ffi::{BasicKind, Field, QualifiedName, TypeRef, TypeTable};

use crate::collect::TypeClosure;
use crate::error::GenError;

/// How the elements of an R vector are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Storage {
    Logical,
    Integer,
    Real,
    Complex,
    Character,
    List,
}

impl Storage {
    pub fn is_atomic(self) -> bool {
        !matches!(self, Self::List)
    }
}

/// Marshaling strategy for one type in the closure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanKind {
    Scalar(BasicKind),
    /// Slices and arrays whose element layout matches an R vector exactly.
    BulkVector { elem: BasicKind, len: Option<usize> },
    ElementVector {
        elem: TypeRef,
        len: Option<usize>,
        storage: Storage,
    },
    StringMap {
        key: TypeRef,
        elem: TypeRef,
        storage: Storage,
    },
    Record {
        name: QualifiedName,
        fields: Vec<Field>,
    },
    Optional { elem: TypeRef },
    Error,
    Alias {
        name: QualifiedName,
        underlying: TypeRef,
    },
}

impl PlanKind {
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::BulkVector { .. } => "bulk-vector",
            Self::ElementVector { .. } => "element-vector",
            Self::StringMap { .. } => "string-map",
            Self::Record { .. } => "record",
            Self::Optional { .. } => "optional",
            Self::Error => "error",
            Self::Alias { .. } => "alias",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MarshalPlan {
    pub id: String,
    pub ty: TypeRef,
    pub kind: PlanKind,
}

impl fmt::Display for MarshalPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.id, self.kind.strategy(), self.ty)
    }
}

/// Plans for the whole closure, in closure order.
#[derive(Clone, Debug, Default)]
pub struct PlanSet {
    plans: Vec<MarshalPlan>,
    index: AHashMap<String, usize>,
}

impl PlanSet {
    pub fn get(&self, id: &str) -> Option<&MarshalPlan> {
        self.index.get(id).map(|&idx| &self.plans[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarshalPlan> {
        self.plans.iter()
    }

    pub fn as_slice(&self) -> &[MarshalPlan] {
        &self.plans
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}

/// Assign a plan to every member of `closure`.
pub fn plan_closure(closure: &TypeClosure, types: &TypeTable) -> Result<PlanSet, GenError> {
    let mut set = PlanSet::default();
    for entry in closure.iter() {
        let kind = plan_for(&entry.ty, types).ok_or_else(|| GenError::Unplannable {
            ty: entry.ty.to_string(),
        })?;
        set.index.insert(entry.id.clone(), set.plans.len());
        set.plans.push(MarshalPlan {
            id: entry.id.clone(),
            ty: entry.ty.clone(),
            kind,
        });
    }
    Ok(set)
}

/// `None` for anonymous structs and undeclared names, which the collector rejects.
pub fn plan_for(ty: &TypeRef, types: &TypeTable) -> Option<PlanKind> {
    let kind = match ty {
        TypeRef::Basic(kind) => PlanKind::Scalar(*kind),
        TypeRef::Error => PlanKind::Error,
        TypeRef::Pointer(elem) => PlanKind::Optional {
            elem: (**elem).clone(),
        },
        TypeRef::Slice(elem) => vector_plan(elem, None, types),
        TypeRef::Array { elem, len } => vector_plan(elem, Some(*len), types),
        TypeRef::Map { key, elem } => PlanKind::StringMap {
            key: (**key).clone(),
            elem: (**elem).clone(),
            storage: element_storage(elem, types),
        },
        TypeRef::Named(name) => match types.underlying(name)? {
            TypeRef::Struct(fields) => PlanKind::Record {
                name: name.clone(),
                fields: fields.clone(),
            },
            underlying => PlanKind::Alias {
                name: name.clone(),
                underlying: underlying.clone(),
            },
        },
        TypeRef::Struct(_) => return None,
    };
    Some(kind)
}

fn vector_plan(elem: &TypeRef, len: Option<usize>, types: &TypeTable) -> PlanKind {
    match elem.as_basic() {
        Some(kind) if is_bulk_kind(kind) => PlanKind::BulkVector { elem: kind, len },
        _ => PlanKind::ElementVector {
            elem: elem.clone(),
            len,
            storage: element_storage(elem, types),
        },
    }
}

/// Element kinds whose Rust layout is identical to an R vector cell.
pub fn is_bulk_kind(kind: BasicKind) -> bool {
    matches!(
        kind,
        BasicKind::Int32 | BasicKind::Uint8 | BasicKind::Float64 | BasicKind::Complex128
    )
}

pub fn basic_storage(kind: BasicKind) -> Storage {
    match kind {
        BasicKind::Bool => Storage::Logical,
        BasicKind::Float32 | BasicKind::Float64 => Storage::Real,
        BasicKind::Complex64 | BasicKind::Complex128 => Storage::Complex,
        BasicKind::String => Storage::Character,
        _ => Storage::Integer,
    }
}

/// Storage of a vector holding `elem`, looking through aliases of scalars.
pub fn element_storage(elem: &TypeRef, types: &TypeTable) -> Storage {
    match scalar_root(elem, types) {
        Some(ScalarRoot::Basic(kind)) => basic_storage(kind),
        Some(ScalarRoot::Error) => Storage::Character,
        None => Storage::List,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScalarRoot {
    Basic(BasicKind),
    Error,
}

/// The scalar a chain of aliases bottoms out in, if any.
pub fn scalar_root(ty: &TypeRef, types: &TypeTable) -> Option<ScalarRoot> {
    let mut current = ty;
    for _ in 0..=types.len() {
        match current {
            TypeRef::Basic(kind) => return Some(ScalarRoot::Basic(*kind)),
            TypeRef::Error => return Some(ScalarRoot::Error),
            TypeRef::Named(name) => current = types.underlying(name)?,
            _ => return None,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic(kind: BasicKind) -> TypeRef {
        TypeRef::basic(kind)
    }

    #[test]
    fn fastpath_covers_exact_layouts_only() {
        let types = TypeTable::new();
        for kind in BasicKind::ALL {
            let plan = plan_for(&TypeRef::slice(basic(kind)), &types).expect("planned");
            assert_eq!(
                matches!(plan, PlanKind::BulkVector { .. }),
                is_bulk_kind(kind),
                "{kind}"
            );
        }
        assert_eq!(
            plan_for(&TypeRef::array(basic(BasicKind::Uint8), 16), &types),
            Some(PlanKind::BulkVector {
                elem: BasicKind::Uint8,
                len: Some(16)
            })
        );
    }

    #[test]
    fn slowpath_storage_follows_element_kind() {
        let mut types = TypeTable::new();
        types.declare("p::Celsius".into(), basic(BasicKind::Float32));
        let storage = |elem: TypeRef| match plan_for(&TypeRef::slice(elem), &types) {
            Some(PlanKind::ElementVector { storage, .. }) => storage,
            other => panic!("unexpected plan {other:?}"),
        };
        assert_eq!(storage(basic(BasicKind::Int64)), Storage::Integer);
        assert_eq!(storage(basic(BasicKind::Bool)), Storage::Logical);
        assert_eq!(storage(basic(BasicKind::String)), Storage::Character);
        assert_eq!(storage(TypeRef::Error), Storage::Character);
        assert_eq!(storage(TypeRef::named("p::Celsius")), Storage::Real);
        assert_eq!(storage(TypeRef::slice(basic(BasicKind::Int))), Storage::List);
    }

    #[test]
    fn named_types_split_into_records_and_aliases() {
        let mut types = TypeTable::new();
        types.declare(
            "geom::Point".into(),
            TypeRef::Struct(vec![Field::new("x", basic(BasicKind::Float64))]),
        );
        types.declare("geom::Label".into(), basic(BasicKind::String));

        assert!(matches!(
            plan_for(&TypeRef::named("geom::Point"), &types),
            Some(PlanKind::Record { .. })
        ));
        assert_eq!(
            plan_for(&TypeRef::named("geom::Label"), &types),
            Some(PlanKind::Alias {
                name: "geom::Label".into(),
                underlying: basic(BasicKind::String)
            })
        );
        assert_eq!(plan_for(&TypeRef::named("geom::Missing"), &types), None);
    }

    #[test]
    fn map_storage_is_atomic_for_scalars() {
        let types = TypeTable::new();
        let plan = plan_for(
            &TypeRef::map(basic(BasicKind::String), basic(BasicKind::Int)),
            &types,
        );
        assert!(matches!(
            plan,
            Some(PlanKind::StringMap {
                storage: Storage::Integer,
                ..
            })
        ));
    }
}
