//! Canonical identity of a type reference.
//!
//! Identities name the generated routines (`unpack_<id>`, `pack_<id>`), so
//! they must be valid in an identifier. Free-form names are escaped (any byte
//! other than an ASCII letter or digit becomes `_<hex>_`) and prefixed with
//! their escaped length, which keeps the encoding prefix-free and therefore
//! injective.

use std::fmt::Write;

use rbind_ffi::TypeRef;

pub fn mangle(ty: &TypeRef) -> String {
    let mut out = String::new();
    write_mangled(ty, &mut out);
    out
}

fn write_mangled(ty: &TypeRef, out: &mut String) {
    match ty {
        TypeRef::Basic(kind) => out.push_str(kind.ident()),
        TypeRef::Error => out.push_str("error"),
        TypeRef::Named(name) => {
            out.push_str("named_");
            write_name(name.as_str(), out);
        }
        TypeRef::Pointer(elem) => {
            out.push_str("ptr_");
            write_mangled(elem, out);
        }
        TypeRef::Slice(elem) => {
            out.push_str("slice_");
            write_mangled(elem, out);
        }
        TypeRef::Array { elem, len } => {
            let _ = write!(out, "array_{len}_");
            write_mangled(elem, out);
        }
        TypeRef::Map { key, elem } => {
            out.push_str("map_");
            write_mangled(key, out);
            out.push('_');
            write_mangled(elem, out);
        }
        TypeRef::Struct(fields) => {
            let _ = write!(out, "struct_{}", fields.len());
            for field in fields {
                out.push('_');
                write_name(&field.name, out);
                if let Some(rename) = &field.rename {
                    out.push_str("_as_");
                    write_name(rename, out);
                }
                out.push('_');
                write_mangled(&field.ty, out);
            }
        }
    }
}

fn write_name(name: &str, out: &mut String) {
    let escaped = escape(name);
    let _ = write!(out, "{}_{escaped}", escaped.len());
}

fn escape(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() {
            escaped.push(char::from(byte));
        } else {
            let _ = write!(escaped, "_{byte:02x}_");
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use rbind_ffi::{BasicKind, Field};

    fn float64() -> TypeRef {
        TypeRef::basic(BasicKind::Float64)
    }

    #[test]
    fn basic_kinds_use_their_literal() {
        for kind in BasicKind::ALL {
            assert_eq!(mangle(&TypeRef::basic(kind)), kind.ident());
        }
        assert_eq!(mangle(&TypeRef::Error), "error");
    }

    #[test]
    fn composites_nest() {
        assert_eq!(mangle(&TypeRef::slice(float64())), "slice_float64");
        assert_eq!(
            mangle(&TypeRef::array(TypeRef::basic(BasicKind::Uint8), 16)),
            "array_16_uint8"
        );
        assert_eq!(
            mangle(&TypeRef::map(
                TypeRef::basic(BasicKind::String),
                TypeRef::pointer(float64())
            )),
            "map_string_ptr_float64"
        );
        assert_eq!(
            mangle(&TypeRef::named("geom::Point")),
            "named_17_geom_3a__3a_Point"
        );
    }

    #[test]
    fn field_overrides_change_identity() {
        let plain = TypeRef::Struct(vec![Field::new("y", float64())]);
        let renamed = TypeRef::Struct(vec![Field::new("y", float64()).renamed("Y")]);
        assert_eq!(mangle(&plain), "struct_1_1_y_float64");
        assert_eq!(mangle(&renamed), "struct_1_1_y_as_1_Y_float64");
    }

    #[test]
    fn output_is_identifier_safe() {
        let ty = TypeRef::map(
            TypeRef::named("ns::Key-ß"),
            TypeRef::Struct(vec![Field::new("a b", TypeRef::Error)]),
        );
        let id = mangle(&ty);
        assert!(id.chars().all(|ch| ch == '_' || ch.is_ascii_alphanumeric()));
    }
}
