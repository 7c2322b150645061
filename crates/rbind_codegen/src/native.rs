//! Rust side of the bridge: one `unpack_`/`pack_` pair per plan and one
//! `extern "C"` entry point per function.
//!
//! Generated routines only allocate through a `ProtectScope`, so the
//! protection stack is balanced on every exit path without explicit
//! `unprotect` calls.

use rayon::prelude::*;
use rbind_ffi::{BasicKind, BridgeSymbol, QualifiedName, Signature, TypeRef, TypeTable};
use tracing::trace;

use crate::GENERATED_BY;
use crate::context::GenerationContext;
use crate::mangle::mangle;
use crate::naming::{native_arg, r_param, result_key};
use crate::plan::{MarshalPlan, PlanKind, Storage};
use crate::writer::CodeWriter;

const INDENT: &str = "    ";

pub fn emit_native(ctx: &GenerationContext<'_>) -> String {
    let routines: Vec<String> = ctx
        .plans
        .as_slice()
        .par_iter()
        .map(|plan| render_plan(ctx, plan))
        .collect();
    let entries: Vec<String> = ctx
        .spec
        .functions
        .par_iter()
        .filter_map(|signature| {
            ctx.symbols
                .get(&signature.name)
                .map(|symbol| render_entry(ctx, signature, symbol))
        })
        .collect();

    let mut w = CodeWriter::new(INDENT);
    w.line(format!("// {GENERATED_BY}"))
        .line(format!("// fingerprint: {}", ctx.fingerprint))
        .blank()
        .line("#![allow(clippy::all, dead_code, non_snake_case, unused_imports, unused_variables)]")
        .blank()
        .line(format!("use {} as rt;", ctx.spec.runtime_path))
        .line("use rt::RApi as _;");
    for routine in routines.iter().chain(&entries) {
        w.blank().raw(routine);
    }
    trace!(
        routines = routines.len(),
        entries = entries.len(),
        "rendered native source"
    );
    w.finish()
}

fn unpack_open(id: &str, rust: &str) -> String {
    format!(
        "fn unpack_{id}<A: rt::RApi + ?Sized>(api: &A, p: rt::Sexp) -> Result<{rust}, rt::BridgeError> {{"
    )
}

fn pack_open(id: &str, rust: &str) -> String {
    format!(
        "fn pack_{id}<A: rt::RApi + ?Sized>(api: &A, p: {rust}) -> Result<rt::Sexp, rt::BridgeError> {{"
    )
}

fn render_plan(ctx: &GenerationContext<'_>, plan: &MarshalPlan) -> String {
    let types = ctx.types();
    let id = plan.id.as_str();
    let rust = rust_type(&plan.ty);
    let mut w = CodeWriter::new(INDENT);

    if let PlanKind::BulkVector { elem, len: None } = &plan.kind {
        w.open(format!(
            "fn view_{id}<'a, A: rt::RApi + ?Sized>(api: &'a A, p: rt::Sexp) -> Result<&'a [{}], rt::BridgeError> {{",
            basic_rust(*elem)
        ))
        .line(format!("rt::convert::{}(api, p)", bulk_view(*elem)))
        .close("}")
        .blank();
    }

    w.open(unpack_open(id, &rust));
    unpack_body(&mut w, &plan.kind, types);
    w.close("}").blank();

    w.open(pack_open(id, &rust));
    pack_body(&mut w, &plan.kind, types);
    w.close("}");
    w.finish()
}

fn unpack_body(w: &mut CodeWriter, kind: &PlanKind, types: &TypeTable) {
    match kind {
        PlanKind::Scalar(kind) => {
            w.line(format!(
                "let v = rt::convert::{}(api, p)?;",
                scalar_reader(*kind)
            ))
            .line(format!("Ok({})", scalar_from(*kind, "v")));
        }
        PlanKind::BulkVector { elem, len: None } => {
            w.line(format!(
                "Ok(rt::convert::{}(api, p)?.to_vec())",
                bulk_view(*elem)
            ));
        }
        PlanKind::BulkVector {
            elem,
            len: Some(len),
        } => {
            w.line(format!("let cells = rt::convert::{}(api, p)?;", bulk_view(*elem)))
                .line(format!("<[{}; {len}]>::try_from(cells).map_err(|_| rt::BridgeError::LengthMismatch {{", basic_rust(*elem)))
                .line(format!("{INDENT}expected: {len},"))
                .line(format!("{INDENT}found: cells.len(),"))
                .line("})");
        }
        PlanKind::ElementVector { elem, len, storage } => {
            let read = read_elements(elem, *storage, "p", types);
            match len {
                None => {
                    w.line(read);
                }
                Some(len) => {
                    w.line(format!("let items = {read}?;"))
                        .line(format!(
                            "<[{}; {len}]>::try_from(items).map_err(|items| rt::BridgeError::LengthMismatch {{",
                            rust_type(elem)
                        ))
                        .line(format!("{INDENT}expected: {len},"))
                        .line(format!("{INDENT}found: items.len(),"))
                        .line("})");
                }
            }
        }
        PlanKind::StringMap { key, elem, storage } => {
            let what = if storage.is_atomic() { "vector" } else { "list" };
            w.line(format!("let keys = rt::convert::names(api, p, {what:?})?;"))
                .line(format!(
                    "let values = {}?;",
                    read_elements(elem, *storage, "p", types)
                ))
                .line(format!(
                    "Ok(keys.into_iter().map(|k| {}).zip(values).collect())",
                    from_string(key, "k", types)
                ));
        }
        PlanKind::Record { name, fields } => {
            let names: Vec<String> = fields
                .iter()
                .map(|field| format!("{:?}", field.foreign_name()))
                .collect();
            w.line(format!(
                "let fields = rt::RecordFields::new(api, p, {:?}, &[{}])?;",
                name.as_str(),
                names.join(", ")
            ))
            .open(format!("Ok({name} {{"));
            for (field, foreign) in fields.iter().zip(&names) {
                w.line(format!(
                    "{}: unpack_{}(api, fields.get({foreign})?)?,",
                    field.name,
                    mangle(&field.ty)
                ));
            }
            w.close("})");
        }
        PlanKind::Optional { elem } => {
            w.open("if api.is_null(p) {")
                .line("return Ok(None);")
                .close("}")
                .line(format!(
                    "unpack_{}(api, p).map(|v| Some(Box::new(v)))",
                    mangle(elem)
                ));
        }
        PlanKind::Error => {
            w.line("let message = rt::convert::optional_string_scalar(api, p)?;")
                .line("Ok(rt::convert::error_from_message(message))");
        }
        PlanKind::Alias { name, underlying } => {
            w.line(format!(
                "unpack_{}(api, p).map(<{name}>::from)",
                mangle(underlying)
            ));
        }
    }
}

fn pack_body(w: &mut CodeWriter, kind: &PlanKind, types: &TypeTable) {
    match kind {
        PlanKind::Scalar(kind) => {
            w.line(scalar_writer(*kind, "p"));
        }
        PlanKind::BulkVector { elem, .. } => {
            w.line(format!("Ok(rt::convert::{}(api, &p))", bulk_vector(*elem)));
        }
        PlanKind::ElementVector { elem, storage, .. } => {
            if storage.is_atomic() {
                let (build, fallible) = atomic_writer(elem, *storage, "p", types);
                w.line(if fallible { build } else { format!("Ok({build})") });
            } else {
                w.line("let mut scope = rt::ProtectScope::new(api);");
                write_list(w, elem, "p");
                w.line("Ok(out)");
            }
        }
        PlanKind::StringMap { key, elem, storage } => {
            w.line("let mut scope = rt::ProtectScope::new(api);").line(format!(
                "let (keys, values): (Vec<{}>, Vec<{}>) = p.into_iter().unzip();",
                rust_type(key),
                rust_type(elem)
            ));
            if storage.is_atomic() {
                let (build, fallible) = atomic_writer(elem, *storage, "values", types);
                let question = if fallible { "?" } else { "" };
                w.line(format!("let out = scope.protect({build}{question});"));
            } else {
                write_list(w, elem, "values");
            }
            w.line(format!(
                "rt::convert::set_names(api, out, keys.into_iter().map(|k| {}))?;",
                to_string(key, "k", types)
            ))
            .line("Ok(out)");
        }
        PlanKind::Record { fields, .. } => {
            let names: Vec<String> = fields
                .iter()
                .map(|field| format!("{:?}", field.foreign_name()))
                .collect();
            w.line("let mut scope = rt::ProtectScope::new(api);")
                .line(format!(
                    "let out = rt::convert::named_list(&mut scope, &[{}])?;",
                    names.join(", ")
                ));
            for (idx, field) in fields.iter().enumerate() {
                w.line(format!(
                    "api.set_vector_elt(out, {idx}, pack_{}(api, p.{})?);",
                    mangle(&field.ty),
                    field.name
                ));
            }
            w.line("Ok(out)");
        }
        PlanKind::Optional { elem } => {
            w.open("match p {")
                .line(format!("Some(v) => pack_{}(api, *v),", mangle(elem)))
                .line("None => Ok(api.nil()),")
                .close("}");
        }
        PlanKind::Error => {
            w.open("match rt::convert::error_message(&p) {")
                .line("Some(message) => rt::convert::string_value(api, &message),")
                .line("None => Ok(api.nil()),")
                .close("}");
        }
        PlanKind::Alias { underlying, .. } => {
            w.line(format!(
                "pack_{}(api, <{}>::from(p))",
                mangle(underlying),
                rust_type(underlying)
            ));
        }
    }
}

/// Binds `out` to a list holding each packed element of `src`; needs `scope`.
fn write_list(w: &mut CodeWriter, elem: &TypeRef, src: &str) {
    w.line(format!(
        "let out = scope.protect(api.alloc_vector(rt::SexpType::List, {src}.len()));"
    ))
    .open(format!("for (idx, v) in {src}.into_iter().enumerate() {{"))
    .line(format!(
        "api.set_vector_elt(out, idx, pack_{}(api, v)?);",
        mangle(elem)
    ))
    .close("}");
}

/// Expression of type `Result<Vec<T>, BridgeError>` reading every element of `src`.
fn read_elements(elem: &TypeRef, storage: Storage, src: &str, types: &TypeTable) -> String {
    let rust = rust_type(elem);
    let collect = format!("{INDENT}.collect::<Result<Vec<{rust}>, rt::BridgeError>>()");
    let (source, map) = match storage {
        Storage::List => (
            format!("rt::convert::list_elements(api, {src})?\n{INDENT}.into_iter()"),
            format!("{INDENT}.map(|v| unpack_{}(api, v))", mangle(elem)),
        ),
        Storage::Character => (
            format!("rt::convert::character_elements(api, {src})?\n{INDENT}.into_iter()"),
            format!(
                "{INDENT}.map(|v| -> Result<{rust}, rt::BridgeError> {{ Ok({}) }})",
                element_from(elem, "v", types)
            ),
        ),
        atomic => (
            format!(
                "rt::convert::{}(api, {src})?\n{INDENT}.iter()",
                storage_view(atomic)
            ),
            format!(
                "{INDENT}.map(|&v| -> Result<{rust}, rt::BridgeError> {{ Ok({}) }})",
                element_from(elem, "v", types)
            ),
        ),
    };
    format!("{source}\n{map}\n{collect}")
}

/// Expression building an atomic vector from the owned elements of `src`.
///
/// Character vectors are fallible to build; the flag says whether the
/// expression yields `Result<Sexp, _>` rather than `Sexp`.
fn atomic_writer(elem: &TypeRef, storage: Storage, src: &str, types: &TypeTable) -> (String, bool) {
    let build = format!(
        "rt::convert::{}(api, {src}.into_iter().map(|v| {}))",
        storage_writer(storage),
        element_to(elem, "v", types)
    );
    (build, storage == Storage::Character)
}

fn render_entry(ctx: &GenerationContext<'_>, signature: &Signature, symbol: &BridgeSymbol) -> String {
    let args: Vec<String> = signature
        .params
        .iter()
        .enumerate()
        .map(|(idx, param)| format!("{}: rt::Sexp", native_arg(idx, param)))
        .collect();

    let mut w = CodeWriter::new(INDENT);
    w.line("#[unsafe(no_mangle)]")
        .open(format!(
            "pub extern \"C\" fn {}({}) -> rt::Sexp {{",
            symbol.entry_symbol,
            args.join(", ")
        ))
        .open(format!(
            "rt::call_boundary(&rt::LibR, {:?}, |api| {{",
            signature.name
        ));

    let mut call_args = Vec::with_capacity(signature.params.len());
    for (idx, param) in signature.params.iter().enumerate() {
        let id = mangle(&param.ty);
        let borrowed = matches!(
            ctx.plan_for(&param.ty).map(|plan| &plan.kind),
            Some(PlanKind::BulkVector { len: None, .. })
        );
        let reader = if borrowed { "view" } else { "unpack" };
        w.line(format!(
            "let p{idx} = {reader}_{id}(api, {}).map_err(|e| e.for_argument({:?}))?;",
            native_arg(idx, param),
            r_param(idx, param)
        ));
        call_args.push(if param.ty.is_slice() {
            format!("&p{idx}")
        } else {
            format!("p{idx}")
        });
    }

    let call = format!(
        "{}({})",
        function_path(&ctx.spec.crate_path, &signature.name),
        call_args.join(", ")
    );
    match signature.results.as_slice() {
        [] => {
            w.line(format!("{call};")).line("Ok(api.nil())");
        }
        [result] => {
            w.line(format!("let r0 = {call};"))
                .line(format!("pack_{}(api, r0)", mangle(&result.ty)));
        }
        results => {
            let bindings: Vec<String> = (0..results.len()).map(|idx| format!("r{idx}")).collect();
            let keys: Vec<String> = results
                .iter()
                .enumerate()
                .map(|(idx, result)| format!("{:?}", result_key(idx, result)))
                .collect();
            w.line(format!("let ({}) = {call};", bindings.join(", ")))
                .line("let mut scope = rt::ProtectScope::new(api);")
                .line(format!(
                    "let out = rt::convert::named_list(&mut scope, &[{}])?;",
                    keys.join(", ")
                ));
            for (idx, result) in results.iter().enumerate() {
                w.line(format!(
                    "api.set_vector_elt(out, {idx}, pack_{}(api, r{idx})?);",
                    mangle(&result.ty)
                ));
            }
            w.line("Ok(out)");
        }
    }

    w.close("})").close("}");
    w.finish()
}

fn function_path(crate_path: &str, function: &str) -> String {
    if crate_path.is_empty() {
        function.to_string()
    } else {
        format!("{crate_path}::{function}")
    }
}

/// Owned Rust spelling of `ty` inside generated code.
pub fn rust_type(ty: &TypeRef) -> String {
    match ty {
        TypeRef::Basic(kind) => basic_rust(*kind),
        TypeRef::Named(name) => name.to_string(),
        TypeRef::Pointer(elem) => format!("Option<Box<{}>>", rust_type(elem)),
        TypeRef::Array { elem, len } => format!("[{}; {len}]", rust_type(elem)),
        TypeRef::Slice(elem) => format!("Vec<{}>", rust_type(elem)),
        TypeRef::Map { key, elem } => format!(
            "std::collections::HashMap<{}, {}>",
            rust_type(key),
            rust_type(elem)
        ),
        TypeRef::Error => "rt::NativeError".to_string(),
        TypeRef::Struct(_) => {
            "compile_error!(\"anonymous struct types cannot be bridged\")".to_string()
        }
    }
}

fn basic_rust(kind: BasicKind) -> String {
    if kind.is_complex() {
        format!("rt::{}", kind.rust_type())
    } else {
        kind.rust_type().to_string()
    }
}

fn bulk_view(kind: BasicKind) -> &'static str {
    match kind {
        BasicKind::Uint8 => "raw_view",
        BasicKind::Float64 => "real_view",
        BasicKind::Complex128 => "complex_view",
        _ => "integer_view",
    }
}

fn bulk_vector(kind: BasicKind) -> &'static str {
    match kind {
        BasicKind::Uint8 => "raw_vector",
        BasicKind::Float64 => "real_vector",
        BasicKind::Complex128 => "complex_vector",
        _ => "integer_vector",
    }
}

fn storage_view(storage: Storage) -> &'static str {
    match storage {
        Storage::Logical => "logical_view",
        Storage::Real => "real_view",
        Storage::Complex => "complex_view",
        _ => "integer_view",
    }
}

fn storage_writer(storage: Storage) -> &'static str {
    match storage {
        Storage::Logical => "logical_from_iter",
        Storage::Real => "real_from_iter",
        Storage::Complex => "complex_from_iter",
        Storage::Character => "character_from_iter",
        _ => "integer_from_iter",
    }
}

fn scalar_reader(kind: BasicKind) -> &'static str {
    match kind {
        BasicKind::Bool => "logical_scalar",
        BasicKind::Float32 | BasicKind::Float64 => "real_scalar",
        BasicKind::Complex64 | BasicKind::Complex128 => "complex_scalar",
        BasicKind::String => "string_scalar",
        _ => "integer_scalar",
    }
}

/// Converts the value returned by `scalar_reader(kind)` into `kind`.
fn scalar_from(kind: BasicKind, v: &str) -> String {
    match kind {
        BasicKind::Bool
        | BasicKind::Int32
        | BasicKind::Float64
        | BasicKind::Complex128
        | BasicKind::String => v.to_string(),
        BasicKind::Float32 => format!("{v} as f32"),
        BasicKind::Complex64 => format!("rt::Complex64::from({v})"),
        integer => format!("{v} as {}", integer.rust_type()),
    }
}

/// Converts one cell of a vector with `basic_storage(kind)` into `kind`.
fn cell_from(kind: BasicKind, v: &str) -> String {
    match kind {
        BasicKind::Bool => format!("rt::convert::logical_to_bool({v})?"),
        BasicKind::String => format!("{v}.ok_or(rt::BridgeError::NaValue(\"character value\"))?"),
        other => scalar_from(other, v),
    }
}

/// Converts `v` of `kind` into the cell type its R vector stores.
fn cell_to(kind: BasicKind, v: &str) -> String {
    match kind {
        BasicKind::Bool | BasicKind::Int32 | BasicKind::Float64 | BasicKind::Complex128 => {
            v.to_string()
        }
        BasicKind::String => format!("Some({v})"),
        BasicKind::Float32 => format!("f64::from({v})"),
        BasicKind::Complex64 => format!("rt::Complex128::from({v})"),
        _ => format!("{v} as i32"),
    }
}

fn scalar_writer(kind: BasicKind, v: &str) -> String {
    let cell = cell_to(kind, v);
    match kind {
        BasicKind::Bool => format!("Ok(rt::convert::logical_value(api, {cell}))"),
        BasicKind::Float32 | BasicKind::Float64 => format!("Ok(rt::convert::real_value(api, {cell}))"),
        BasicKind::Complex64 | BasicKind::Complex128 => {
            format!("Ok(rt::convert::complex_value(api, {cell}))")
        }
        BasicKind::String => format!("rt::convert::string_value(api, &{v})"),
        _ => format!("Ok(rt::convert::integer_value(api, {cell}))"),
    }
}

fn underlying<'t>(name: &QualifiedName, types: &'t TypeTable) -> Option<&'t TypeRef> {
    types.underlying(name)
}

/// Converts a vector cell into an element of type `ty` (a scalar or an alias of one).
fn element_from(ty: &TypeRef, v: &str, types: &TypeTable) -> String {
    match ty {
        TypeRef::Basic(kind) => cell_from(*kind, v),
        TypeRef::Error => format!("rt::convert::error_from_message({v})"),
        TypeRef::Named(name) => match underlying(name, types) {
            Some(inner) => format!("<{name}>::from({})", element_from(inner, v, types)),
            None => v.to_string(),
        },
        _ => v.to_string(),
    }
}

/// Converts an element of type `ty` into the cell its R vector stores.
fn element_to(ty: &TypeRef, v: &str, types: &TypeTable) -> String {
    match ty {
        TypeRef::Basic(kind) => cell_to(*kind, v),
        TypeRef::Error => format!("rt::convert::error_message(&{v})"),
        TypeRef::Named(name) => match underlying(name, types) {
            Some(inner) => element_to(
                inner,
                &format!("<{}>::from({v})", rust_type(inner)),
                types,
            ),
            None => v.to_string(),
        },
        _ => v.to_string(),
    }
}

/// Map key from the `String` R stores in `names`.
fn from_string(key: &TypeRef, k: &str, types: &TypeTable) -> String {
    match key {
        TypeRef::Named(name) => match underlying(name, types) {
            Some(inner) => format!("<{name}>::from({})", from_string(inner, k, types)),
            None => k.to_string(),
        },
        _ => k.to_string(),
    }
}

/// Map key as the `String` written into `names`.
fn to_string(key: &TypeRef, k: &str, types: &TypeTable) -> String {
    match key {
        TypeRef::Named(name) => match underlying(name, types) {
            Some(inner) => to_string(inner, &format!("<{}>::from({k})", rust_type(inner)), types),
            None => k.to_string(),
        },
        _ => k.to_string(),
    }
}
