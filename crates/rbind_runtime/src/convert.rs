//! Conversions between R objects and Rust values used by generated routines.
//!
//! Readers check the R type (and length, for scalars) before touching any
//! buffer; writers allocate through a [`ProtectScope`] so a value is never
//! left unprotected across a second allocation.

use std::error::Error;
use std::ptr;
use std::slice;

use tracing::debug;

use crate::api::RApi;
use crate::error::BridgeError;
use crate::protect::ProtectScope;
use crate::sexp::{Complex128, ForeignError, NA_INTEGER, NA_LOGICAL, NativeError, Sexp, SexpType};

pub type Result<T> = std::result::Result<T, BridgeError>;

/// Class attached to conditions returned by a failed bridged call.
pub const ERROR_CLASS: &str = "rbind_error";

const CONDITION_CLASSES: [&str; 3] = [ERROR_CLASS, "error", "condition"];

pub fn expect_kind<A: RApi + ?Sized>(
    api: &A,
    value: Sexp,
    kind: SexpType,
    expected: &'static str,
) -> Result<()> {
    let found = api.kind(value);
    if found == kind {
        Ok(())
    } else {
        Err(BridgeError::TypeMismatch { expected, found })
    }
}

pub fn expect_length<A: RApi + ?Sized>(api: &A, value: Sexp, expected: usize) -> Result<()> {
    let found = api.length(value);
    if found == expected {
        Ok(())
    } else {
        Err(BridgeError::LengthMismatch { expected, found })
    }
}

fn view<'a, A: RApi + ?Sized, T>(
    api: &'a A,
    value: Sexp,
    kind: SexpType,
    expected: &'static str,
) -> Result<&'a [T]> {
    expect_kind(api, value, kind, expected)?;
    let len = api.length(value);
    if len == 0 {
        return Ok(&[]);
    }
    let data = api.data_ptr(value).cast::<T>();
    // SAFETY: `value` is an atomic vector of `kind`, whose buffer holds `len`
    // contiguous cells laid out as `T`. The view borrows `api`, so it cannot
    // outlive the bridged call that received `value`.
    Ok(unsafe { slice::from_raw_parts(data, len) })
}

fn bulk<A: RApi + ?Sized, T: Copy>(api: &A, kind: SexpType, values: &[T]) -> Sexp {
    let mut scope = ProtectScope::new(api);
    let out = scope.protect(api.alloc_vector(kind, values.len()));
    if !values.is_empty() {
        // SAFETY: `out` was just allocated with room for `values.len()` cells of `T`.
        unsafe {
            ptr::copy_nonoverlapping(values.as_ptr(), api.data_ptr(out).cast::<T>(), values.len());
        }
    }
    out
}

fn collect<A, T, I>(api: &A, kind: SexpType, values: I) -> Sexp
where
    A: RApi + ?Sized,
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
{
    let values = values.into_iter();
    let len = values.len();
    let mut scope = ProtectScope::new(api);
    let out = scope.protect(api.alloc_vector(kind, len));
    if len > 0 {
        let data = api.data_ptr(out).cast::<T>();
        for (idx, value) in values.take(len).enumerate() {
            // SAFETY: `out` has `len` cells of `T`; the buffer is uninitialised,
            // so cells are written in place without forming a reference.
            unsafe { data.add(idx).write(value) };
        }
    }
    out
}

fn scalar<A: RApi + ?Sized, T: Copy>(
    api: &A,
    value: Sexp,
    kind: SexpType,
    expected: &'static str,
) -> Result<T> {
    match view::<A, T>(api, value, kind, expected)? {
        [cell] => Ok(*cell),
        cells => Err(BridgeError::LengthMismatch {
            expected: 1,
            found: cells.len(),
        }),
    }
}

macro_rules! atomic_conversions {
    ($ty:ty, $kind:expr, $what:literal, $view:ident, $vector:ident, $from_iter:ident) => {
        #[doc = concat!("Borrows the cells of ", $what, " for the duration of the call.")]
        pub fn $view<'a, A: RApi + ?Sized>(api: &'a A, value: Sexp) -> Result<&'a [$ty]> {
            view(api, value, $kind, $what)
        }

        #[doc = concat!("Copies `values` into a new ", $what, " in one pass.")]
        pub fn $vector<A: RApi + ?Sized>(api: &A, values: &[$ty]) -> Sexp {
            bulk(api, $kind, values)
        }

        pub fn $from_iter<A, I>(api: &A, values: I) -> Sexp
        where
            A: RApi + ?Sized,
            I: IntoIterator<Item = $ty>,
            I::IntoIter: ExactSizeIterator,
        {
            collect(api, $kind, values)
        }
    };
}

/// Borrows the cells of an integer vector. `NA_integer_` has no Rust counterpart and is rejected.
pub fn integer_view<'a, A: RApi + ?Sized>(api: &'a A, value: Sexp) -> Result<&'a [i32]> {
    let cells = view(api, value, SexpType::Integer, "an integer vector")?;
    if cells.contains(&NA_INTEGER) {
        return Err(BridgeError::NaValue("integer value"));
    }
    Ok(cells)
}

/// Copies `values` into a new integer vector in one pass.
pub fn integer_vector<A: RApi + ?Sized>(api: &A, values: &[i32]) -> Sexp {
    bulk(api, SexpType::Integer, values)
}

pub fn integer_from_iter<A, I>(api: &A, values: I) -> Sexp
where
    A: RApi + ?Sized,
    I: IntoIterator<Item = i32>,
    I::IntoIter: ExactSizeIterator,
{
    collect(api, SexpType::Integer, values)
}

atomic_conversions!(f64, SexpType::Real, "a double vector", real_view, real_vector, real_from_iter);
atomic_conversions!(
    Complex128,
    SexpType::Complex,
    "a complex vector",
    complex_view,
    complex_vector,
    complex_from_iter
);
atomic_conversions!(u8, SexpType::Raw, "a raw vector", raw_view, raw_vector, raw_from_iter);

/// Raw logical cells; use [`logical_to_bool`] on each.
pub fn logical_view<'a, A: RApi + ?Sized>(api: &'a A, value: Sexp) -> Result<&'a [i32]> {
    view(api, value, SexpType::Logical, "a logical vector")
}

pub fn logical_from_iter<A, I>(api: &A, values: I) -> Sexp
where
    A: RApi + ?Sized,
    I: IntoIterator<Item = bool>,
    I::IntoIter: ExactSizeIterator,
{
    collect(api, SexpType::Logical, values.into_iter().map(i32::from))
}

pub fn logical_to_bool(cell: i32) -> Result<bool> {
    match cell {
        NA_LOGICAL => Err(BridgeError::NaValue("logical value")),
        0 => Ok(false),
        _ => Ok(true),
    }
}

pub fn logical_scalar<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<bool> {
    logical_to_bool(scalar(api, value, SexpType::Logical, "a logical value")?)
}

pub fn integer_scalar<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<i32> {
    match scalar::<A, i32>(api, value, SexpType::Integer, "an integer value")? {
        NA_INTEGER => Err(BridgeError::NaValue("integer value")),
        cell => Ok(cell),
    }
}

pub fn real_scalar<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<f64> {
    scalar(api, value, SexpType::Real, "a double value")
}

pub fn complex_scalar<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<Complex128> {
    scalar(api, value, SexpType::Complex, "a complex value")
}

pub fn string_scalar<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<String> {
    expect_kind(api, value, SexpType::Character, "a character value")?;
    expect_length(api, value, 1)?;
    api.string_elt(value, 0)?
        .ok_or(BridgeError::NaValue("character value"))
}

/// `NULL` and `NA_character_` both read as `None`.
pub fn optional_string_scalar<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<Option<String>> {
    if api.is_null(value) {
        return Ok(None);
    }
    expect_kind(api, value, SexpType::Character, "a character value or NULL")?;
    expect_length(api, value, 1)?;
    api.string_elt(value, 0)
}

pub fn logical_value<A: RApi + ?Sized>(api: &A, value: bool) -> Sexp {
    logical_from_iter(api, [value])
}

pub fn integer_value<A: RApi + ?Sized>(api: &A, value: i32) -> Sexp {
    integer_vector(api, &[value])
}

pub fn real_value<A: RApi + ?Sized>(api: &A, value: f64) -> Sexp {
    real_vector(api, &[value])
}

pub fn complex_value<A: RApi + ?Sized>(api: &A, value: Complex128) -> Sexp {
    complex_vector(api, &[value])
}

pub fn string_value<A: RApi + ?Sized>(api: &A, value: &str) -> Result<Sexp> {
    character_from_iter(api, [Some(value)])
}

/// Writes one string cell, rejecting text R cannot hold.
pub fn set_string<A: RApi + ?Sized>(
    api: &A,
    value: Sexp,
    idx: usize,
    text: Option<&str>,
) -> Result<()> {
    if let Some(text) = text.filter(|text| text.contains('\0')) {
        return Err(BridgeError::InvalidString(text.to_string()));
    }
    api.set_string_elt(value, idx, text);
    Ok(())
}

pub fn character_elements<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<Vec<Option<String>>> {
    expect_kind(api, value, SexpType::Character, "a character vector")?;
    (0..api.length(value))
        .map(|idx| api.string_elt(value, idx))
        .collect()
}

/// Decodes the bytes of a CHARSXP already translated to UTF-8.
pub fn text_from_utf8(bytes: &[u8]) -> Result<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(text.to_string()),
        Err(_) => Err(BridgeError::InvalidUtf8(String::from_utf8_lossy(bytes).into_owned())),
    }
}

/// Like [`character_elements`], with `NA` rejected.
pub fn string_elements<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<Vec<String>> {
    character_elements(api, value)?
        .into_iter()
        .map(|text| text.ok_or(BridgeError::NaValue("character value")))
        .collect()
}

pub fn character_from_iter<A, I, S>(api: &A, values: I) -> Result<Sexp>
where
    A: RApi + ?Sized,
    I: IntoIterator<Item = Option<S>>,
    I::IntoIter: ExactSizeIterator,
    S: AsRef<str>,
{
    let values = values.into_iter();
    let mut scope = ProtectScope::new(api);
    let out = scope.protect(api.alloc_vector(SexpType::Character, values.len()));
    for (idx, text) in values.enumerate() {
        set_string(api, out, idx, text.as_ref().map(AsRef::as_ref))?;
    }
    Ok(out)
}

/// Names of a vector or list. A non-empty value without names is an error.
pub fn names<A: RApi + ?Sized>(api: &A, value: Sexp, what: &'static str) -> Result<Vec<String>> {
    let names = api.names(value);
    if api.is_null(names) {
        return if api.length(value) == 0 {
            Ok(Vec::new())
        } else {
            Err(BridgeError::MissingNames(what))
        };
    }
    string_elements(api, names)
}

pub fn set_names<A, I, S>(api: &A, value: Sexp, names: I) -> Result<()>
where
    A: RApi + ?Sized,
    I: IntoIterator<Item = S>,
    I::IntoIter: ExactSizeIterator,
    S: AsRef<str>,
{
    let names = character_from_iter(api, names.into_iter().map(Some))?;
    api.set_names(value, names);
    Ok(())
}

/// Allocates a list with one slot per name, protected by `scope`.
pub fn named_list<A: RApi + ?Sized>(scope: &mut ProtectScope<'_, A>, names: &[&str]) -> Result<Sexp> {
    let api = scope.api();
    let list = scope.protect(api.alloc_vector(SexpType::List, names.len()));
    set_names(api, list, names.iter())?;
    Ok(list)
}

/// Name-indexed access to the elements of a list standing for a record.
pub struct RecordFields<'a, A: RApi + ?Sized> {
    api: &'a A,
    list: Sexp,
    record: &'static str,
    names: Vec<String>,
}

impl<'a, A: RApi + ?Sized> RecordFields<'a, A> {
    /// `fields` are the element names the record reads; others are ignored.
    pub fn new(api: &'a A, list: Sexp, record: &'static str, fields: &[&str]) -> Result<Self> {
        expect_kind(api, list, SexpType::List, "a list")?;
        let names = names(api, list, "list")?;
        let extra: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|name| !fields.contains(name))
            .collect();
        if !extra.is_empty() {
            debug!(record, ?extra, "ignoring list elements with no matching field");
        }
        Ok(Self {
            api,
            list,
            record,
            names,
        })
    }

    pub fn get(&self, field: &str) -> Result<Sexp> {
        self.names
            .iter()
            .position(|name| name == field)
            .map(|idx| self.api.vector_elt(self.list, idx))
            .ok_or_else(|| BridgeError::MissingField {
                record: self.record.to_string(),
                field: field.to_string(),
            })
    }
}

pub fn list_elements<A: RApi + ?Sized>(api: &A, value: Sexp) -> Result<Vec<Sexp>> {
    expect_kind(api, value, SexpType::List, "a list")?;
    Ok((0..api.length(value))
        .map(|idx| api.vector_elt(value, idx))
        .collect())
}

pub fn error_from_message(message: Option<String>) -> NativeError {
    message.map(|message| Box::new(ForeignError(message)) as Box<dyn Error + Send + Sync>)
}

pub fn error_message(error: &NativeError) -> Option<String> {
    error.as_ref().map(|error| error.to_string())
}

/// Builds `structure(list(message = msg, call = NULL), class = c("rbind_error", "error", "condition"))`.
pub fn error_condition<A: RApi + ?Sized>(api: &A, message: &str) -> Sexp {
    let message = message.replace('\0', "\\0");
    let mut scope = ProtectScope::new(api);

    let condition = scope.protect(api.alloc_vector(SexpType::List, 2));
    let names = scope.protect(api.alloc_vector(SexpType::Character, 2));
    api.set_string_elt(names, 0, Some("message"));
    api.set_string_elt(names, 1, Some("call"));
    api.set_names(condition, names);

    let text = scope.protect(api.alloc_vector(SexpType::Character, 1));
    api.set_string_elt(text, 0, Some(message.as_str()));
    api.set_vector_elt(condition, 0, text);
    api.set_vector_elt(condition, 1, api.nil());

    let class = scope.protect(api.alloc_vector(SexpType::Character, CONDITION_CLASSES.len()));
    for (idx, name) in CONDITION_CLASSES.iter().enumerate() {
        api.set_string_elt(class, idx, Some(*name));
    }
    api.set_class(condition, class);

    condition
}
