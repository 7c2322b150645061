//! Binding of [`RApi`] to the R shared library the package is loaded into.

use std::ffi::{CStr, c_char, c_int, c_uint, c_void};

use crate::api::RApi;
use crate::convert::text_from_utf8;
use crate::error::BridgeError;
use crate::sexp::{Sexp, SexpType};

type RXlen = isize;

const CE_UTF8: c_int = 1;

unsafe extern "C" {
    static R_NilValue: Sexp;
    static R_NaString: Sexp;
    static R_NamesSymbol: Sexp;
    static R_ClassSymbol: Sexp;

    fn TYPEOF(x: Sexp) -> c_int;
    fn Rf_xlength(x: Sexp) -> RXlen;
    fn Rf_allocVector(kind: c_uint, len: RXlen) -> Sexp;
    fn Rf_protect(x: Sexp) -> Sexp;
    fn Rf_unprotect(count: c_int);

    fn LOGICAL(x: Sexp) -> *mut c_int;
    fn INTEGER(x: Sexp) -> *mut c_int;
    fn REAL(x: Sexp) -> *mut f64;
    fn COMPLEX(x: Sexp) -> *mut c_void;
    fn RAW(x: Sexp) -> *mut u8;

    fn STRING_ELT(x: Sexp, idx: RXlen) -> Sexp;
    fn SET_STRING_ELT(x: Sexp, idx: RXlen, value: Sexp);
    fn VECTOR_ELT(x: Sexp, idx: RXlen) -> Sexp;
    fn SET_VECTOR_ELT(x: Sexp, idx: RXlen, value: Sexp) -> Sexp;
    fn Rf_translateCharUTF8(x: Sexp) -> *const c_char;
    fn Rf_mkCharLenCE(text: *const c_char, len: c_int, encoding: c_int) -> Sexp;

    fn Rf_getAttrib(x: Sexp, name: Sexp) -> Sexp;
    fn Rf_setAttrib(x: Sexp, name: Sexp, value: Sexp) -> Sexp;
}

/// The live R session. Only valid on R's main thread, inside a `.Call`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LibR;

fn xlen(idx: usize) -> RXlen {
    RXlen::try_from(idx).unwrap_or(RXlen::MAX)
}

impl RApi for LibR {
    fn nil(&self) -> Sexp {
        // SAFETY: R initialises `R_NilValue` before any package code runs.
        unsafe { R_NilValue }
    }

    fn kind(&self, value: Sexp) -> SexpType {
        // SAFETY: `value` is a live SEXP handed to us by R.
        let code = unsafe { TYPEOF(value) };
        SexpType::from_code(c_uint::try_from(code).unwrap_or(c_uint::MAX))
    }

    fn length(&self, value: Sexp) -> usize {
        // SAFETY: as above.
        usize::try_from(unsafe { Rf_xlength(value) }).unwrap_or(0)
    }

    fn alloc_vector(&self, kind: SexpType, len: usize) -> Sexp {
        // SAFETY: allocation failure long-jumps out of R, it never returns null.
        unsafe { Rf_allocVector(kind.code(), xlen(len)) }
    }

    fn protect(&self, value: Sexp) -> Sexp {
        // SAFETY: the matching unprotect is issued by the owning `ProtectScope`.
        unsafe { Rf_protect(value) }
    }

    fn unprotect(&self, count: usize) {
        let count = c_int::try_from(count).unwrap_or(c_int::MAX);
        // SAFETY: `count` never exceeds what the calling scope protected.
        unsafe { Rf_unprotect(count) }
    }

    fn data_ptr(&self, value: Sexp) -> *mut c_void {
        // SAFETY: each accessor is only reached for its own vector type.
        unsafe {
            match self.kind(value) {
                SexpType::Logical => LOGICAL(value).cast(),
                SexpType::Integer => INTEGER(value).cast(),
                SexpType::Real => REAL(value).cast(),
                SexpType::Complex => COMPLEX(value),
                SexpType::Raw => RAW(value).cast(),
                _ => std::ptr::null_mut(),
            }
        }
    }

    fn string_elt(&self, value: Sexp, idx: usize) -> Result<Option<String>, BridgeError> {
        // SAFETY: `value` is a character vector longer than `idx`. The
        // translated buffer is NUL terminated and lives until the call returns.
        let bytes = unsafe {
            let cell = STRING_ELT(value, xlen(idx));
            if cell == R_NaString {
                return Ok(None);
            }
            CStr::from_ptr(Rf_translateCharUTF8(cell)).to_bytes()
        };
        text_from_utf8(bytes).map(Some)
    }

    fn set_string_elt(&self, value: Sexp, idx: usize, text: Option<&str>) {
        // SAFETY: `value` is a protected character vector longer than `idx`.
        unsafe {
            let cell = match text {
                Some(text) => {
                    let len = c_int::try_from(text.len()).unwrap_or(c_int::MAX);
                    Rf_mkCharLenCE(text.as_ptr().cast(), len, CE_UTF8)
                }
                None => R_NaString,
            };
            SET_STRING_ELT(value, xlen(idx), cell);
        }
    }

    fn vector_elt(&self, value: Sexp, idx: usize) -> Sexp {
        // SAFETY: `value` is a list longer than `idx`.
        unsafe { VECTOR_ELT(value, xlen(idx)) }
    }

    fn set_vector_elt(&self, value: Sexp, idx: usize, elt: Sexp) {
        // SAFETY: `value` is a protected list longer than `idx`.
        unsafe {
            SET_VECTOR_ELT(value, xlen(idx), elt);
        }
    }

    fn names(&self, value: Sexp) -> Sexp {
        // SAFETY: attribute reads never allocate for `names` on vectors.
        unsafe { Rf_getAttrib(value, R_NamesSymbol) }
    }

    fn set_names(&self, value: Sexp, names: Sexp) {
        // SAFETY: both handles are live; `value` is protected by the caller.
        unsafe {
            Rf_setAttrib(value, R_NamesSymbol, names);
        }
    }

    fn set_class(&self, value: Sexp, class: Sexp) {
        // SAFETY: as for `set_names`.
        unsafe {
            Rf_setAttrib(value, R_ClassSymbol, class);
        }
    }
}
