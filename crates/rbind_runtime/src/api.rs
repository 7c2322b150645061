use std::ffi::c_void;

use crate::error::BridgeError;
use crate::sexp::{Sexp, SexpType};

/// The slice of the R C API that marshaling code needs.
///
/// Implemented by [`crate::LibR`] against the embedding R session and by
/// [`crate::MockHeap`] for tests. Every method must be called from the R
/// main thread; none of them are reentrant across threads.
pub trait RApi {
    fn nil(&self) -> Sexp;

    fn is_null(&self, value: Sexp) -> bool {
        self.kind(value) == SexpType::Nil
    }

    fn kind(&self, value: Sexp) -> SexpType;

    fn length(&self, value: Sexp) -> usize;

    /// Freshly allocated values are unprotected; callers must route them
    /// through a [`crate::ProtectScope`] before the next allocation.
    fn alloc_vector(&self, kind: SexpType, len: usize) -> Sexp;

    fn protect(&self, value: Sexp) -> Sexp;

    fn unprotect(&self, count: usize);

    /// Start of the element buffer of an atomic vector
    /// (logical, integer, double, complex or raw).
    fn data_ptr(&self, value: Sexp) -> *mut c_void;

    /// `None` stands for `NA_character_`. Text that cannot be read as UTF-8
    /// is an error, never a lossy replacement.
    fn string_elt(&self, value: Sexp, idx: usize) -> Result<Option<String>, BridgeError>;

    /// Writes `None` as `NA_character_`. `text` must not contain NUL bytes.
    fn set_string_elt(&self, value: Sexp, idx: usize, text: Option<&str>);

    fn vector_elt(&self, value: Sexp, idx: usize) -> Sexp;

    fn set_vector_elt(&self, value: Sexp, idx: usize, elt: Sexp);

    /// The `names` attribute, or `nil()` when absent.
    fn names(&self, value: Sexp) -> Sexp;

    fn set_names(&self, value: Sexp, names: Sexp);

    fn set_class(&self, value: Sexp, class: Sexp);
}
