//! The runtime as the generated module sees it: everything from
//! `rbind_runtime`, with `LibR` backed by a per-thread [`MockHeap`].

use std::ffi::c_void;

pub use rbind_runtime::*;

thread_local! {
    static HEAP: MockHeap = MockHeap::new();
}

/// Runs `f` against the heap this thread's entry points allocate on.
pub fn with_heap<R>(f: impl FnOnce(&MockHeap) -> R) -> R {
    HEAP.with(f)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct LibR;

impl RApi for LibR {
    fn nil(&self) -> Sexp {
        with_heap(|heap| heap.nil())
    }

    fn kind(&self, value: Sexp) -> SexpType {
        with_heap(|heap| heap.kind(value))
    }

    fn length(&self, value: Sexp) -> usize {
        with_heap(|heap| heap.length(value))
    }

    fn alloc_vector(&self, kind: SexpType, len: usize) -> Sexp {
        with_heap(|heap| heap.alloc_vector(kind, len))
    }

    fn protect(&self, value: Sexp) -> Sexp {
        with_heap(|heap| heap.protect(value))
    }

    fn unprotect(&self, count: usize) {
        with_heap(|heap| heap.unprotect(count));
    }

    fn data_ptr(&self, value: Sexp) -> *mut c_void {
        with_heap(|heap| heap.data_ptr(value))
    }

    fn string_elt(&self, value: Sexp, idx: usize) -> Result<Option<String>, BridgeError> {
        with_heap(|heap| heap.string_elt(value, idx))
    }

    fn set_string_elt(&self, value: Sexp, idx: usize, text: Option<&str>) {
        with_heap(|heap| heap.set_string_elt(value, idx, text));
    }

    fn vector_elt(&self, value: Sexp, idx: usize) -> Sexp {
        with_heap(|heap| heap.vector_elt(value, idx))
    }

    fn set_vector_elt(&self, value: Sexp, idx: usize, elt: Sexp) {
        with_heap(|heap| heap.set_vector_elt(value, idx, elt));
    }

    fn names(&self, value: Sexp) -> Sexp {
        with_heap(|heap| heap.names(value))
    }

    fn set_names(&self, value: Sexp, names: Sexp) {
        with_heap(|heap| heap.set_names(value, names));
    }

    fn set_class(&self, value: Sexp, class: Sexp) {
        with_heap(|heap| heap.set_class(value, class));
    }
}
