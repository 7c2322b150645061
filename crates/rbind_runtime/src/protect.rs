use crate::api::RApi;
use crate::sexp::Sexp;

/// Scoped owner of R protections.
///
/// Each [`ProtectScope::protect`] pushes one entry on R's protection stack;
/// dropping the scope pops exactly that many, on every exit path.
pub struct ProtectScope<'a, A: RApi + ?Sized> {
    api: &'a A,
    count: usize,
}

impl<'a, A: RApi + ?Sized> ProtectScope<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api, count: 0 }
    }

    pub fn protect(&mut self, value: Sexp) -> Sexp {
        self.api.protect(value);
        self.count += 1;
        value
    }

    pub fn api(&self) -> &'a A {
        self.api
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl<A: RApi + ?Sized> Drop for ProtectScope<'_, A> {
    fn drop(&mut self) {
        if self.count > 0 {
            self.api.unprotect(self.count);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockHeap;
    use crate::sexp::SexpType;

    #[test]
    fn scope_releases_on_drop() {
        let heap = MockHeap::new();
        {
            let mut scope = ProtectScope::new(&heap);
            scope.protect(heap.alloc_vector(SexpType::Integer, 3));
            scope.protect(heap.alloc_vector(SexpType::Real, 1));
            assert_eq!(scope.len(), 2);
            assert_eq!(heap.protect_depth(), 2);
        }
        assert_eq!(heap.protect_depth(), 0);
    }

    #[test]
    fn nested_scopes_unwind_in_order() {
        let heap = MockHeap::new();
        let mut outer = ProtectScope::new(&heap);
        outer.protect(heap.alloc_vector(SexpType::List, 1));
        {
            let mut inner = ProtectScope::new(&heap);
            inner.protect(heap.alloc_vector(SexpType::Raw, 4));
            assert_eq!(heap.protect_depth(), 2);
        }
        assert_eq!(heap.protect_depth(), 1);
        drop(outer);
        assert_eq!(heap.protect_depth(), 0);
    }

    #[test]
    fn empty_scope_does_not_touch_the_stack() {
        let heap = MockHeap::new();
        let scope = ProtectScope::new(&heap);
        assert!(scope.is_empty());
        drop(scope);
        assert_eq!(heap.unprotect_calls(), 0);
    }
}
