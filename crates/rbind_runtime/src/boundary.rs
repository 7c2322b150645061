use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use tracing::debug;

use crate::api::RApi;
use crate::convert::error_condition;
use crate::error::BridgeError;
use crate::sexp::Sexp;

/// Runs one bridged call and turns any failure into an R condition.
///
/// Every generated entry point funnels through here: an `Err` or a panic in
/// `body` never crosses into R. Protections taken inside `body` are released
/// by their scopes before the condition is built.
pub fn call_boundary<A, F>(api: &A, function: &str, body: F) -> Sexp
where
    A: RApi + ?Sized,
    F: FnOnce(&A) -> Result<Sexp, BridgeError>,
{
    let failure = match panic::catch_unwind(AssertUnwindSafe(|| body(api))) {
        Ok(Ok(value)) => return value,
        Ok(Err(err)) => err,
        Err(payload) => BridgeError::Panic(panic_message(payload.as_ref())),
    };
    debug!(function, error = %failure, "bridged call failed");
    error_condition(api, &format!("{function}: {failure}"))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{ERROR_CLASS, integer_value};
    use crate::mock::{MockHeap, MockValue};
    use crate::protect::ProtectScope;
    use crate::sexp::SexpType;

    fn message_of(heap: &MockHeap, condition: Sexp) -> Option<String> {
        heap.strings(heap.vector_elt(condition, 0)).pop().flatten()
    }

    #[test]
    fn success_passes_value_through() {
        let heap = MockHeap::new();
        let out = call_boundary(&heap, "f", |api| Ok(integer_value(api, 3)));
        assert_eq!(heap.value(out), MockValue::Integer(vec![3]));
    }

    #[test]
    fn errors_become_conditions() {
        let heap = MockHeap::new();
        let out = call_boundary(&heap, "f", |api| {
            let mut scope = ProtectScope::new(api);
            scope.protect(api.alloc_vector(SexpType::List, 2));
            Err(BridgeError::NaValue("logical value"))
        });
        assert_eq!(heap.protect_depth(), 0);
        assert_eq!(
            heap.strings(heap.class_of(out)).first().cloned().flatten().as_deref(),
            Some(ERROR_CLASS)
        );
        assert_eq!(
            message_of(&heap, out).as_deref(),
            Some("f: NA is not a valid logical value")
        );
    }

    #[test]
    fn panics_are_caught_and_protections_released() {
        let heap = MockHeap::new();
        let out = call_boundary(&heap, "g", |api| {
            let mut scope = ProtectScope::new(api);
            scope.protect(api.alloc_vector(SexpType::Real, 1));
            if scope.len() == 1 {
                panic!("index out of range");
            }
            Ok(api.nil())
        });
        assert_eq!(heap.protect_depth(), 0);
        assert_eq!(
            message_of(&heap, out).as_deref(),
            Some("g: panic: index out of range")
        );
    }
}
