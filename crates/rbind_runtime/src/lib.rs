//! Support library linked into generated bridge code.
//!
//! Generated entry points receive [`Sexp`] handles from R, decode them with
//! the helpers in [`convert`], and hand results back through
//! [`call_boundary`]. All R access goes through the [`RApi`] trait so the
//! same routines run against [`LibR`] in a package and [`MockHeap`] in tests.

pub mod api;
pub mod boundary;
pub mod convert;
pub mod error;
#[cfg(feature = "libr")]
pub mod libr;
pub mod mock;
pub mod protect;
pub mod sexp;

pub use api::RApi;
pub use boundary::call_boundary;
pub use convert::{ERROR_CLASS, RecordFields};
pub use error::BridgeError;
#[cfg(feature = "libr")]
pub use libr::LibR;
pub use mock::{MockHeap, MockValue};
pub use protect::ProtectScope;
pub use sexp::{
    Complex64, Complex128, ForeignError, NA_INTEGER, NA_LOGICAL, NativeError, Sexp, SexpType,
};
