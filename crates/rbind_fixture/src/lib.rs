//! Generated bridge compiled against the mock heap.
//!
//! `build.rs` runs the generator over `bridge.yaml`. The native source becomes
//! [`bridge`], whose runtime path is [`shim`], so its `wrapped_*` entry points
//! can be called directly from tests with handles allocated on
//! [`shim::with_heap`].

pub mod api;
pub mod geom;
pub mod list;
pub mod shim;

include!(concat!(env!("OUT_DIR"), "/bridge_mod.rs"));

/// R wrappers generated alongside [`bridge`].
pub const FOREIGN: &str = include_str!(concat!(env!("OUT_DIR"), "/bridge.R"));
