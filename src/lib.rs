//! Command-line front end for the rbind generator.
//!
//! The generator itself lives in `rbind_codegen`; this crate loads bridge
//! files, writes artifacts and reports failures as source diagnostics.

pub mod cli;
