use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use rbind_codegen::generate;
use rbind_ffi::load_bridge_spec;

fn main() -> Result<()> {
    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR")?);
    let bridge = manifest_dir.join("bridge.yaml");
    println!("cargo:rerun-if-changed={}", bridge.display());

    let spec = load_bridge_spec(&bridge)?;
    let artifacts =
        generate(&spec).with_context(|| format!("failed to generate {}", bridge.display()))?;

    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    let native = out_dir.join("bridge.rs");
    fs::write(&native, &artifacts.native)?;
    fs::write(out_dir.join("bridge.R"), &artifacts.foreign)?;
    // `#[path]` only takes a literal, so the module declaration is generated too.
    fs::write(
        out_dir.join("bridge_mod.rs"),
        format!("#[path = {:?}]\npub mod bridge;\n", native.display().to_string()),
    )?;
    Ok(())
}
