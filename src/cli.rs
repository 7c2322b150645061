use std::fs;
use std::ops::Range;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use rbind_codegen::{GenError, GenerationContext, generate};
use rbind_ffi::{BridgeSpec, QualifiedName, SnakeCaseNaming, SourceFormat, parse_bridge_spec};
use rbind_utils::errors::{Diagnostic, emit_diagnostic, emit_diagnostics};
use rbind_utils::{find_best_match, logger};
use tracing::{debug, info};

/// Error message of a run whose diagnostics were already printed.
pub const GENERATION_FAILED: &str = "generation failed";

#[derive(Parser, Debug)]
#[command(name = "rbind", version, about = "Rust/R bridge generator")]
pub struct RbindCli {
    #[arg(long, short, global = true)]
    /// Log each generation step.
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl RbindCli {
    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generates the native entry points and R wrappers for a bridge file.
    Generate {
        bridge: PathBuf,
        /// Where to write the Rust source [default: <bridge>_bridge.rs].
        #[arg(long)]
        native_out: Option<PathBuf>,
        /// Where to write the R source [default: <bridge>.R].
        #[arg(long)]
        foreign_out: Option<PathBuf>,
        /// Overrides the package named in the bridge file.
        #[arg(long)]
        package: Option<String>,
    },
    /// Prints every type in the closure with its identity and strategy.
    Plan { bridge: PathBuf },
}

pub fn run() -> Result<()> {
    run_with(&RbindCli::parse())
}

pub fn run_with(cli: &RbindCli) -> Result<()> {
    logger::init_logging(cli.verbose);
    match &cli.command {
        Command::Generate {
            bridge,
            native_out,
            foreign_out,
            package,
        } => handle_generate(
            bridge,
            native_out.clone(),
            foreign_out.clone(),
            package.as_deref(),
        ),
        Command::Plan { bridge } => handle_plan(bridge),
    }
}

fn handle_generate(
    bridge: &Path,
    native_out: Option<PathBuf>,
    foreign_out: Option<PathBuf>,
    package: Option<&str>,
) -> Result<()> {
    let (source, mut spec) = load(bridge)?;
    if let Some(package) = package {
        debug!(from = %spec.package, to = %package, "overriding package");
        spec.package = package.to_string();
    }

    let artifacts = match generate(&spec) {
        Ok(artifacts) => artifacts,
        Err(err) => {
            report_generation_error(bridge, &source, &spec, &err);
            bail!(GENERATION_FAILED);
        }
    };

    warn_unused_types(bridge, &source, &artifacts.unused_types);

    let native_path = native_out.unwrap_or_else(|| sibling(bridge, "_bridge", "rs"));
    let foreign_path = foreign_out.unwrap_or_else(|| sibling(bridge, "", "R"));
    write_artifact(&native_path, &artifacts.native)?;
    write_artifact(&foreign_path, &artifacts.foreign)?;

    info!(fingerprint = %artifacts.fingerprint, "wrote bridge artifacts");
    println!("{} {}", "generated".green().bold(), native_path.display());
    println!("{} {}", "generated".green().bold(), foreign_path.display());
    Ok(())
}

fn handle_plan(bridge: &Path) -> Result<()> {
    let (source, spec) = load(bridge)?;
    let ctx = match GenerationContext::build(&spec, &SnakeCaseNaming) {
        Ok(ctx) => ctx,
        Err(err) => {
            report_generation_error(bridge, &source, &spec, &err);
            bail!(GENERATION_FAILED);
        }
    };

    println!("{}", "== Types ==".bold());
    let width = ctx.plans.iter().map(|plan| plan.id.len()).max().unwrap_or_default();
    for plan in ctx.plans.iter() {
        println!(
            "{:<width$}  {:<14}  {}",
            plan.id,
            plan.kind.strategy().cyan(),
            plan.ty
        );
    }

    println!("{}", "== Functions ==".bold());
    for (signature, symbol) in ctx.signatures() {
        println!(
            "{} -> {} ({} argument{})",
            symbol.entry_symbol,
            symbol.wrapper_name.green(),
            symbol.arity,
            if signature.arity() == 1 { "" } else { "s" }
        );
    }
    println!("{} {}", "fingerprint".bold(), ctx.fingerprint);
    Ok(())
}

fn load(bridge: &Path) -> Result<(String, BridgeSpec)> {
    let source = fs::read_to_string(bridge)
        .with_context(|| format!("failed to read {}", bridge.display()))?;
    let spec = parse_bridge_spec(&source, SourceFormat::from_path(bridge))
        .with_context(|| format!("failed to load bridge file {}", bridge.display()))?;
    debug!(
        package = %spec.package,
        functions = spec.functions.len(),
        types = spec.types.len(),
        "loaded bridge file"
    );
    Ok((source, spec))
}

fn write_artifact(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// `<dir>/<stem><suffix>.<extension>` next to `bridge`.
fn sibling(bridge: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = bridge
        .file_stem()
        .map_or_else(|| "bridge".into(), |stem| stem.to_string_lossy());
    bridge.with_file_name(format!("{stem}{suffix}.{extension}"))
}

fn report_generation_error(bridge: &Path, source: &str, spec: &BridgeSpec, err: &GenError) {
    let source_id = bridge.display().to_string();
    let span = err
        .function()
        .and_then(|function| entry_span(source, function))
        .unwrap_or(0..0);
    let mut diagnostic = Diagnostic::error(source_id, span, err.to_string());
    if let Some(location) = err.location() {
        diagnostic = diagnostic.with_label(format!("in {location}"));
    }
    if let GenError::UnknownType { name, .. } = err {
        let declared = spec.types.iter().map(|decl| decl.name.to_string());
        if let Some(candidate) = find_best_match(name, declared) {
            diagnostic = diagnostic.with_help(format!("did you mean `{candidate}`?"));
        }
    }
    emit_diagnostic(&diagnostic, source);
}

fn warn_unused_types(bridge: &Path, source: &str, unused: &[QualifiedName]) {
    let source_id = bridge.display().to_string();
    let warnings: Vec<Diagnostic> = unused
        .iter()
        .map(|name| {
            let span = entry_span(source, name.as_str()).unwrap_or(0..0);
            Diagnostic::warning(source_id.clone(), span, format!("type `{name}` is never used"))
                .with_label("no bridged function reaches this type")
        })
        .collect();
    emit_diagnostics(&warnings, source);
}

/// Byte range of the `name` entry declaring `item`, or its first whole-word mention.
fn entry_span(source: &str, item: &str) -> Option<Range<usize>> {
    let is_word = |ch: char| ch == '_' || ch == ':' || ch.is_ascii_alphanumeric();
    let mut fallback = None;
    for (start, _) in source.match_indices(item) {
        let end = start + item.len();
        let bounded = !source[..start].chars().next_back().is_some_and(is_word)
            && !source[end..].chars().next().is_some_and(is_word);
        if !bounded {
            continue;
        }
        let line_start = source[..start].rfind('\n').map_or(0, |idx| idx + 1);
        if source[line_start..start].contains("name") {
            return Some(start..end);
        }
        fallback.get_or_insert(start..end);
    }
    fallback
}
