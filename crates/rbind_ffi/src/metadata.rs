use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use tracing::debug;

use super::types::{
    BasicKind, BridgeSpec, DEFAULT_RUNTIME, Field, Param, QualifiedName, Signature, TypeRef,
    TypeTable, is_identifier,
};

#[derive(Clone, Debug, Deserialize)]
struct RawBridge {
    /// R package name used for `PACKAGE =` and `@useDynLib`.
    package: String,
    /// Rust path holding the bridged functions (e.g. "floats" or "floats::api").
    #[serde(rename = "crate")]
    crate_path: String,
    /// Optional override for the runtime crate path in generated code.
    #[serde(default)]
    runtime: Option<String>,
    #[serde(default)]
    types: Vec<TypeEntry>,
    #[serde(default)]
    functions: Vec<FunctionEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct TypeEntry {
    name: String,
    /// Underlying type for alias declarations.
    #[serde(default, rename = "type")]
    ty: Option<String>,
    /// Field list for record declarations.
    #[serde(default, rename = "struct")]
    fields: Option<Vec<FieldEntry>>,
}

#[derive(Clone, Debug, Deserialize)]
struct FieldEntry {
    name: String,
    #[serde(rename = "type")]
    ty: String,
    /// Name the field is addressed by on the R side.
    #[serde(default)]
    rename: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct FunctionEntry {
    name: String,
    #[serde(default)]
    doc: Option<String>,
    #[serde(default)]
    params: Vec<ParamEntry>,
    #[serde(default)]
    results: Vec<ParamEntry>,
    #[serde(default)]
    variadic: bool,
}

#[derive(Clone, Debug, Deserialize)]
struct ParamEntry {
    #[serde(default)]
    name: Option<String>,
    #[serde(rename = "type")]
    ty: String,
}

/// Input encodings accepted for bridge files.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceFormat {
    Yaml,
    Json,
}

impl SourceFormat {
    /// JSON for `.json` files, YAML otherwise.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Load a bridge description from disk.
pub fn load_bridge_spec(path: &Path) -> Result<BridgeSpec> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read bridge file {}", path.display()))?;
    parse_bridge_spec(&raw, SourceFormat::from_path(path))
        .with_context(|| format!("failed to load bridge file {}", path.display()))
}

pub fn parse_bridge_spec(source: &str, format: SourceFormat) -> Result<BridgeSpec> {
    let parsed: RawBridge = match format {
        SourceFormat::Yaml => {
            serde_yaml::from_str(source).context("failed to parse bridge YAML")?
        }
        SourceFormat::Json => {
            serde_json::from_str(source).context("failed to parse bridge JSON")?
        }
    };
    BridgeSpec::from_raw(parsed)
}

impl BridgeSpec {
    fn from_raw(raw: RawBridge) -> Result<Self> {
        if !is_identifier(&raw.package.replace('.', "_")) {
            bail!("package name `{}` is not a valid R package name", raw.package);
        }

        let mut types = TypeTable::new();
        for entry in raw.types {
            let name = QualifiedName::new(entry.name.trim());
            let underlying = entry
                .try_into_type()
                .with_context(|| format!("invalid declaration for type `{name}`"))?;
            if types.declare(name.clone(), underlying).is_some() {
                bail!("type `{name}` is declared more than once");
            }
        }

        let functions = raw
            .functions
            .into_iter()
            .map(FunctionEntry::try_into_signature)
            .collect::<Result<Vec<_>>>()?;

        debug!(
            package = %raw.package,
            types = types.len(),
            functions = functions.len(),
            "loaded bridge description"
        );

        Ok(Self {
            package: raw.package,
            crate_path: raw.crate_path,
            runtime_path: raw.runtime.unwrap_or_else(|| DEFAULT_RUNTIME.to_string()),
            types,
            functions,
        })
    }
}

impl TypeEntry {
    fn try_into_type(self) -> Result<TypeRef> {
        match (self.ty, self.fields) {
            (Some(ty), None) => parse_type(&ty),
            (None, Some(fields)) => {
                let fields = fields
                    .into_iter()
                    .map(|field| {
                        let ty = parse_type(&field.ty)
                            .with_context(|| type_error(&self.name, &field.name, &field.ty))?;
                        Ok(Field {
                            name: field.name,
                            ty,
                            rename: field.rename,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeRef::Struct(fields))
            }
            (Some(_), Some(_)) => bail!("set either `type` or `struct`, not both"),
            (None, None) => bail!("missing `type` or `struct`"),
        }
    }
}

impl FunctionEntry {
    fn try_into_signature(self) -> Result<Signature> {
        let convert = |entries: Vec<ParamEntry>, what: &str| {
            entries
                .into_iter()
                .enumerate()
                .map(|(idx, entry)| {
                    let label = entry.name.clone().unwrap_or_else(|| format!("{what} {idx}"));
                    let ty = parse_type(&entry.ty)
                        .with_context(|| type_error(&self.name, &label, &entry.ty))?;
                    Ok(Param {
                        name: entry.name.filter(|name| !name.is_empty() && name != "_"),
                        ty,
                    })
                })
                .collect::<Result<Vec<_>>>()
        };

        let params = convert(self.params, "parameter")?;
        let results = convert(self.results, "result")?;

        Ok(Signature {
            name: self.name,
            params,
            results,
            variadic: self.variadic,
            doc: self.doc.map(|doc| doc.trim().to_string()).filter(|doc| !doc.is_empty()),
        })
    }
}

/// Parse the compact type syntax used in bridge files:
/// basic names, `error`, `[]T`, `[N]T`, `map[K]V`, `*T` and `::`-qualified names.
pub fn parse_type(source: &str) -> Result<TypeRef> {
    let mut parser = TypeParser {
        src: source.trim(),
        pos: 0,
    };
    let ty = parser.parse()?;
    if parser.pos != parser.src.len() {
        bail!(
            "unexpected trailing input `{}` in type `{}`",
            &parser.src[parser.pos..],
            parser.src
        );
    }
    Ok(ty)
}

struct TypeParser<'a> {
    src: &'a str,
    pos: usize,
}

impl TypeParser<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(anyhow!(
                "expected `{token}` at offset {} in type `{}`",
                self.pos,
                self.src
            ))
        }
    }

    fn parse(&mut self) -> Result<TypeRef> {
        if self.eat("[]") {
            return Ok(TypeRef::slice(self.parse()?));
        }
        if self.eat("[") {
            let digits = self.take_while(|ch| ch.is_ascii_digit());
            let len = digits
                .parse::<usize>()
                .map_err(|_| anyhow!("invalid array length in type `{}`", self.src))?;
            self.expect("]")?;
            return Ok(TypeRef::array(self.parse()?, len));
        }
        if self.eat("*") {
            return Ok(TypeRef::pointer(self.parse()?));
        }
        if self.eat("map[") {
            let key = self.parse()?;
            self.expect("]")?;
            return Ok(TypeRef::map(key, self.parse()?));
        }

        let path = self.take_while(|ch| ch == '_' || ch == ':' || ch.is_ascii_alphanumeric());
        if path.is_empty() {
            bail!("expected a type at offset {} in `{}`", self.pos, self.src);
        }
        if path == "error" {
            return Ok(TypeRef::Error);
        }
        if let Some(kind) = BasicKind::from_ident(&path) {
            return Ok(TypeRef::Basic(kind));
        }
        let name = QualifiedName::new(path);
        if !name.is_rust_path() {
            bail!("`{name}` is not a valid type path");
        }
        Ok(TypeRef::Named(name))
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> String {
        let taken: String = self.rest().chars().take_while(|&ch| pred(ch)).collect();
        self.pos += taken.len();
        taken
    }
}

fn type_error(owner: &str, item: &str, ident: &str) -> String {
    format!("unsupported type `{ident}` for `{item}` in `{owner}`")
}
