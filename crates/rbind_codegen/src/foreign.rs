//! R side of the bridge: one wrapper per function that checks argument
//! shapes, dispatches through `.Call` and re-raises native failures.

use rayon::prelude::*;
use rbind_ffi::{BridgeSymbol, Signature};
use rbind_runtime::ERROR_CLASS;
use tracing::trace;

use crate::GENERATED_BY;
use crate::context::GenerationContext;
use crate::naming::{ForeignClass, ForeignShape, article, r_param, result_key};
use crate::writer::CodeWriter;

const INDENT: &str = "  ";

pub fn emit_foreign(ctx: &GenerationContext<'_>) -> String {
    let package = &ctx.spec.package;
    let wrappers: Vec<String> = ctx
        .spec
        .functions
        .par_iter()
        .filter_map(|signature| {
            ctx.symbols
                .get(&signature.name)
                .map(|symbol| render_wrapper(ctx, signature, symbol))
        })
        .collect();

    let mut w = CodeWriter::new(INDENT);
    w.line(format!("# {GENERATED_BY}"))
        .line(format!("# fingerprint: {}", ctx.fingerprint))
        .blank()
        .line(format!("#' @useDynLib {package}"))
        .line("NULL");
    for wrapper in &wrappers {
        w.blank().raw(wrapper);
    }
    trace!(wrappers = wrappers.len(), "rendered foreign source");
    w.finish()
}

struct Argument {
    name: String,
    shape: ForeignShape,
}

fn render_wrapper(ctx: &GenerationContext<'_>, signature: &Signature, symbol: &BridgeSymbol) -> String {
    let args: Vec<Argument> = signature
        .params
        .iter()
        .enumerate()
        .map(|(idx, param)| Argument {
            name: r_param(idx, param),
            shape: ctx.shape(&param.ty),
        })
        .collect();
    let variadic = signature.variadic.then(|| args.last()).flatten();

    let mut w = CodeWriter::new(INDENT);
    write_docs(&mut w, ctx, signature, &args, variadic);

    let formals: Vec<&str> = args
        .iter()
        .map(|arg| match variadic {
            Some(last) if std::ptr::eq(arg, last) => "...",
            _ => arg.name.as_str(),
        })
        .collect();
    w.open(format!(
        "{} <- function({}) {{",
        symbol.wrapper_name,
        formals.join(", ")
    ));

    if let Some(last) = variadic {
        // `c()` of nothing is NULL, so an empty call gets a typed empty vector.
        match last.shape.class {
            ForeignClass::List => w.line(format!("{} <- list(...)", last.name)),
            class => w.line(format!(
                "{} <- if (...length() == 0) {} else c(...)",
                last.name,
                class.empty()
            )),
        };
    }
    for arg in &args {
        write_checks(&mut w, arg);
    }

    let mut call_args: Vec<String> = vec![r_string(&symbol.entry_symbol)];
    call_args.extend(args.iter().map(|arg| arg.name.clone()));
    call_args.push(format!("PACKAGE = {}", r_string(&ctx.spec.package)));
    w.line(format!("r <- .Call({})", call_args.join(", ")))
        .open(format!("if (inherits(r, {})) {{", r_string(ERROR_CLASS)))
        .line("stop(r)")
        .close("}")
        .line(if signature.results.is_empty() {
            "invisible(r)"
        } else {
            "r"
        })
        .close("}");
    w.finish()
}

fn write_docs(
    w: &mut CodeWriter,
    ctx: &GenerationContext<'_>,
    signature: &Signature,
    args: &[Argument],
    variadic: Option<&Argument>,
) {
    w.line(format!("#' {}", signature.name)).line("#'");
    if let Some(doc) = signature.doc.as_deref().map(str::trim).filter(|doc| !doc.is_empty()) {
        for line in doc.lines() {
            w.line(format!("#' {}", line.trim_end()).trim_end());
        }
        w.line("#'");
    }

    for arg in args {
        match variadic {
            Some(last) if std::ptr::eq(arg, last) => w.line(format!(
                "#' @param ... values combined into {}",
                article(&arg.shape.describe(), false)
            )),
            _ => w.line(format!(
                "#' @param {} is {}",
                arg.name,
                article(&arg.shape.describe(), false)
            )),
        };
    }

    match signature.results.as_slice() {
        [] => {}
        [result] => {
            let described = article(&ctx.shape(&result.ty).describe(), true);
            match &result.name {
                Some(name) => w.line(format!("#' @return {described}, {name}")),
                None => w.line(format!("#' @return {described}")),
            };
        }
        results => {
            w.line("#' @return A structured value containing:");
            for (idx, result) in results.iter().enumerate() {
                w.line(format!(
                    "#'   - {}, ${}",
                    article(&ctx.shape(&result.ty).describe(), false),
                    result_key(idx, result)
                ));
            }
        }
    }
    w.line("#' @export");
}

fn write_checks(w: &mut CodeWriter, arg: &Argument) {
    let name = &arg.name;
    let shape = &arg.shape;
    let guard = if shape.nullable {
        format!("!is.null({name}) && ")
    } else {
        String::new()
    };
    let or_null = if shape.nullable { " or NULL" } else { "" };

    w.open(format!("if ({guard}!is.{}({name})) {{", shape.class))
        .line(format!(
            "stop(\"Argument '{name}' must be of type '{}'{or_null}.\")",
            shape.class
        ))
        .close("}");
    if let Some(len) = shape.len {
        w.open(format!("if ({guard}length({name}) != {len}) {{"))
            .line(format!(
                "stop(\"Argument '{name}' must have {len} element(s).\")"
            ))
            .close("}");
    }
    if shape.named {
        w.open(format!(
            "if ({guard}length({name}) > 0 && is.null(names({name}))) {{"
        ))
        .line(format!("stop(\"Argument '{name}' must be named.\")"))
        .close("}");
    }
    if !shape.fields.is_empty() {
        let required: Vec<String> = shape.fields.iter().map(|field| r_string(field)).collect();
        let listed: Vec<String> = shape.fields.iter().map(|field| format!("'{field}'")).collect();
        w.open(format!(
            "if ({guard}!all(c({}) %in% names({name}))) {{",
            required.join(", ")
        ))
        .line(format!(
            "stop({})",
            r_string(&format!(
                "Argument '{name}' must have fields {}.",
                listed.join(", ")
            ))
        ))
        .close("}");
    }
}

/// Double-quoted R string literal.
fn r_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn r_strings_escape_quotes() {
        assert_eq!(r_string("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }
}
