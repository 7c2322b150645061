use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt};

static INIT: Once = Once::new();

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "rbind=info";

/// Initialise the tracing subscriber once per process.
///
/// `verbose` lowers the default level to `debug` for every rbind crate; an
/// explicit `RUST_LOG` still wins.
pub fn init_logging(verbose: bool) {
    INIT.call_once(|| {
        let fallback = if verbose {
            "rbind=debug,rbind_codegen=debug,rbind_ffi=debug"
        } else {
            DEFAULT_FILTER
        };
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

        fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .compact()
            .init();
    });
}
