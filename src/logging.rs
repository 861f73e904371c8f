//! Logging setup for binaries and tools embedding the exporter

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered to this crate.
///
/// `RUST_LOG` overrides the default filter when set. Returns `false` if a
/// global subscriber was already installed.
pub fn init_logging(verbose: bool) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("ewc_export=debug,warn")
        } else {
            EnvFilter::new("ewc_export=info,warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init()
        .is_ok()
}
