//! Diagnostic logging for the `frz` binary.
//!
//! Events are written to stderr so that they never mix with ranked output on
//! stdout. The filter is read from `FRZ_LOG` using the usual `EnvFilter`
//! directive syntax and defaults to warnings only.

use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "FRZ_LOG";
const DEFAULT_DIRECTIVE: &str = "warn";

fn filter() -> EnvFilter {
	EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// Install the global subscriber. Calling this more than once is harmless;
/// only the first call takes effect.
pub fn initialize() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter())
		.with_writer(std::io::stderr)
		.with_target(false)
		.try_init();
}
