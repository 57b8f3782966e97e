use std::path::PathBuf;

use serde::Deserialize;

use crate::cli::CliArgs;

/// `[search]` as read from disk.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct SearchSection {
	pub(super) query: Option<String>,
	pub(super) limit: Option<usize>,
	pub(super) timeout_ms: Option<u64>,
	pub(super) stdin: Option<bool>,
	pub(super) input: Option<PathBuf>,
}

impl SearchSection {
	pub(super) fn apply_cli_overrides(&mut self, cli: &CliArgs) {
		if let Some(query) = cli.query.clone() {
			self.query = Some(query);
		}
		if let Some(value) = cli.limit {
			self.limit = Some(value);
		}
		if let Some(value) = cli.timeout_ms {
			self.timeout_ms = Some(value);
		}
		// The input flags are exclusive on the command line, so any one of
		// them replaces whatever the files selected.
		if cli.stdin {
			self.stdin = Some(true);
			self.input = None;
		} else if let Some(path) = cli.input.clone() {
			self.stdin = Some(false);
			self.input = Some(path);
		} else if cli.root.is_some() {
			self.stdin = Some(false);
			self.input = None;
		}
	}
}
