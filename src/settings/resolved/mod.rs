use std::path::PathBuf;
use std::time::Duration;

use frz::{FilesystemOptions, RankerConfig};

mod errors;
mod sources;
mod summary;
mod validation;

pub(crate) use errors::ConfigError;
pub(crate) use sources::{ConfigSources, SettingSource};

/// Where the candidates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
	/// Files below a directory.
	Files { root: PathBuf },
	/// Lines of standard input.
	Stdin,
	/// Lines of a text file.
	File(PathBuf),
}

/// Application-ready configuration derived from user input, config files and
/// defaults.
#[derive(Debug)]
pub struct ResolvedConfig {
	pub ranker: RankerConfig,
	pub input: InputSource,
	pub filesystem: FilesystemOptions,
	pub query: String,
	pub limit: usize,
	pub timeout: Duration,
}

impl ResolvedConfig {
	pub(super) fn validate(&self, sources: &ConfigSources) -> Result<(), ConfigError> {
		validation::validate(self, sources)
	}

	/// Print a human readable summary of the effective configuration.
	pub fn print_summary(&self) {
		summary::print_summary(self);
	}
}
