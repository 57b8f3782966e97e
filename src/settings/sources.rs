use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use config::{Config, ConfigError, Environment, File};
use tracing::debug;

use crate::cli::CliArgs;
use frz::app_dirs;

const ENV_PREFIX: &str = "frz";

/// Layer default config files, `--config` files and `FRZ__*` variables, in
/// increasing precedence.
pub(super) fn build_config(cli: &CliArgs) -> Result<Config> {
	let mut builder = Config::builder();

	if !cli.no_config {
		for path in default_config_files() {
			if path.is_file() {
				debug!(path = %path.display(), "loading configuration file");
			}
			builder = builder.add_source(File::from(path).required(false));
		}
	}

	for path in &cli.config {
		builder = builder.add_source(File::from(path.clone()).required(true));
	}

	builder = builder.add_source(environment());

	builder.build().map_err(|err| match err {
		ConfigError::Frozen => anyhow!("configuration builder is frozen"),
		other => other.into(),
	})
}

/// `FRZ__RANKER__WORKERS=4` sets `ranker.workers`; lists are comma separated.
fn environment() -> Environment {
	Environment::with_prefix(ENV_PREFIX)
		.separator("__")
		.try_parsing(true)
		.list_separator(",")
		.with_list_parse_key("filesystem.allowed_extensions")
		.with_list_parse_key("filesystem.global_ignores")
}

/// Default configuration file locations, lowest precedence first.
pub(super) fn default_config_files() -> Vec<PathBuf> {
	let mut files = Vec::new();

	if let Ok(dir) = app_dirs::get_config_dir() {
		files.push(dir.join("config.toml"));
	}

	if let Ok(current_dir) = env::current_dir() {
		files.push(current_dir.join(".frz.toml"));
		files.push(current_dir.join("frz.toml"));
	}

	files
}

#[cfg(test)]
mod tests {
	use std::fs;

	use clap::Parser;
	use tempfile::tempdir;

	use super::*;

	#[test]
	fn default_files_include_current_directory_variants() {
		let files = default_config_files();
		assert!(files.iter().any(|path| path.ends_with(".frz.toml")));
		assert!(files.iter().any(|path| path.ends_with("frz.toml")));
	}

	#[test]
	fn explicit_config_files_are_merged() {
		let dir = tempdir().unwrap();
		let path = dir.path().join("custom.toml");
		fs::write(&path, "[ranker]\nworkers = 3\n\n[search]\nlimit = 7\n").unwrap();

		let cli = CliArgs::parse_from([
			"frz",
			"--no-config",
			"--config",
			path.to_str().unwrap(),
		]);
		let config = build_config(&cli).unwrap();
		assert_eq!(config.get_int("ranker.workers").unwrap(), 3);
		assert_eq!(config.get_int("search.limit").unwrap(), 7);
	}

	#[test]
	fn missing_explicit_config_is_an_error() {
		let dir = tempdir().unwrap();
		let missing = dir.path().join("absent.toml");
		let cli = CliArgs::parse_from([
			"frz",
			"--no-config",
			"--config",
			missing.to_str().unwrap(),
		]);
		assert!(build_config(&cli).is_err());
	}
}
