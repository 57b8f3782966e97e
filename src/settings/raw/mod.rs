use std::env;
use std::time::Duration;

use anyhow::{Error, Result};
use serde::Deserialize;

use crate::cli::CliArgs;

use super::resolved::{ConfigSources, InputSource, ResolvedConfig, SettingSource};

mod filesystem;
mod ranker;
mod search;

use filesystem::FilesystemSection;
use ranker::RankerSection;
use search::SearchSection;

pub(super) const DEFAULT_LIMIT: usize = 20;
pub(super) const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Mirror of the configuration file representation before CLI overrides and
/// validation are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct RawConfig {
	ranker: RankerSection,
	filesystem: FilesystemSection,
	search: SearchSection,
}

impl RawConfig {
	/// Apply CLI overrides on top of the raw configuration values.
	pub(super) fn apply_cli_overrides(&mut self, cli: &CliArgs) {
		self.ranker.apply_cli_overrides(cli);
		self.filesystem.apply_cli_overrides(cli);
		self.search.apply_cli_overrides(cli);
	}

	/// Convert into a [`ResolvedConfig`], filling defaults and validating.
	pub(super) fn resolve(self, cli: &CliArgs) -> Result<ResolvedConfig> {
		let sources = self.sources(cli);

		let input = if self.search.stdin.unwrap_or(false) {
			InputSource::Stdin
		} else if let Some(path) = self.search.input.clone() {
			InputSource::File(path)
		} else {
			InputSource::Files {
				root: self.filesystem.resolve_root()?,
			}
		};

		let config = ResolvedConfig {
			ranker: self.ranker.config(),
			input,
			filesystem: self.filesystem.options(),
			query: self.search.query.unwrap_or_default(),
			limit: self.search.limit.unwrap_or(DEFAULT_LIMIT),
			timeout: Duration::from_millis(self.search.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
		};

		config.validate(&sources).map_err(Error::new)?;

		Ok(config)
	}

	/// Where each validated setting came from.
	fn sources(&self, cli: &CliArgs) -> ConfigSources {
		let ranker = &self.ranker;
		let filesystem = &self.filesystem;
		let search = &self.search;
		// (key, environment variable, CLI flag, set on the CLI, set at all)
		let tracked = [
			(
				"ranker.sheet_slots",
				"FRZ__RANKER__SHEET_SLOTS",
				None,
				false,
				ranker.sheet_slots.is_some(),
			),
			(
				"ranker.max_sheets",
				"FRZ__RANKER__MAX_SHEETS",
				None,
				false,
				ranker.max_sheets.is_some(),
			),
			(
				"ranker.workers",
				"FRZ__RANKER__WORKERS",
				Some("--workers"),
				cli.workers.is_some(),
				ranker.workers.is_some(),
			),
			(
				"ranker.dedup_window",
				"FRZ__RANKER__DEDUP_WINDOW",
				None,
				false,
				ranker.dedup_window.is_some(),
			),
			(
				"ranker.merge_threads",
				"FRZ__RANKER__MERGE_THREADS",
				None,
				false,
				ranker.merge_threads.is_some(),
			),
			(
				"filesystem.threads",
				"FRZ__FILESYSTEM__THREADS",
				Some("--threads"),
				cli.threads.is_some(),
				filesystem.threads.is_some(),
			),
			(
				"filesystem.max_depth",
				"FRZ__FILESYSTEM__MAX_DEPTH",
				Some("--max-depth"),
				cli.max_depth.is_some(),
				filesystem.max_depth.is_some(),
			),
			(
				"search.limit",
				"FRZ__SEARCH__LIMIT",
				Some("--limit"),
				cli.limit.is_some(),
				search.limit.is_some(),
			),
			(
				"search.timeout_ms",
				"FRZ__SEARCH__TIMEOUT_MS",
				Some("--timeout-ms"),
				cli.timeout_ms.is_some(),
				search.timeout_ms.is_some(),
			),
		];

		let mut sources = ConfigSources::default();
		for (key, env_var, cli_flag, cli_present, value_present) in tracked {
			if let Some(origin) = detect_source(cli_present, value_present, env_var, cli_flag, key) {
				sources.record(key, origin);
			}
		}
		sources
	}
}

fn detect_source(
	cli_present: bool,
	value_present: bool,
	env_var: &'static str,
	cli_flag: Option<&'static str>,
	key: &'static str,
) -> Option<SettingSource> {
	if !value_present {
		return None;
	}

	if let Some(flag) = cli_flag
		&& cli_present
	{
		return Some(SettingSource::CliFlag(flag));
	}

	if env::var_os(env_var).is_some() {
		return Some(SettingSource::Environment(env_var));
	}

	Some(SettingSource::ConfigKey(key.to_owned()))
}
