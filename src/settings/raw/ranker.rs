use serde::Deserialize;

use frz::RankerConfig;

use crate::cli::CliArgs;

/// `[ranker]` as read from disk. Unset keys keep the engine defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct RankerSection {
	pub(super) sheet_slots: Option<u32>,
	pub(super) max_sheets: Option<u32>,
	pub(super) workers: Option<usize>,
	pub(super) dedup_window: Option<u32>,
	pub(super) dedup: Option<bool>,
	pub(super) parallel_merge_threshold: Option<usize>,
	pub(super) merge_threads: Option<usize>,
	pub(super) max_haystack_len: Option<usize>,
}

impl RankerSection {
	pub(super) fn apply_cli_overrides(&mut self, cli: &CliArgs) {
		if let Some(value) = cli.workers {
			self.workers = Some(value);
		}
		if let Some(value) = cli.dedup {
			self.dedup = Some(value);
		}
	}

	pub(super) fn config(&self) -> RankerConfig {
		let defaults = RankerConfig::default();
		RankerConfig {
			sheet_slots: self.sheet_slots.unwrap_or(defaults.sheet_slots),
			max_sheets: self.max_sheets.unwrap_or(defaults.max_sheets),
			workers: self.workers.unwrap_or(defaults.workers),
			dedup_window: self.dedup_window.unwrap_or(defaults.dedup_window),
			dedup: self.dedup.unwrap_or(defaults.dedup),
			parallel_merge_threshold: self
				.parallel_merge_threshold
				.unwrap_or(defaults.parallel_merge_threshold),
			merge_threads: self.merge_threads.or(defaults.merge_threads),
			max_haystack_len: self.max_haystack_len.unwrap_or(defaults.max_haystack_len),
		}
	}
}
