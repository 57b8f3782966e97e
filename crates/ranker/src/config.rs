//! Tunables for a search session.

use std::num::NonZeroUsize;
use std::thread;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::merge::{DEFAULT_DEDUP_WINDOW, DEFAULT_PARALLEL_THRESHOLD, MergeOptions};
use crate::scorer::DEFAULT_MAX_HAYSTACK_LEN;

pub const DEFAULT_SHEET_SLOTS: u32 = 512;
pub const DEFAULT_MAX_SHEETS: u32 = 256;

/// Sizing and behaviour of the ranking engine.
///
/// Every field has a default, so a partial `[ranker]` table deserializes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
	/// Entries per sheet.
	pub sheet_slots: u32,
	/// Ceiling on sheets per search; inserts past it are dropped.
	pub max_sheets: u32,
	/// Worker threads in the pool.
	pub workers: usize,
	/// Keys closer than this collapse to one candidate.
	pub dedup_window: u32,
	pub dedup: bool,
	/// Record count from which the merge runs on several threads.
	pub parallel_merge_threshold: usize,
	/// Threads used by a parallel merge. Defaults to `workers`.
	pub merge_threads: Option<usize>,
	/// Haystacks longer than this never match.
	pub max_haystack_len: usize,
}

impl Default for RankerConfig {
	fn default() -> Self {
		Self {
			sheet_slots: DEFAULT_SHEET_SLOTS,
			max_sheets: DEFAULT_MAX_SHEETS,
			workers: default_workers(),
			dedup_window: DEFAULT_DEDUP_WINDOW,
			dedup: true,
			parallel_merge_threshold: DEFAULT_PARALLEL_THRESHOLD,
			merge_threads: None,
			max_haystack_len: DEFAULT_MAX_HAYSTACK_LEN,
		}
	}
}

fn default_workers() -> usize {
	thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

impl RankerConfig {
	/// Reject settings the engine cannot run with.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.sheet_slots == 0 {
			return Err(ConfigError::invalid("sheet_slots", self.sheet_slots, "must be at least 1"));
		}
		if self.max_sheets == 0 {
			return Err(ConfigError::invalid("max_sheets", self.max_sheets, "must be at least 1"));
		}
		if self.workers == 0 {
			return Err(ConfigError::invalid("workers", self.workers, "must be at least 1"));
		}
		if self.dedup_window == 0 {
			return Err(ConfigError::invalid(
				"dedup_window",
				self.dedup_window,
				"must be at least 1",
			));
		}
		if self.merge_threads == Some(0) {
			return Err(ConfigError::invalid("merge_threads", 0, "must be at least 1"));
		}
		if self.record_capacity().is_none() {
			return Err(ConfigError::invalid(
				"max_sheets",
				self.max_sheets,
				"sheet_slots * max_sheets overflows",
			));
		}
		Ok(())
	}

	/// Upper bound on records one search can hold.
	#[must_use]
	pub fn record_capacity(&self) -> Option<usize> {
		(self.sheet_slots as usize).checked_mul(self.max_sheets as usize)
	}

	#[must_use]
	pub fn merge_options(&self) -> MergeOptions {
		MergeOptions {
			window: self.dedup_window.max(1),
			dedup: self.dedup,
			parallel_threshold: self.parallel_merge_threshold,
			threads: self.merge_threads.unwrap_or(self.workers).max(1),
		}
	}
}
