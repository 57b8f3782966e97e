//! Built-in candidate sources.
//!
//! Both sources rank a fixed list of strings: `files` walks a directory tree,
//! `lines` reads text one candidate per line. The list is split into shards of
//! [`DEFAULT_SHARD_SIZE`] entries that the ranker schedules across its workers.

mod files;
mod lines;

use std::sync::Arc;

use frz_ranker::{Accumulator, Query, QueryCompiler, Scorer, USER_KEY_MASK};
use serde::Serialize;

pub use files::{FilesSource, FilesystemOptions, collect_paths, normalize_extension};
pub use lines::LinesSource;

pub const DEFAULT_SHARD_SIZE: usize = 2_048;

/// Candidates scanned between two staleness checks.
const STALE_CHECK_INTERVAL: usize = 256;

/// A ranked candidate ready for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Match {
	pub text: String,
	/// Codepoint indices of the matched characters.
	pub positions: Vec<usize>,
}

/// Construction context: one entry of a shared candidate list.
struct Candidate {
	items: Arc<[String]>,
	index: usize,
	/// Haystack limit the candidate was ranked under.
	max_haystack_len: usize,
}

fn materialize(candidate: &Candidate, query: &Query) -> Match {
	let text = &candidate.items[candidate.index];
	let haystack = QueryCompiler::compile_owned(text.as_bytes());
	let mut scorer = Scorer::new(candidate.max_haystack_len);
	let positions = scorer
		.positions(query.needle(), haystack.as_text())
		.or_else(|| {
			query
				.has_spaces()
				.then(|| scorer.positions(query.spaceless(), haystack.as_text()))
				.flatten()
		})
		.unwrap_or_default();
	Match {
		text: text.clone(),
		positions,
	}
}

/// Dedup key for list position `index`, spaced one window apart so distinct
/// positions never collapse. Falls back to `0` (never deduplicated) when the
/// position does not fit the key space.
pub(crate) fn position_key(index: usize, window: u32) -> u32 {
	u32::try_from(index + 1)
		.ok()
		.and_then(|position| position.checked_mul(window.max(1)))
		.filter(|key| *key <= USER_KEY_MASK)
		.unwrap_or(0)
}

/// A sharded list of candidate strings with one dedup key per entry.
#[derive(Debug, Clone)]
pub(crate) struct CandidateList {
	items: Arc<[String]>,
	keys: Arc<[u32]>,
	shard_size: usize,
	/// Score with the prefix-resuming scorer; pays off on sorted input.
	resume: bool,
}

impl CandidateList {
	pub(crate) fn new(items: Vec<String>, keys: Vec<u32>, resume: bool) -> Self {
		debug_assert_eq!(items.len(), keys.len());
		Self {
			items: items.into(),
			keys: keys.into(),
			shard_size: DEFAULT_SHARD_SIZE,
			resume,
		}
	}

	pub(crate) fn with_shard_size(mut self, shard_size: usize) -> Self {
		self.shard_size = shard_size.max(1);
		self
	}

	pub(crate) fn len(&self) -> usize {
		self.items.len()
	}

	pub(crate) fn items(&self) -> &[String] {
		&self.items
	}

	pub(crate) fn shard_count(&self) -> u32 {
		u32::try_from(self.items.len().div_ceil(self.shard_size)).unwrap_or(u32::MAX)
	}

	/// Score one shard. An empty query admits every candidate with a neutral
	/// score, which leaves them in list order.
	pub(crate) fn search_shard(&self, shard: u32, results: &mut Accumulator<'_, Match>) {
		let start = (shard as usize).saturating_mul(self.shard_size);
		let end = start.saturating_add(self.shard_size).min(self.items.len());
		let admit_all = results.query().is_empty();
		let max_haystack_len = results.max_haystack_len();

		for index in start..end {
			if (index - start) % STALE_CHECK_INTERVAL == 0 && results.is_stale() {
				return;
			}
			let text = &self.items[index];
			let score = if admit_all {
				Some(0)
			} else if self.resume {
				results.score_resuming(text)
			} else {
				results.score(text)
			};
			if let Some(score) = score {
				let candidate = Candidate {
					items: Arc::clone(&self.items),
					index,
					max_haystack_len,
				};
				results.insert(self.keys[index], score, materialize, candidate, None);
			}
		}
	}
}
