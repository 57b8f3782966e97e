//! Dedup and rank of the flushed record buffer.
//!
//! Two LSD radix sorts run back to back. The first orders records ascending
//! by dedup key so that duplicates sit next to each other; a linear sweep then
//! collapses each run of near-equal keys to its best-scoring record. The
//! second orders the survivors descending by score. Both sorts are stable, so
//! equal scores end up ordered by key. Records that tie on both score and key,
//! including every pair of key-`0` records with equal scores, keep the order
//! they were flushed in, which varies between runs when several workers
//! flush. Keys drawn from `insert_unique` also depend on which worker drew
//! first. Within a run of near-equal keys the first of several equally
//! scored records in key order survives.
//!
//! Discarded duplicates are not removed: their score is cleared, which sends
//! them to the tail of the rank pass, and the reported count shrinks instead.

mod parallel;
mod radix;

use std::time::Instant;

use tracing::debug;

pub(crate) use parallel::merge_parallel;

use crate::pool::Spawner;
use crate::record::{AtomicRecord, Record};

/// Keys closer than this are treated as the same candidate.
///
/// A window of `1` collapses only identical keys.
pub const DEFAULT_DEDUP_WINDOW: u32 = 2;

/// Below this many records the serial merge is used.
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 32_768;

pub(crate) const KEY_PASSES: u32 = 4;
pub(crate) const SCORE_PASSES: u32 = 2;

/// Knobs for one merge.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeOptions {
	pub window: u32,
	/// Run the dedup pass at all.
	pub dedup: bool,
	pub parallel_threshold: usize,
	pub threads: usize,
}

impl Default for MergeOptions {
	fn default() -> Self {
		Self {
			window: DEFAULT_DEDUP_WINDOW,
			dedup: true,
			parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
			threads: 1,
		}
	}
}

/// Summary of a finished merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MergeStats {
	pub total: usize,
	pub duplicates: usize,
	pub parallel: bool,
}

impl MergeStats {
	/// Live records after dedup.
	#[must_use]
	pub fn count(&self) -> usize {
		self.total - self.duplicates
	}
}

/// Whether `next` continues the run that `prev` belongs to. Keys are sorted
/// ascending, so `next >= prev`.
#[inline]
pub(crate) fn same_run(prev: u32, next: u32, window: u32) -> bool {
	prev != 0 && next != 0 && next.wrapping_sub(prev) < window
}

/// Collapse runs of near-equal keys in a key-sorted slice. Returns the
/// number of records discarded.
pub(crate) fn sweep(records: &mut [Record], window: u32) -> usize {
	let mut duplicates = 0;
	let mut survivor = 0;
	for i in 1..records.len() {
		if !same_run(records[i - 1].key(), records[i].key(), window) {
			survivor = i;
			continue;
		}
		if records[i].score() > records[survivor].score() {
			records[survivor] = records[survivor].discarded();
			survivor = i;
		} else {
			records[i] = records[i].discarded();
		}
		duplicates += 1;
	}
	duplicates
}

/// Dedup and rank `records` in place on the calling thread. Returns the
/// number of discarded duplicates, which now occupy the tail.
pub fn merge_serial(records: &mut Vec<Record>, window: u32, dedup: bool) -> usize {
	let mut scratch = Vec::with_capacity(records.len());
	let mut duplicates = 0;
	if dedup {
		for pass in 0..KEY_PASSES {
			radix::pass(records, &mut scratch, |record| record.key_digit(pass));
		}
		duplicates = sweep(records, window);
	}
	for pass in 0..SCORE_PASSES {
		radix::pass(records, &mut scratch, |record| record.score_digit(pass));
	}
	duplicates
}

/// Merge the stored records of a record buffer, choosing the serial or
/// parallel path by size. The parallel path runs on the calling thread alone.
pub fn merge(records: Vec<AtomicRecord>, options: &MergeOptions) -> (Vec<Record>, MergeStats) {
	merge_with(records, options, None)
}

/// Like [`merge`], with the parallel path queueing helper jobs on `helpers`.
pub(crate) fn merge_with(
	records: Vec<AtomicRecord>,
	options: &MergeOptions,
	helpers: Option<&Spawner>,
) -> (Vec<Record>, MergeStats) {
	let started = Instant::now();
	let total = records.len();
	let parallel = options.threads > 1 && total >= options.parallel_threshold.max(1);

	let (merged, duplicates) = if parallel {
		merge_parallel(records, options.window, options.dedup, options.threads, helpers)
	} else {
		let mut merged: Vec<Record> = records.iter().map(AtomicRecord::load).collect();
		let duplicates = merge_serial(&mut merged, options.window, options.dedup);
		(merged, duplicates)
	};

	let stats = MergeStats {
		total,
		duplicates,
		parallel,
	};
	debug!(
		total,
		duplicates,
		parallel,
		elapsed_us = started.elapsed().as_micros() as u64,
		"merged results"
	);
	(merged, stats)
}
