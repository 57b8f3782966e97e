//! Storage for one search generation and its frozen, ranked view.

use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::accumulator::{Accumulator, UniqueKeys};
use crate::config::RankerConfig;
use crate::generation::GenerationClock;
use crate::merge::{self, MergeOptions, MergeStats};
use crate::pool::Spawner;
use crate::query::Query;
use crate::record::{Record, RecordBuffer};
use crate::sheet::SheetPool;
use crate::source::SourceId;

struct Frozen<M> {
	records: Vec<Record>,
	stats: MergeStats,
	cache: Box<[OnceLock<M>]>,
}

/// Every candidate inserted for one query, ranked once all workers finish.
///
/// Before [`freeze`](Self::freeze) the set only accepts inserts through
/// accumulators. Afterwards it is read-only: `count` is fixed and `get`
/// materializes candidates lazily, at most once each. Dropping the set runs
/// every stored destructor exactly once.
pub struct ResultSet<M> {
	generation: u64,
	query: Query,
	pool: SheetPool<M>,
	records: RecordBuffer,
	keyed: AtomicBool,
	frozen: OnceLock<Frozen<M>>,
	max_haystack_len: usize,
}

impl<M> ResultSet<M> {
	/// An empty set sized by `config`. Record storage grows one sheet's worth
	/// at a time, up to `sheet_slots * max_sheets` records.
	#[must_use]
	pub fn new(generation: u64, query: Query, config: &RankerConfig) -> Self {
		let sheet_slots = config.sheet_slots.max(1);
		Self {
			generation,
			query,
			pool: SheetPool::new(generation, sheet_slots, config.max_sheets),
			records: RecordBuffer::new(sheet_slots as usize, config.max_sheets as usize),
			keyed: AtomicBool::new(false),
			frozen: OnceLock::new(),
			max_haystack_len: config.max_haystack_len,
		}
	}

	#[must_use]
	pub fn generation(&self) -> u64 {
		self.generation
	}

	#[must_use]
	pub fn query(&self) -> &Query {
		&self.query
	}

	pub(crate) fn pool(&self) -> &SheetPool<M> {
		&self.pool
	}

	pub(crate) fn records(&self) -> &RecordBuffer {
		&self.records
	}

	pub(crate) fn mark_keyed(&self) {
		self.keyed.store(true, Ordering::Relaxed);
	}

	/// Dedup and rank the inserted records. Only the first call merges;
	/// later calls return `false`.
	pub fn freeze(&self, options: &MergeOptions) -> bool {
		self.freeze_with(options, None)
	}

	/// [`freeze`](Self::freeze), letting a parallel merge queue helper jobs
	/// on `helpers`.
	pub(crate) fn freeze_with(&self, options: &MergeOptions, helpers: Option<&Spawner>) -> bool {
		let mut merged = false;
		self.frozen.get_or_init(|| {
			merged = true;
			let options = MergeOptions {
				// Nothing to collapse when every key is zero.
				dedup: options.dedup && self.keyed.load(Ordering::Acquire),
				..*options
			};
			let (records, stats) = merge::merge_with(self.records.gather(), &options, helpers);
			debug!(
				generation = self.generation,
				count = stats.count(),
				sheets = self.pool.allocated(),
				"froze result set"
			);
			Frozen {
				cache: (0..stats.count()).map(|_| OnceLock::new()).collect(),
				records,
				stats,
			}
		});
		merged
	}

	#[must_use]
	pub fn is_frozen(&self) -> bool {
		self.frozen.get().is_some()
	}

	/// Ranked candidates after dedup. Zero until frozen.
	#[must_use]
	pub fn count(&self) -> usize {
		self.frozen.get().map_or(0, |frozen| frozen.stats.count())
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.count() == 0
	}

	/// Records discarded as duplicates during the merge.
	#[must_use]
	pub fn duplicates(&self) -> usize {
		self.frozen.get().map_or(0, |frozen| frozen.stats.duplicates)
	}

	#[must_use]
	pub fn stats(&self) -> Option<MergeStats> {
		self.frozen.get().map(|frozen| frozen.stats)
	}

	/// Packed record at rank `index`.
	#[must_use]
	pub fn record(&self, index: usize) -> Option<Record> {
		let frozen = self.frozen.get()?;
		(index < frozen.stats.count()).then(|| frozen.records[index])
	}

	/// Quantized score at rank `index`.
	#[must_use]
	pub fn score(&self, index: usize) -> Option<u16> {
		self.record(index).map(Record::score)
	}

	/// Source that produced the candidate at rank `index`.
	#[must_use]
	pub fn source(&self, index: usize) -> Option<SourceId> {
		self.record(index).map(|record| SourceId::from_index(record.source()))
	}

	/// Candidate at rank `index`, built on first access.
	pub fn get(&self, index: usize) -> Option<&M> {
		let frozen = self.frozen.get()?;
		let record = *frozen.records.get(index)?;
		let cell = frozen.cache.get(index)?;
		if let Some(value) = cell.get() {
			return Some(value);
		}
		let entry = self.pool.entry(record.sheet(), record.slot())?;
		Some(cell.get_or_init(|| entry.build(&self.query)))
	}

	/// Candidates in `range`, clamped to `count`, paired with their rank.
	pub fn window(&self, range: Range<usize>) -> impl Iterator<Item = (usize, &M)> + '_ {
		let end = range.end.min(self.count());
		let start = range.start.min(end);
		(start..end).filter_map(move |index| self.get(index).map(|value| (index, value)))
	}

	/// Candidates built so far.
	#[must_use]
	pub fn materialized(&self) -> usize {
		self.frozen
			.get()
			.map_or(0, |frozen| frozen.cache.iter().filter(|cell| cell.get().is_some()).count())
	}
}

impl<M: 'static> ResultSet<M> {
	/// Open an insertion handle on this set.
	pub fn accumulator<'a>(
		&'a self,
		clock: &'a GenerationClock,
		unique: &'a UniqueKeys,
	) -> Accumulator<'a, M> {
		Accumulator::new(self, clock, unique, self.max_haystack_len)
	}
}

impl<M> Drop for ResultSet<M> {
	fn drop(&mut self) {
		// Cached candidates go before the contexts they were built from.
		self.frozen.take();
		let destroyed = self.pool.teardown();
		debug!(generation = self.generation, destroyed, "tore down result set");
	}
}

impl<M> fmt::Debug for ResultSet<M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ResultSet")
			.field("generation", &self.generation)
			.field("query", &self.query.text())
			.field("frozen", &self.is_frozen())
			.field("count", &self.count())
			.finish_non_exhaustive()
	}
}
