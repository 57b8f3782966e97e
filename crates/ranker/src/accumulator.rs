//! Per-worker insertion handle.
//!
//! An [`Accumulator`] is handed to a source for the duration of one shard. It
//! owns scratch buffers for decoding and scoring haystacks, holds a claim on a
//! sheet for construction entries, and batches packed records privately until
//! they are flushed into the shared buffer with one reservation.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

use crate::generation::GenerationClock;
use crate::query::{Query, QueryCompiler};
use crate::record::Record;
use crate::result_set::ResultSet;
use crate::scorer::{ColumnCache, SCORE_MIN, Score, Scorer, rank_score};
use crate::sheet::{BoxedEntry, Destructor, Factory, SheetClaim, entry};
use crate::source::SourceId;

/// Dedup keys supplied by sources live below this bit.
pub const USER_KEY_MASK: u32 = 0x7FFF_FFFF;
const SYNTHETIC_KEY_BIT: u32 = 0x8000_0000;

/// Records buffered per accumulator before an automatic flush.
const FLUSH_BATCH: usize = 1024;

/// Source of synthesized dedup keys that never collide with each other or
/// with caller keys.
///
/// Consecutive keys are spaced one dedup window apart so adjacent ones never
/// fall into the same run.
#[derive(Debug)]
pub struct UniqueKeys {
	next: AtomicU64,
	window: u32,
}

impl UniqueKeys {
	#[must_use]
	pub fn new(window: u32) -> Self {
		Self {
			next: AtomicU64::new(1),
			window: window.max(1),
		}
	}

	pub fn next_key(&self) -> u32 {
		let n = self.next.fetch_add(1, Ordering::Relaxed);
		let spaced = n.wrapping_mul(u64::from(self.window)) as u32 & USER_KEY_MASK;
		SYNTHETIC_KEY_BIT | spaced
	}
}

/// Insertion handle for one worker and one shard.
pub struct Accumulator<'a, M> {
	results: &'a ResultSet<M>,
	clock: &'a GenerationClock,
	unique: &'a UniqueKeys,
	source: SourceId,
	claim: Option<SheetClaim>,
	pending: Vec<Record>,
	compiler: QueryCompiler,
	scorer: Scorer,
	columns: ColumnCache,
	dropped: usize,
}

impl<'a, M: 'static> Accumulator<'a, M> {
	pub(crate) fn new(
		results: &'a ResultSet<M>,
		clock: &'a GenerationClock,
		unique: &'a UniqueKeys,
		max_haystack_len: usize,
	) -> Self {
		Self {
			results,
			clock,
			unique,
			source: SourceId::default(),
			claim: None,
			pending: Vec::new(),
			compiler: QueryCompiler::new(),
			scorer: Scorer::new(max_haystack_len),
			columns: ColumnCache::new(),
			dropped: 0,
		}
	}

	/// Tag records inserted from now on with `source`.
	pub fn set_source(&mut self, source: SourceId) {
		self.source = source;
	}

	#[must_use]
	pub fn source(&self) -> SourceId {
		self.source
	}

	#[must_use]
	pub fn query(&self) -> &'a Query {
		self.results.query()
	}

	#[must_use]
	pub fn generation(&self) -> u64 {
		self.results.generation()
	}

	/// Whether a newer search has started. Sources scanning long shards
	/// should check this periodically and return early.
	#[must_use]
	pub fn is_stale(&self) -> bool {
		self.clock.is_stale(self.results.generation())
	}

	/// Haystacks longer than this never match.
	#[must_use]
	pub fn max_haystack_len(&self) -> usize {
		self.scorer.max_haystack_len()
	}

	/// Candidates dropped so far because storage ran out.
	#[must_use]
	pub fn dropped(&self) -> usize {
		self.dropped
	}

	/// Score `haystack` against the query.
	///
	/// When the query contains spaces and does not match as typed, the
	/// spaceless needle is tried as a fallback. Returns `None` for no match.
	pub fn score(&mut self, haystack: &str) -> Option<Score> {
		self.score_bytes(haystack.as_bytes())
	}

	pub fn score_bytes(&mut self, haystack: &[u8]) -> Option<Score> {
		let query = self.results.query();
		let text = self.compiler.haystack(haystack);
		let mut score = self.scorer.score(query.needle(), text);
		if score == SCORE_MIN && query.has_spaces() {
			score = self.scorer.score(query.spaceless(), text);
		}
		(score != SCORE_MIN).then_some(score)
	}

	/// Score `haystack`, reusing the matrix columns shared with the previous
	/// haystack passed here. Pays off when consecutive haystacks share long
	/// prefixes, such as sorted paths.
	pub fn score_resuming(&mut self, haystack: &str) -> Option<Score> {
		let query = self.results.query();
		let text = self.compiler.haystack(haystack.as_bytes());
		let mut score = self
			.scorer
			.score_columns(query.needle(), text, usize::MAX, &mut self.columns);
		if score == SCORE_MIN && query.has_spaces() {
			score = self.scorer.score(query.spaceless(), text);
		}
		(score != SCORE_MIN).then_some(score)
	}

	/// Insert a candidate under a caller-chosen dedup key. A key of `0`
	/// never deduplicates.
	///
	/// If storage is exhausted the candidate is dropped and `destructor`
	/// runs on `context` before this returns.
	pub fn insert<C>(
		&mut self,
		dedup_key: u32,
		score: Score,
		factory: Factory<C, M>,
		context: C,
		destructor: Option<Destructor<C>>,
	) where
		C: Send + Sync + 'static,
	{
		self.push(dedup_key & USER_KEY_MASK, score, entry(context, factory, destructor));
	}

	/// Insert a candidate that must never collapse with another one.
	pub fn insert_unique<C>(
		&mut self,
		score: Score,
		factory: Factory<C, M>,
		context: C,
		destructor: Option<Destructor<C>>,
	) where
		C: Send + Sync + 'static,
	{
		let key = self.unique.next_key();
		self.push(key, score, entry(context, factory, destructor));
	}

	/// Move buffered records into the shared buffer.
	pub fn flush(&mut self) {
		if self.pending.is_empty() {
			return;
		}
		let fitted = self.results.records().append(&self.pending);
		if fitted < self.pending.len() {
			// Entries behind the rejected records stay in their sheets and
			// are torn down with the result set.
			self.dropped += self.pending.len() - fitted;
			trace!(
				generation = self.generation(),
				rejected = self.pending.len() - fitted,
				"record buffer full"
			);
		}
		self.pending.clear();
	}

	/// Flush and give the sheet claim back. Returns the number of dropped
	/// candidates.
	pub fn finish(mut self) -> usize {
		self.release();
		self.dropped
	}

	fn push(&mut self, key: u32, score: Score, entry: BoxedEntry<M>) {
		if self.pending.try_reserve(1).is_err() {
			self.drop_entry(entry);
			return;
		}
		let (sheet, slot) = match self.place(entry) {
			Ok(location) => location,
			Err(entry) => {
				self.drop_entry(entry);
				return;
			}
		};
		if key != 0 {
			self.results.mark_keyed();
		}
		self.pending.push(Record::pack(
			key,
			rank_score(score),
			self.source.index(),
			sheet,
			slot,
		));
		if self.pending.len() >= FLUSH_BATCH {
			self.flush();
		}
	}

	/// Store an entry in the claimed sheet, claiming a new one when full.
	fn place(&mut self, mut entry: BoxedEntry<M>) -> Result<(u32, u32), BoxedEntry<M>> {
		let pool = self.results.pool();
		loop {
			let mut claim = match self.claim.take() {
				Some(claim) => claim,
				None => match pool.acquire() {
					Some(claim) => claim,
					None => return Err(entry),
				},
			};
			match pool.store(&mut claim, entry) {
				Ok(slot) => {
					let sheet = claim.index;
					self.claim = Some(claim);
					return Ok((sheet, slot));
				}
				Err(rejected) => {
					pool.release(claim);
					entry = rejected;
				}
			}
		}
	}

	fn drop_entry(&mut self, entry: BoxedEntry<M>) {
		entry.destroy();
		self.dropped += 1;
	}

	fn release(&mut self) {
		self.flush();
		if let Some(claim) = self.claim.take() {
			self.results.pool().release(claim);
		}
	}
}

impl<M> Drop for Accumulator<'_, M> {
	fn drop(&mut self) {
		if !self.pending.is_empty() {
			let fitted = self.results.records().append(&self.pending);
			self.dropped += self.pending.len() - fitted;
			self.pending.clear();
		}
		if let Some(claim) = self.claim.take() {
			self.results.pool().release(claim);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::RankerConfig;

	fn label(context: &&'static str, _query: &Query) -> String {
		(*context).to_owned()
	}

	fn results(query: &str) -> ResultSet<String> {
		let config = RankerConfig {
			sheet_slots: 2,
			max_sheets: 2,
			..RankerConfig::default()
		};
		ResultSet::new(1, Query::new(query), &config)
	}

	#[test]
	fn unique_keys_are_spaced_and_disjoint_from_user_keys() {
		let keys = UniqueKeys::new(2);
		let first = keys.next_key();
		let second = keys.next_key();
		assert!(first & SYNTHETIC_KEY_BIT != 0);
		assert_eq!(second - first, 2);
		assert_eq!(USER_KEY_MASK & SYNTHETIC_KEY_BIT, 0);
	}

	#[test]
	fn spaces_fall_back_to_the_spaceless_needle() {
		let results = results("foo bar");
		let clock = GenerationClock::new();
		let keys = UniqueKeys::new(2);
		let mut acc = results.accumulator(&clock, &keys);
		assert!(acc.score("foo_bar").is_some());
		assert!(acc.score("foobar").is_some());
		assert!(acc.score("fooba").is_none());
	}

	#[test]
	fn resuming_scores_match_plain_scores() {
		let results = results("mod");
		let clock = GenerationClock::new();
		let keys = UniqueKeys::new(2);
		let mut acc = results.accumulator(&clock, &keys);
		for path in ["src/main.rs", "src/mod.rs", "src/model/mod.rs", "tests/io.rs"] {
			assert_eq!(acc.score_resuming(path), acc.score(path), "{path}");
		}
	}

	#[test]
	fn exhausted_storage_drops_and_destroys() {
		use std::sync::atomic::AtomicUsize;
		static DESTROYED: AtomicUsize = AtomicUsize::new(0);
		fn destroy(_: &'static str) {
			DESTROYED.fetch_add(1, Ordering::SeqCst);
		}

		let results = results("a");
		let clock = GenerationClock::new();
		let keys = UniqueKeys::new(2);
		let mut acc = results.accumulator(&clock, &keys);
		for _ in 0..5 {
			acc.insert_unique(10, label, "a", Some(destroy));
		}
		assert_eq!(DESTROYED.load(Ordering::SeqCst), 1);
		assert_eq!(acc.finish(), 1);
		assert_eq!(results.records().len(), 4);
	}

	#[test]
	fn staleness_follows_the_clock() {
		let results = results("a");
		let clock = GenerationClock::new();
		clock.begin();
		let keys = UniqueKeys::new(2);
		let acc = results.accumulator(&clock, &keys);
		assert!(!acc.is_stale());
		clock.begin();
		assert!(acc.is_stale());
	}
}
