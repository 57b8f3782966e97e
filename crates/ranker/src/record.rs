//! Packed candidate records and the shared flat buffer they are flushed into.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;

const KEY_SHIFT: u32 = 96;
const SCORE_SHIFT: u32 = 80;
const SOURCE_SHIFT: u32 = 64;
const SHEET_SHIFT: u32 = 32;

/// One ranked candidate packed into 128 bits.
///
/// ```text
/// 127        96 95      80 79      64 63        32 31         0
/// | dedup key  |  score   |  source  |   sheet    |    slot    |
/// ```
///
/// The dedup key occupies the high bits so that sorting on the key's bytes
/// groups duplicates; a key of `0` never collides with anything. A score of
/// `0` marks a discarded duplicate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Record(u128);

impl Record {
	#[must_use]
	pub const fn pack(key: u32, score: u16, source: u16, sheet: u32, slot: u32) -> Self {
		Self(
			(key as u128) << KEY_SHIFT
				| (score as u128) << SCORE_SHIFT
				| (source as u128) << SOURCE_SHIFT
				| (sheet as u128) << SHEET_SHIFT
				| slot as u128,
		)
	}

	#[must_use]
	pub const fn key(self) -> u32 {
		(self.0 >> KEY_SHIFT) as u32
	}

	#[must_use]
	pub const fn score(self) -> u16 {
		(self.0 >> SCORE_SHIFT) as u16
	}

	#[must_use]
	pub const fn source(self) -> u16 {
		(self.0 >> SOURCE_SHIFT) as u16
	}

	#[must_use]
	pub const fn sheet(self) -> u32 {
		(self.0 >> SHEET_SHIFT) as u32
	}

	#[must_use]
	pub const fn slot(self) -> u32 {
		self.0 as u32
	}

	/// Copy of the record with its score cleared.
	#[must_use]
	pub const fn discarded(self) -> Self {
		Self(self.0 & !((u16::MAX as u128) << SCORE_SHIFT))
	}

	#[must_use]
	pub const fn is_discarded(self) -> bool {
		self.score() == 0
	}

	/// Byte `pass` (0 = least significant) of the dedup key.
	#[inline]
	pub(crate) const fn key_digit(self, pass: u32) -> usize {
		((self.key() >> (pass * 8)) & 0xFF) as usize
	}

	/// Byte `pass` of the score, inverted so ascending buckets rank high
	/// scores first.
	#[inline]
	pub(crate) const fn score_digit(self, pass: u32) -> usize {
		0xFF - ((self.score() >> (pass * 8)) & 0xFF) as usize
	}

	const fn halves(self) -> (u64, u64) {
		((self.0 >> 64) as u64, self.0 as u64)
	}

	const fn from_halves(hi: u64, lo: u64) -> Self {
		Self((hi as u128) << 64 | lo as u128)
	}
}

/// A record slot that many threads may write without locking.
///
/// Every slot is written by exactly one thread between two synchronisation
/// points (a flush reservation or a merge barrier), so the two halves never
/// tear in practice; relaxed ordering is enough and the surrounding
/// acquire/release edges publish the values.
#[derive(Debug, Default)]
pub struct AtomicRecord {
	hi: AtomicU64,
	lo: AtomicU64,
}

impl AtomicRecord {
	#[must_use]
	pub fn new(record: Record) -> Self {
		let (hi, lo) = record.halves();
		Self {
			hi: AtomicU64::new(hi),
			lo: AtomicU64::new(lo),
		}
	}

	#[inline]
	pub fn load(&self) -> Record {
		Record::from_halves(
			self.hi.load(Ordering::Relaxed),
			self.lo.load(Ordering::Relaxed),
		)
	}

	#[inline]
	pub fn store(&self, record: Record) {
		let (hi, lo) = record.halves();
		self.hi.store(hi, Ordering::Relaxed);
		self.lo.store(lo, Ordering::Relaxed);
	}
}

/// Marks a reserved slot that never received a record. No real record can
/// carry it: sheet indices stay below `u32::MAX`.
const VACANT: Record = Record(u128::MAX);

/// Bounded array that accumulators append to in bulk.
///
/// Storage is split into segments that are allocated on first write, so an
/// idle search costs one empty cell per segment. A segment the allocator
/// refuses leaves its records unwritten; they count as dropped.
#[derive(Debug)]
pub struct RecordBuffer {
	segments: Box<[OnceLock<Box<[AtomicRecord]>>]>,
	segment_len: usize,
	len: CachePadded<AtomicUsize>,
}

impl RecordBuffer {
	#[must_use]
	pub fn new(segment_len: usize, segments: usize) -> Self {
		Self {
			segments: (0..segments).map(|_| OnceLock::new()).collect(),
			segment_len: segment_len.max(1),
			len: CachePadded::new(AtomicUsize::new(0)),
		}
	}

	/// A buffer of `capacity` slots in one segment.
	#[must_use]
	pub fn with_capacity(capacity: usize) -> Self {
		Self::new(capacity, usize::from(capacity > 0))
	}

	#[must_use]
	pub fn capacity(&self) -> usize {
		self.segment_len.saturating_mul(self.segments.len())
	}

	/// Slots reserved so far, clamped to the capacity.
	#[must_use]
	pub fn len(&self) -> usize {
		self.len.load(Ordering::Acquire).min(self.capacity())
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Segments that have been allocated.
	#[must_use]
	pub fn allocated_segments(&self) -> usize {
		self.segments.iter().filter(|cell| cell.get().is_some()).count()
	}

	fn segment(&self, index: usize) -> Option<&[AtomicRecord]> {
		let cell = self.segments.get(index)?;
		if let Some(segment) = cell.get() {
			return Some(&**segment);
		}
		let mut slots = Vec::new();
		slots.try_reserve_exact(self.segment_len).ok()?;
		slots.extend((0..self.segment_len).map(|_| AtomicRecord::new(VACANT)));
		// A racing writer may have won; its segment is kept and ours dropped.
		let _ = cell.set(slots.into_boxed_slice());
		cell.get().map(|segment| &**segment)
	}

	/// Reserve a contiguous range with one `fetch_add` and copy `records` in.
	///
	/// Returns how many records were stored; the rest are dropped.
	pub fn append(&self, records: &[Record]) -> usize {
		if records.is_empty() {
			return 0;
		}
		let start = self.len.fetch_add(records.len(), Ordering::AcqRel);
		let end = start.saturating_add(records.len()).min(self.capacity());
		let mut stored = 0;
		let mut index = start;
		while index < end {
			let segment_index = index / self.segment_len;
			let offset = index % self.segment_len;
			let run = (self.segment_len - offset).min(end - index);
			if let Some(segment) = self.segment(segment_index) {
				let batch = &records[index - start..index - start + run];
				for (slot, record) in segment[offset..offset + run].iter().zip(batch) {
					slot.store(*record);
				}
				stored += run;
			}
			index += run;
		}
		stored
	}

	/// Copy the stored records out as one contiguous array, skipping slots
	/// that were reserved but never written.
	#[must_use]
	pub fn gather(&self) -> Vec<AtomicRecord> {
		self.records().map(AtomicRecord::new).collect()
	}

	/// Copy the stored records out.
	#[must_use]
	pub fn snapshot(&self) -> Vec<Record> {
		self.records().collect()
	}

	fn records(&self) -> impl Iterator<Item = Record> + '_ {
		let len = self.len();
		self.segments
			.iter()
			.enumerate()
			.filter_map(|(index, cell)| Some((index, cell.get()?)))
			.flat_map(move |(index, segment)| {
				let start = index.saturating_mul(self.segment_len);
				let live = len.saturating_sub(start).min(segment.len());
				segment[..live].iter()
			})
			.map(AtomicRecord::load)
			.filter(|record| *record != VACANT)
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn discarding_only_clears_the_score() {
		let record = Record::pack(7, 900, 3, 2, 1);
		let discarded = record.discarded();
		assert!(discarded.is_discarded());
		assert_eq!(discarded.key(), 7);
		assert_eq!(discarded.source(), 3);
		assert_eq!((discarded.sheet(), discarded.slot()), (2, 1));
	}

	#[test]
	fn score_digits_invert_for_descending_order() {
		let high = Record::pack(0, 0x0200, 0, 0, 0);
		let low = Record::pack(0, 0x0100, 0, 0, 0);
		assert!(high.score_digit(1) < low.score_digit(1));
		assert_eq!(high.score_digit(0), 0xFF);
	}

	#[test]
	fn append_reserves_disjoint_ranges() {
		let buffer = RecordBuffer::with_capacity(8);
		let first: Vec<_> = (0..3).map(|i| Record::pack(i, 1, 0, 0, i)).collect();
		let second: Vec<_> = (3..5).map(|i| Record::pack(i, 1, 0, 0, i)).collect();
		assert_eq!(buffer.append(&first), 3);
		assert_eq!(buffer.append(&second), 2);
		let keys: Vec<_> = buffer.snapshot().iter().map(|r| r.key()).collect();
		assert_eq!(keys, vec![0, 1, 2, 3, 4]);
	}

	#[test]
	fn append_past_capacity_is_clamped() {
		let buffer = RecordBuffer::with_capacity(2);
		let records = vec![Record::pack(1, 1, 0, 0, 0); 3];
		assert_eq!(buffer.append(&records), 2);
		assert_eq!(buffer.append(&records), 0);
		assert_eq!(buffer.len(), 2);
	}

	#[test]
	fn segments_are_allocated_on_first_write() {
		let buffer = RecordBuffer::new(4, 3);
		assert_eq!(buffer.capacity(), 12);
		assert_eq!(buffer.allocated_segments(), 0);
		assert!(buffer.snapshot().is_empty());

		let records: Vec<_> = (1..=6).map(|i| Record::pack(i, 1, 0, 0, i)).collect();
		assert_eq!(buffer.append(&records), 6);
		assert_eq!(buffer.allocated_segments(), 2);
		let keys: Vec<_> = buffer.gather().iter().map(|r| r.load().key()).collect();
		assert_eq!(keys, vec![1, 2, 3, 4, 5, 6]);
	}

	#[test]
	fn a_huge_ceiling_costs_nothing_until_used() {
		let buffer = RecordBuffer::new(u32::MAX as usize, 1024);
		assert_eq!(buffer.allocated_segments(), 0);
		assert!(buffer.is_empty());
		assert!(buffer.gather().is_empty());
	}

	proptest! {
		#[test]
		fn pack_round_trips(
			key in any::<u32>(),
			score in any::<u16>(),
			source in any::<u16>(),
			sheet in any::<u32>(),
			slot in any::<u32>(),
		) {
			let record = Record::pack(key, score, source, sheet, slot);
			prop_assert_eq!(record.key(), key);
			prop_assert_eq!(record.score(), score);
			prop_assert_eq!(record.source(), source);
			prop_assert_eq!(record.sheet(), sheet);
			prop_assert_eq!(record.slot(), slot);
			prop_assert_eq!(AtomicRecord::new(record).load(), record);
		}
	}
}
