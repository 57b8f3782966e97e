//! Bounded slab storage for candidate construction entries.
//!
//! A [`SheetPool`] hands out fixed-capacity [`Sheet`]s to accumulators without
//! locking. Partially filled sheets are pushed back onto a shared return stack
//! so the next accumulator keeps packing them before a fresh sheet is carved
//! out of the pool; the pool never grows past its configured ceiling.

use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crossbeam_queue::ArrayQueue;
use crossbeam_utils::{Backoff, CachePadded};
use tracing::trace;

use crate::query::Query;

/// Builds the materialized match from a stored context.
pub type Factory<C, M> = fn(&C, &Query) -> M;

/// Releases a stored context. Runs exactly once, at teardown.
pub type Destructor<C> = fn(C);

/// Type-erased construction entry.
pub(crate) trait Construct<M>: Send + Sync {
	fn build(&self, query: &Query) -> M;

	fn destroy(self: Box<Self>);
}

struct Entry<C, M> {
	context: C,
	factory: Factory<C, M>,
	destructor: Option<Destructor<C>>,
}

impl<C, M> Construct<M> for Entry<C, M>
where
	C: Send + Sync,
{
	fn build(&self, query: &Query) -> M {
		(self.factory)(&self.context, query)
	}

	fn destroy(self: Box<Self>) {
		let Entry {
			context,
			destructor,
			..
		} = *self;
		if let Some(destructor) = destructor {
			destructor(context);
		}
	}
}

pub(crate) type BoxedEntry<M> = Box<dyn Construct<M>>;

pub(crate) fn entry<C, M>(
	context: C,
	factory: Factory<C, M>,
	destructor: Option<Destructor<C>>,
) -> BoxedEntry<M>
where
	C: Send + Sync + 'static,
	M: 'static,
{
	Box::new(Entry {
		context,
		factory,
		destructor,
	})
}

/// Fixed-capacity slab of construction entries.
pub(crate) struct Sheet<M> {
	slots: Box<[OnceLock<BoxedEntry<M>>]>,
	/// Slots committed by the last claimant, published on release.
	filled: AtomicU32,
}

impl<M> Sheet<M> {
	/// Allocate a sheet, or `None` when the allocator refuses.
	fn try_new(capacity: u32) -> Option<Self> {
		let mut slots = Vec::new();
		slots.try_reserve_exact(capacity as usize).ok()?;
		slots.extend((0..capacity).map(|_| OnceLock::new()));
		Some(Self {
			slots: slots.into_boxed_slice(),
			filled: AtomicU32::new(0),
		})
	}

	pub(crate) fn entry(&self, slot: u32) -> Option<&BoxedEntry<M>> {
		self.slots.get(slot as usize)?.get()
	}

	/// Store an entry. Only the current claimant writes, and each slot once.
	fn store(&self, slot: u32, entry: BoxedEntry<M>) -> Result<(), BoxedEntry<M>> {
		match self.slots.get(slot as usize) {
			Some(cell) => cell.set(entry),
			None => Err(entry),
		}
	}

	/// Run every stored entry's destructor. Returns how many ran.
	fn teardown(&mut self) -> usize {
		let mut destroyed = 0;
		for cell in self.slots.iter_mut() {
			if let Some(entry) = cell.take() {
				entry.destroy();
				destroyed += 1;
			}
		}
		destroyed
	}
}

/// Exclusive hold on one sheet.
#[derive(Debug)]
pub(crate) struct SheetClaim {
	pub(crate) index: u32,
	pub(crate) filled: u32,
}

/// Bounded pool of sheets shared by every accumulator of one search.
pub(crate) struct SheetPool<M> {
	generation: u64,
	sheet_slots: u32,
	sheets: Box<[OnceLock<Sheet<M>>]>,
	allocated: CachePadded<AtomicUsize>,
	returned: ArrayQueue<u32>,
	exhausted: AtomicBool,
}

impl<M> SheetPool<M> {
	pub(crate) fn new(generation: u64, sheet_slots: u32, max_sheets: u32) -> Self {
		Self {
			generation,
			sheet_slots,
			sheets: (0..max_sheets).map(|_| OnceLock::new()).collect(),
			allocated: CachePadded::new(AtomicUsize::new(0)),
			// ArrayQueue rejects a zero capacity
			returned: ArrayQueue::new(max_sheets.max(1) as usize),
			exhausted: AtomicBool::new(false),
		}
	}

	/// Sheets carved out of the pool so far.
	pub(crate) fn allocated(&self) -> usize {
		self.allocated.load(Ordering::Acquire).min(self.sheets.len())
	}

	pub(crate) fn sheet(&self, index: u32) -> Option<&Sheet<M>> {
		self.sheets.get(index as usize)?.get()
	}

	pub(crate) fn entry(&self, sheet: u32, slot: u32) -> Option<&BoxedEntry<M>> {
		self.sheet(sheet)?.entry(slot)
	}

	/// Claim a sheet with at least one free slot.
	///
	/// Reuses a partially filled sheet when one is waiting, otherwise bumps
	/// the allocation counter. Returns `None` once the ceiling is reached or
	/// the allocator fails.
	pub(crate) fn acquire(&self) -> Option<SheetClaim> {
		if let Some(index) = self.returned.pop() {
			let filled = self.sheets[index as usize]
				.get()
				.map_or(self.sheet_slots, |sheet| sheet.filled.load(Ordering::Acquire));
			return Some(SheetClaim { index, filled });
		}

		let backoff = Backoff::new();
		let mut current = self.allocated.load(Ordering::Relaxed);
		loop {
			if current >= self.sheets.len() {
				if !self.exhausted.swap(true, Ordering::Relaxed) {
					trace!(
						generation = self.generation,
						max_sheets = self.sheets.len(),
						"sheet pool exhausted; dropping further candidates"
					);
				}
				return None;
			}
			match self.allocated.compare_exchange_weak(
				current,
				current + 1,
				Ordering::AcqRel,
				Ordering::Relaxed,
			) {
				Ok(_) => break,
				Err(actual) => {
					current = actual;
					backoff.spin();
				}
			}
		}

		let sheet = Sheet::try_new(self.sheet_slots)?;
		// The index came from a unique counter value, so the cell is empty.
		let _ = self.sheets[current].set(sheet);
		Some(SheetClaim {
			index: current as u32,
			filled: 0,
		})
	}

	/// Write an entry into the claimed sheet's next slot.
	pub(crate) fn store(&self, claim: &mut SheetClaim, entry: BoxedEntry<M>) -> Result<u32, BoxedEntry<M>> {
		let Some(sheet) = self.sheet(claim.index) else {
			return Err(entry);
		};
		let slot = claim.filled;
		sheet.store(slot, entry)?;
		claim.filled += 1;
		Ok(slot)
	}

	/// Give a claim back. Sheets with free slots return to the shared stack.
	pub(crate) fn release(&self, claim: SheetClaim) {
		if claim.filled >= self.sheet_slots {
			return;
		}
		let Some(sheet) = self.sheet(claim.index) else {
			return;
		};
		sheet.filled.store(claim.filled, Ordering::Release);
		// Each sheet is on the stack at most once, and the stack holds every sheet.
		let _ = self.returned.push(claim.index);
	}

	/// Destroy every stored entry. Returns how many destructors ran.
	pub(crate) fn teardown(&mut self) -> usize {
		self.sheets
			.iter_mut()
			.filter_map(OnceLock::get_mut)
			.map(Sheet::teardown)
			.sum()
	}
}
