use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic search generation counter.
///
/// Every search stamps its work with the value returned by [`begin`]. Workers
/// compare their stamp against [`current`] between shards and stop once a
/// newer search has started; the check is cooperative and never interrupts a
/// shard that is already running.
///
/// [`begin`]: GenerationClock::begin
/// [`current`]: GenerationClock::current
#[derive(Debug, Default)]
pub struct GenerationClock {
	current: AtomicU64,
}

impl GenerationClock {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Advance the clock and return the new generation.
	pub fn begin(&self) -> u64 {
		self.current.fetch_add(1, Ordering::AcqRel) + 1
	}

	/// The latest generation handed out.
	#[must_use]
	pub fn current(&self) -> u64 {
		self.current.load(Ordering::Acquire)
	}

	/// Whether work stamped with `generation` has been superseded.
	#[must_use]
	pub fn is_stale(&self, generation: u64) -> bool {
		generation < self.current()
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::thread;

	use super::*;

	#[test]
	fn begin_supersedes_previous_generations() {
		let clock = GenerationClock::new();
		let first = clock.begin();
		assert!(!clock.is_stale(first));
		let second = clock.begin();
		assert!(second > first);
		assert!(clock.is_stale(first));
		assert!(!clock.is_stale(second));
	}

	#[test]
	fn concurrent_begins_hand_out_distinct_generations() {
		let clock = Arc::new(GenerationClock::new());
		let handles: Vec<_> = (0..4)
			.map(|_| {
				let clock = Arc::clone(&clock);
				thread::spawn(move || (0..100).map(|_| clock.begin()).collect::<Vec<_>>())
			})
			.collect();
		let mut all: Vec<u64> = handles
			.into_iter()
			.flat_map(|handle| handle.join().expect("join"))
			.collect();
		all.sort_unstable();
		all.dedup();
		assert_eq!(all.len(), 400);
		assert_eq!(clock.current(), 400);
	}
}
