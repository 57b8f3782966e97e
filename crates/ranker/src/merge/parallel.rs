//! Phased parallel variant of the merge, run on the session's worker pool.
//!
//! The buffer is split into contiguous partitions. The merge is a fixed list
//! of steps; the thread that started the merge queues helper jobs for each
//! step, claims partitions alongside them, and waits until every partition of
//! the step is done before moving on. Helpers that start late find nothing
//! left to claim, so the merge completes even when every other worker is busy.
//!
//! Each radix pass is two steps: every partition publishes its histogram,
//! then derives disjoint scatter offsets from all histograms and scatters.
//! Dedup is two steps as well: a read-only one where each partition resolves
//! the runs inside it and records its edges, then a write step where the
//! owner of each run that crosses a partition boundary reconciles it left to
//! right.

use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use crossbeam_utils::Backoff;

use super::{KEY_PASSES, SCORE_PASSES, same_run};
use crate::pool::Spawner;
use crate::record::{AtomicRecord, Record};

/// Best record of a run segment.
#[derive(Clone, Copy, Debug)]
struct Best {
	index: usize,
	score: u16,
}

/// How a partition's first and last run segments meet its neighbours.
#[derive(Clone, Copy, Debug)]
struct Edges {
	/// The first record continues the run ending the previous partition.
	joins_prev: bool,
	/// One run segment covers the whole partition.
	spans_all: bool,
	/// The next partition's first record continues the last run here.
	continues_next: bool,
	head: Best,
	tail: Best,
}

#[derive(Clone, Copy, Debug)]
enum Digit {
	Key(u32),
	Score(u32),
}

/// One stable scatter pass. Forward passes move records into scratch,
/// backward passes move them back, so every sort ends in `records`.
#[derive(Clone, Copy, Debug)]
struct Pass {
	digit: Digit,
	forward: bool,
}

impl Pass {
	fn bucket(self, record: Record) -> usize {
		match self.digit {
			Digit::Key(pass) => record.key_digit(pass),
			Digit::Score(pass) => record.score_digit(pass),
		}
	}
}

#[derive(Clone, Copy, Debug)]
enum Step {
	Count(Pass),
	Scatter(Pass),
	Resolve,
	Apply,
}

fn push_pass(steps: &mut Vec<Step>, digit: Digit, forward: bool) {
	let pass = Pass { digit, forward };
	steps.push(Step::Count(pass));
	steps.push(Step::Scatter(pass));
}

fn steps(dedup: bool) -> Vec<Step> {
	let mut steps = Vec::new();
	if dedup {
		for pass in 0..KEY_PASSES {
			push_pass(&mut steps, Digit::Key(pass), pass % 2 == 0);
		}
		steps.extend([Step::Resolve, Step::Apply]);
	}
	for pass in 0..SCORE_PASSES {
		push_pass(&mut steps, Digit::Score(pass), pass % 2 == 0);
	}
	steps
}

/// Partition claims for one step.
#[derive(Debug, Default)]
struct Progress {
	next: AtomicUsize,
	done: AtomicUsize,
}

struct Shared {
	records: Box<[AtomicRecord]>,
	scratch: Box<[AtomicRecord]>,
	partitions: Vec<Range<usize>>,
	histograms: Vec<[AtomicUsize; 256]>,
	edges: Vec<OnceLock<Edges>>,
	discards: Vec<OnceLock<Vec<usize>>>,
	steps: Vec<Step>,
	progress: Vec<Progress>,
	duplicates: AtomicUsize,
	window: u32,
}

/// Dedup and rank `records` in `threads` partitions, with up to
/// `threads - 1` helper jobs per step queued on `helpers`. Produces the same
/// order as the serial merge. Returns the ranked records and the number of
/// discarded duplicates.
pub(crate) fn merge_parallel(
	records: Vec<AtomicRecord>,
	window: u32,
	dedup: bool,
	threads: usize,
	helpers: Option<&Spawner>,
) -> (Vec<Record>, usize) {
	let total = records.len();
	if total == 0 {
		return (Vec::new(), 0);
	}
	let chunk = total.div_ceil(threads.clamp(1, total));
	let partitions: Vec<_> = (0..total)
		.step_by(chunk)
		.map(|start| start..(start + chunk).min(total))
		.collect();
	let count = partitions.len();
	let steps = steps(dedup);

	let shared = Arc::new(Shared {
		records: records.into_boxed_slice(),
		scratch: (0..total).map(|_| AtomicRecord::default()).collect(),
		histograms: (0..count)
			.map(|_| std::array::from_fn(|_| AtomicUsize::new(0)))
			.collect(),
		edges: (0..count).map(|_| OnceLock::new()).collect(),
		discards: (0..count).map(|_| OnceLock::new()).collect(),
		progress: steps.iter().map(|_| Progress::default()).collect(),
		steps,
		duplicates: AtomicUsize::new(0),
		partitions,
		window,
	});

	for step in 0..shared.steps.len() {
		if let Some(spawner) = helpers {
			for _ in 1..count {
				let shared = Arc::clone(&shared);
				if !spawner.execute(move || shared.work(step)) {
					break;
				}
			}
		}
		shared.work(step);
		shared.wait(step);
	}

	let merged = shared.records.iter().map(AtomicRecord::load).collect();
	(merged, shared.duplicates.load(Ordering::Relaxed))
}

impl Shared {
	/// Claim and run partitions of `step` until none are left.
	fn work(&self, step: usize) {
		let progress = &self.progress[step];
		loop {
			let partition = progress.next.fetch_add(1, Ordering::AcqRel);
			if partition >= self.partitions.len() {
				return;
			}
			self.perform(self.steps[step], partition);
			progress.done.fetch_add(1, Ordering::Release);
		}
	}

	fn wait(&self, step: usize) {
		let backoff = Backoff::new();
		while self.progress[step].done.load(Ordering::Acquire) < self.partitions.len() {
			backoff.snooze();
		}
	}

	fn perform(&self, step: Step, partition: usize) {
		let range = self.partitions[partition].clone();
		match step {
			Step::Count(pass) => self.count(partition, &range, pass),
			Step::Scatter(pass) => self.scatter(partition, &range, pass),
			Step::Resolve => {
				let discards = self.resolve_local(partition, &range);
				let _ = self.discards[partition].set(discards);
			}
			Step::Apply => {
				let discards = self.discards[partition].get().map_or(&[][..], Vec::as_slice);
				self.apply(partition, discards);
			}
		}
	}

	fn buffers(&self, pass: Pass) -> (&[AtomicRecord], &[AtomicRecord]) {
		if pass.forward {
			(&self.records[..], &self.scratch[..])
		} else {
			(&self.scratch[..], &self.records[..])
		}
	}

	fn count(&self, partition: usize, range: &Range<usize>, pass: Pass) {
		let (from, _) = self.buffers(pass);
		let mut counts = [0usize; 256];
		for slot in &from[range.clone()] {
			counts[pass.bucket(slot.load())] += 1;
		}
		for (cell, count) in self.histograms[partition].iter().zip(counts) {
			cell.store(count, Ordering::Relaxed);
		}
	}

	fn scatter(&self, partition: usize, range: &Range<usize>, pass: Pass) {
		let (from, to) = self.buffers(pass);
		let mut offsets = [0usize; 256];
		let mut running = 0;
		for (bucket, offset) in offsets.iter_mut().enumerate() {
			let mut before = 0;
			let mut all = 0;
			for (other, histogram) in self.histograms.iter().enumerate() {
				let count = histogram[bucket].load(Ordering::Relaxed);
				if other < partition {
					before += count;
				}
				all += count;
			}
			*offset = running + before;
			running += all;
		}

		for slot in &from[range.clone()] {
			let record = slot.load();
			let bucket = pass.bucket(record);
			to[offsets[bucket]].store(record);
			offsets[bucket] += 1;
		}
	}

	/// Read-only dedup of the runs inside one partition. Publishes the
	/// partition's edges and returns the local losers.
	fn resolve_local(&self, partition: usize, range: &Range<usize>) -> Vec<usize> {
		let key = |index: usize| self.records[index].load().key();
		let first = self.records[range.start].load();

		let mut discards = Vec::new();
		let mut head = None;
		let mut best = Best {
			index: range.start,
			score: first.score(),
		};
		for index in range.start + 1..range.end {
			let record = self.records[index].load();
			if !same_run(key(index - 1), record.key(), self.window) {
				head.get_or_insert(best);
				best = Best {
					index,
					score: record.score(),
				};
			} else if record.score() > best.score {
				discards.push(best.index);
				best = Best {
					index,
					score: record.score(),
				};
			} else {
				discards.push(index);
			}
		}

		let edges = Edges {
			joins_prev: range.start > 0 && same_run(key(range.start - 1), first.key(), self.window),
			spans_all: head.is_none(),
			continues_next: range.end < self.records.len()
				&& same_run(key(range.end - 1), key(range.end), self.window),
			head: head.unwrap_or(best),
			tail: best,
		};
		let _ = self.edges[partition].set(edges);
		discards
	}

	/// Write local discards, then settle the run that starts in this
	/// partition and crosses into the next ones, if any.
	fn apply(&self, partition: usize, discards: &[usize]) {
		for &index in discards {
			self.discard(index);
		}
		let mut duplicates = discards.len();

		if let Some(edges) = self.edges[partition].get() {
			let owns_tail = !(edges.spans_all && edges.joins_prev);
			if edges.continues_next && owns_tail {
				let mut best = edges.tail;
				for next in self.edges[partition + 1..].iter().filter_map(OnceLock::get) {
					if next.head.score > best.score {
						self.discard(best.index);
						best = next.head;
					} else {
						self.discard(next.head.index);
					}
					duplicates += 1;
					if !(next.spans_all && next.continues_next) {
						break;
					}
				}
			}
		}

		self.duplicates.fetch_add(duplicates, Ordering::Relaxed);
	}

	fn discard(&self, index: usize) {
		let slot = &self.records[index];
		slot.store(slot.load().discarded());
	}
}
