//! Fixed pool of named worker threads fed by a job queue.

use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{trace, warn};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
	Run(Job),
	Shutdown,
}

/// Cloneable handle for queueing jobs, including from inside a job.
#[derive(Clone)]
pub(crate) struct Spawner {
	sender: Sender<Message>,
}

impl Spawner {
	/// Queue `job`. Returns `false` once the pool has shut down; the job is
	/// dropped unrun.
	pub(crate) fn execute<F>(&self, job: F) -> bool
	where
		F: FnOnce() + Send + 'static,
	{
		self.sender.send(Message::Run(Box::new(job))).is_ok()
	}
}

pub(crate) struct WorkerPool {
	spawner: Spawner,
	workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
	pub(crate) fn new(size: usize) -> io::Result<Self> {
		let (sender, receiver) = unbounded();
		let mut pool = Self {
			spawner: Spawner { sender },
			workers: Vec::with_capacity(size),
		};
		for index in 0..size.max(1) {
			let receiver = receiver.clone();
			// On error the partial pool is dropped, which stops the workers
			// spawned so far.
			let handle = thread::Builder::new()
				.name(format!("frz-ranker-{index}"))
				.spawn(move || worker_loop(&receiver))?;
			pool.workers.push(handle);
		}
		Ok(pool)
	}

	pub(crate) fn size(&self) -> usize {
		self.workers.len()
	}

	pub(crate) fn spawner(&self) -> Spawner {
		self.spawner.clone()
	}

	pub(crate) fn execute<F>(&self, job: F) -> bool
	where
		F: FnOnce() + Send + 'static,
	{
		self.spawner.execute(job)
	}
}

fn worker_loop(receiver: &Receiver<Message>) {
	while let Ok(message) = receiver.recv() {
		match message {
			Message::Run(job) => {
				if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
					warn!(thread = ?thread::current().name(), "ranker job panicked");
				}
			}
			Message::Shutdown => break,
		}
	}
	trace!(thread = ?thread::current().name(), "ranker worker stopped");
}

impl Drop for WorkerPool {
	/// Jobs queued before the drop still run; jobs they queue afterwards are
	/// dropped unrun.
	fn drop(&mut self) {
		for _ in &self.workers {
			let _ = self.spawner.sender.send(Message::Shutdown);
		}
		let current = thread::current().id();
		for handle in self.workers.drain(..) {
			if handle.thread().id() == current {
				continue;
			}
			if handle.join().is_err() {
				warn!("ranker worker panicked");
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Arc;
	use std::sync::atomic::{AtomicUsize, Ordering};

	use super::*;

	#[test]
	fn queued_jobs_run_before_shutdown() {
		let counter = Arc::new(AtomicUsize::new(0));
		{
			let pool = WorkerPool::new(3).expect("pool");
			assert_eq!(pool.size(), 3);
			for _ in 0..50 {
				let counter = Arc::clone(&counter);
				pool.execute(move || {
					counter.fetch_add(1, Ordering::SeqCst);
				});
			}
		}
		assert_eq!(counter.load(Ordering::SeqCst), 50);
	}

	#[test]
	fn jobs_can_queue_follow_ups() {
		let counter = Arc::new(AtomicUsize::new(0));
		let (done_tx, done_rx) = crossbeam_channel::bounded(1);
		let pool = WorkerPool::new(2).expect("pool");
		let spawner = pool.spawner();
		let inner = Arc::clone(&counter);
		pool.execute(move || {
			inner.fetch_add(1, Ordering::SeqCst);
			let inner = Arc::clone(&inner);
			spawner.execute(move || {
				inner.fetch_add(1, Ordering::SeqCst);
				let _ = done_tx.send(());
			});
		});
		done_rx.recv().expect("follow-up ran");
		assert_eq!(counter.load(Ordering::SeqCst), 2);
	}

	#[test]
	fn a_panicking_job_does_not_stop_its_worker() {
		let (done_tx, done_rx) = crossbeam_channel::bounded(1);
		let pool = WorkerPool::new(1).expect("pool");
		pool.execute(|| panic!("job failure"));
		pool.execute(move || {
			let _ = done_tx.send(thread::current().name().map(str::to_owned));
		});
		let name = done_rx
			.recv_timeout(std::time::Duration::from_secs(5))
			.expect("second job ran");
		assert_eq!(name.as_deref(), Some("frz-ranker-0"));
	}
}
