//! Search sessions: fan-out of shards to workers, completion, publication.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::accumulator::UniqueKeys;
use crate::config::RankerConfig;
use crate::error::{RegistryError, SessionError};
use crate::generation::GenerationClock;
use crate::pool::{Spawner, WorkerPool};
use crate::query::Query;
use crate::result_set::ResultSet;
use crate::source::{Source, SourceFilter, SourceId, SourceRegistry, ShardTicket};

type Consumer<M> = Box<dyn Fn(&Arc<ResultSet<M>>) + Send + Sync>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared<M> {
	config: RankerConfig,
	clock: GenerationClock,
	unique: UniqueKeys,
	sources: RwLock<SourceRegistry<M>>,
	published: Mutex<Option<Arc<ResultSet<M>>>>,
	ready: Condvar,
	/// Newest generation handed to the consumer.
	notified: Mutex<u64>,
	consumer: RwLock<Option<Consumer<M>>>,
	spawner: Spawner,
}

impl<M: Send + Sync + 'static> Shared<M> {
	/// Expose `results` unless a newer generation has started or already
	/// been published, then hand it to the consumer.
	///
	/// The consumer runs after the publication lock is released, so it may
	/// call back into the session. Consumer calls are serialized and never
	/// go backwards: a set overtaken by a newer one before its turn is
	/// skipped.
	fn publish(&self, results: Arc<ResultSet<M>>) -> bool {
		let generation = results.generation();
		let previous = {
			let mut published = lock(&self.published);
			let superseded = published
				.as_ref()
				.is_some_and(|current| current.generation() >= generation);
			if superseded || self.clock.is_stale(generation) {
				debug!(generation, "rejected stale result set");
				return false;
			}
			let previous = published.replace(Arc::clone(&results));
			self.ready.notify_all();
			previous
		};

		if let Some(previous) = previous {
			// Teardown runs destructors; keep it off the publishing path.
			self.spawner.execute(move || drop(previous));
		}

		let mut notified = lock(&self.notified);
		if *notified >= generation {
			debug!(generation, "consumer already saw a newer result set");
			return true;
		}
		*notified = generation;
		if let Some(consumer) = self
			.consumer
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.as_ref()
		{
			consumer(&results);
		}
		true
	}
}

/// One search generation in flight.
struct SearchTask<M> {
	shared: Arc<Shared<M>>,
	results: Arc<ResultSet<M>>,
	sources: Vec<Arc<dyn Source<M>>>,
	tickets: Vec<ShardTicket>,
	/// Tickets not yet handed out, counting down.
	cursor: AtomicUsize,
	/// Tasks still running; the one that takes it to zero finalizes.
	remaining: AtomicUsize,
	started: Instant,
}

impl<M: Send + Sync + 'static> SearchTask<M> {
	fn next_ticket(&self) -> Option<ShardTicket> {
		let left = self
			.cursor
			.fetch_update(Ordering::AcqRel, Ordering::Acquire, |left| left.checked_sub(1))
			.ok()?;
		self.tickets.get(self.tickets.len() - left).copied()
	}

	fn run(&self) {
		let shared = &self.shared;
		let generation = self.results.generation();
		let mut results = self.results.accumulator(&shared.clock, &shared.unique);

		while !shared.clock.is_stale(generation) {
			let Some(ticket) = self.next_ticket() else {
				break;
			};
			let Some(source) = self.sources.get(usize::from(ticket.source().index())) else {
				continue;
			};
			results.set_source(ticket.source());
			let shard = ticket.shard();
			let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
				source.search_shard(shard, &mut results);
			}));
			if outcome.is_err() {
				warn!(source = source.name(), shard, generation, "source panicked; shard skipped");
			}
		}

		let dropped = results.finish();
		if dropped > 0 {
			debug!(generation, dropped, "candidates dropped");
		}
		if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
			self.finalize();
		}
	}

	fn finalize(&self) {
		let shared = &self.shared;
		let generation = self.results.generation();
		if shared.clock.is_stale(generation) {
			debug!(generation, "abandoned stale search");
			return;
		}
		self.results
			.freeze_with(&shared.config.merge_options(), Some(&shared.spawner));
		let published = shared.publish(Arc::clone(&self.results));
		debug!(
			generation,
			published,
			count = self.results.count(),
			elapsed_ms = self.started.elapsed().as_millis() as u64,
			"search finished"
		);
	}
}

/// A ranking session: sources, a worker pool, and the published results.
///
/// Each [`begin_search`](Self::begin_search) starts a new generation, which
/// cancels every older search cooperatively. When the last worker of a
/// generation finishes, its results are merged, published to the consumer
/// registered with [`on_publish`](Self::on_publish), and become
/// [`latest`](Self::latest). A generation that was superseded is never
/// published.
pub struct Session<M> {
	pool: WorkerPool,
	shared: Arc<Shared<M>>,
}

impl<M: Send + Sync + 'static> Session<M> {
	/// Validate `config` and start the worker pool.
	pub fn new(config: RankerConfig) -> Result<Self, SessionError> {
		config.validate()?;
		let pool = WorkerPool::new(config.workers)?;
		let shared = Arc::new(Shared {
			unique: UniqueKeys::new(config.dedup_window),
			clock: GenerationClock::new(),
			sources: RwLock::new(SourceRegistry::new()),
			published: Mutex::new(None),
			ready: Condvar::new(),
			notified: Mutex::new(0),
			consumer: RwLock::new(None),
			spawner: pool.spawner(),
			config,
		});
		debug!(workers = pool.size(), "ranker session started");
		Ok(Self { pool, shared })
	}

	#[must_use]
	pub fn config(&self) -> &RankerConfig {
		&self.shared.config
	}

	/// Register a source for future searches.
	pub fn register<S>(&self, source: S) -> Result<SourceId, RegistryError>
	where
		S: Source<M> + 'static,
	{
		self.shared
			.sources
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.register(source)
	}

	/// Names of registered sources, in registration order.
	#[must_use]
	pub fn source_names(&self) -> Vec<String> {
		self.shared
			.sources
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.iter()
			.map(|source| source.name().to_owned())
			.collect()
	}

	/// Fail if `filter` names a source that is not registered.
	pub fn check_filter(&self, filter: &SourceFilter) -> Result<(), RegistryError> {
		self.shared
			.sources
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.check(filter)
	}

	/// Name of the source behind `id`.
	#[must_use]
	pub fn source_name(&self, id: SourceId) -> Option<String> {
		self.shared
			.sources
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.get(id)
			.map(|source| source.name().to_owned())
	}

	/// Install the callback invoked with each published generation.
	///
	/// The callback runs on a pool worker and may call back into the session,
	/// except to replace itself. Generations arrive in increasing order; one
	/// overtaken by a newer publication is skipped.
	pub fn on_publish<F>(&self, consumer: F)
	where
		F: Fn(&Arc<ResultSet<M>>) + Send + Sync + 'static,
	{
		*self
			.shared
			.consumer
			.write()
			.unwrap_or_else(PoisonError::into_inner) = Some(Box::new(consumer));
	}

	/// Start searching every registered source for `query`.
	pub fn search(&self, query: &str) -> u64 {
		self.begin_search(query, &SourceFilter::All)
	}

	/// Start a new generation for `query` over the sources `filter` admits.
	/// Returns the generation.
	pub fn begin_search(&self, query: &str, filter: &SourceFilter) -> u64 {
		let shared = &self.shared;
		let generation = shared.clock.begin();
		let query = Query::new(query);

		let (sources, tickets) = {
			let registry = shared.sources.read().unwrap_or_else(PoisonError::into_inner);
			let sources: Vec<_> = registry.iter().map(|source| Arc::clone(source.source())).collect();
			(sources, registry.schedule(filter, query.len()))
		};

		// An empty schedule still runs one task so the empty set publishes.
		let tasks = shared.config.workers.min(tickets.len()).max(1);
		debug!(
			generation,
			query = query.text(),
			shards = tickets.len(),
			tasks,
			"search started"
		);

		let task = Arc::new(SearchTask {
			shared: Arc::clone(shared),
			results: Arc::new(ResultSet::new(generation, query, &shared.config)),
			sources,
			cursor: AtomicUsize::new(tickets.len()),
			remaining: AtomicUsize::new(tasks),
			tickets,
			started: Instant::now(),
		});
		for _ in 0..tasks {
			let task = Arc::clone(&task);
			self.pool.execute(move || task.run());
		}
		generation
	}

	/// The latest generation handed out.
	#[must_use]
	pub fn generation(&self) -> u64 {
		self.shared.clock.current()
	}

	/// The currently published result set.
	#[must_use]
	pub fn latest(&self) -> Option<Arc<ResultSet<M>>> {
		lock(&self.shared.published).clone()
	}

	/// Block until a result set of at least `generation` is published, or
	/// `timeout` passes.
	pub fn wait_for(&self, generation: u64, timeout: Duration) -> Option<Arc<ResultSet<M>>> {
		let deadline = Instant::now() + timeout;
		let mut published = lock(&self.shared.published);
		loop {
			if let Some(current) = published.as_ref()
				&& current.generation() >= generation
			{
				return Some(Arc::clone(current));
			}
			let left = deadline.checked_duration_since(Instant::now())?;
			published = self
				.shared
				.ready
				.wait_timeout(published, left)
				.unwrap_or_else(PoisonError::into_inner)
				.0;
		}
	}
}

impl<M> Drop for Session<M> {
	fn drop(&mut self) {
		// Cancel in-flight work so the pool drains quickly.
		self.shared.clock.begin();
	}
}
