use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use frz_ranker::{
	Accumulator, Query, RankerConfig, ResultSet, SCORE_MAX, Session, Source, SourceFilter,
};

const WAIT: Duration = Duration::from_secs(10);

fn config(workers: usize) -> RankerConfig {
	RankerConfig {
		workers,
		..RankerConfig::default()
	}
}

fn label(context: &String, _query: &Query) -> String {
	context.clone()
}

fn ranked(results: &ResultSet<String>) -> Vec<String> {
	results.window(0..results.count()).map(|(_, value)| value.clone()).collect()
}

/// Scores a fixed word list, one word per shard.
struct Words {
	name: &'static str,
	words: Vec<&'static str>,
}

impl Words {
	fn new(name: &'static str, words: &[&'static str]) -> Self {
		Self {
			name,
			words: words.to_vec(),
		}
	}
}

impl Source<String> for Words {
	fn name(&self) -> &str {
		self.name
	}

	fn shard_count(&self) -> u32 {
		self.words.len() as u32
	}

	fn search_shard(&self, shard: u32, results: &mut Accumulator<'_, String>) {
		let word = self.words[shard as usize];
		if let Some(score) = results.score(word) {
			results.insert_unique(score, label, word.to_owned(), None);
		}
	}
}

static UNIQUE_DESTROYED: AtomicUsize = AtomicUsize::new(0);

fn count_unique(_context: usize) {
	UNIQUE_DESTROYED.fetch_add(1, Ordering::SeqCst);
}

fn number(context: &usize, _query: &Query) -> String {
	context.to_string()
}

struct Bulk;

impl Source<String> for Bulk {
	fn name(&self) -> &str {
		"bulk"
	}

	fn shard_count(&self) -> u32 {
		4
	}

	fn search_shard(&self, shard: u32, results: &mut Accumulator<'_, String>) {
		for i in 0..100 {
			results.insert_unique(i, number, shard as usize * 100 + i as usize, Some(count_unique));
		}
	}
}

#[test]
fn four_workers_of_unique_inserts_keep_every_candidate() {
	let session = Session::new(config(4)).expect("session");
	session.register(Bulk).expect("register");
	let generation = session.search("");
	let results = session.wait_for(generation, WAIT).expect("published");

	assert_eq!(results.count(), 400);
	assert_eq!(results.duplicates(), 0);
	let mut seen: Vec<_> = ranked(&results).iter().map(|v| v.parse::<usize>().expect("number")).collect();
	seen.sort_unstable();
	assert_eq!(seen, (0..400).collect::<Vec<_>>());

	drop(results);
	drop(session);
	assert_eq!(UNIQUE_DESTROYED.load(Ordering::SeqCst), 400);
}

#[test]
fn matches_rank_by_score() {
	let session = Session::new(config(2)).expect("session");
	session
		.register(Words::new(
			"words",
			&["Firefox", "Firefox Browser", "fooBar", "xylophone"],
		))
		.expect("register");

	let generation = session.search("fb");
	let results = session.wait_for(generation, WAIT).expect("published");
	assert_eq!(ranked(&results), vec!["Firefox Browser", "fooBar"]);
	assert_eq!(results.query().text(), "fb");

	let generation = session.search("xyz");
	let results = session.wait_for(generation, WAIT).expect("published");
	assert!(results.is_empty());
}

#[test]
fn exact_case_insensitive_match_scores_maximum() {
	let mut scorer = frz_ranker::Scorer::default();
	let query = Query::new("GIT");
	let haystack = Query::new("git");
	assert_eq!(scorer.score(query.needle(), haystack.needle()), SCORE_MAX);
}

/// Inserts under caller keys so near-equal keys collapse.
struct Keyed {
	entries: Vec<(u32, i32, &'static str)>,
}

impl Source<String> for Keyed {
	fn name(&self) -> &str {
		"keyed"
	}

	fn shard_count(&self) -> u32 {
		self.entries.len() as u32
	}

	fn search_shard(&self, shard: u32, results: &mut Accumulator<'_, String>) {
		let (key, score, value) = self.entries[shard as usize];
		results.insert(key, score, label, value.to_owned(), None);
	}
}

#[test]
fn near_equal_keys_keep_the_higher_score() {
	let session = Session::new(config(2)).expect("session");
	session
		.register(Keyed {
			entries: vec![(100, 10, "low"), (101, 500, "high"), (200, 20, "other")],
		})
		.expect("register");
	let generation = session.search("");
	let results = session.wait_for(generation, WAIT).expect("published");

	assert_eq!(results.count(), 2);
	assert_eq!(results.duplicates(), 1);
	assert_eq!(ranked(&results), vec!["high", "other"]);
}

/// Blocks generation-one searches until they go stale.
struct Slow;

impl Source<String> for Slow {
	fn name(&self) -> &str {
		"slow"
	}

	fn shard_count(&self) -> u32 {
		1
	}

	fn search_shard(&self, _shard: u32, results: &mut Accumulator<'_, String>) {
		if results.query().text() == "slow" {
			while !results.is_stale() {
				thread::sleep(Duration::from_millis(1));
			}
		}
		results.insert_unique(1, label, results.query().text().to_owned(), None);
	}
}

#[test]
fn stale_generations_are_never_published() {
	let session = Session::new(config(2)).expect("session");
	session.register(Slow).expect("register");
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&seen);
	session.on_publish(move |results| {
		sink.lock().expect("lock").push(results.generation());
	});

	let slow = session.search("slow");
	let fast = session.search("fast");
	assert!(fast > slow);
	let results = session.wait_for(fast, WAIT).expect("published");
	assert_eq!(results.generation(), fast);
	assert_eq!(ranked(&results), vec!["fast"]);

	// Give the abandoned search time to wind down.
	thread::sleep(Duration::from_millis(50));
	assert_eq!(*seen.lock().expect("lock"), vec![fast]);
	assert_eq!(session.latest().map(|r| r.generation()), Some(fast));
}

#[test]
fn filters_and_empty_schedules_still_publish() {
	let session = Session::new(config(2)).expect("session");
	session.register(Words::new("a", &["alpha"])).expect("a");
	session.register(Words::new("b", &["beta"])).expect("b");

	let generation = session.begin_search("a", &SourceFilter::only(["b"]));
	let results = session.wait_for(generation, WAIT).expect("published");
	assert_eq!(ranked(&results), vec!["beta"]);
	assert_eq!(
		results.source(0).and_then(|id| session.source_name(id)),
		Some("b".to_owned())
	);

	assert!(session.check_filter(&SourceFilter::only(["c"])).is_err());
	let generation = session.begin_search("a", &SourceFilter::only(["c"]));
	let results = session.wait_for(generation, WAIT).expect("published");
	assert!(results.is_empty());
}

struct Panicky;

impl Source<String> for Panicky {
	fn name(&self) -> &str {
		"panicky"
	}

	fn shard_count(&self) -> u32 {
		2
	}

	fn search_shard(&self, shard: u32, results: &mut Accumulator<'_, String>) {
		assert!(shard != 0, "shard zero always fails");
		results.insert_unique(1, label, "survivor".to_owned(), None);
	}
}

#[test]
fn a_panicking_shard_does_not_stall_the_search() {
	let session = Session::new(config(1)).expect("session");
	session.register(Panicky).expect("register");
	let generation = session.search("");
	let results = session.wait_for(generation, WAIT).expect("published");
	assert_eq!(ranked(&results), vec!["survivor"]);
}

/// Many near-colliding keys, enough to take the parallel merge path.
struct Grid;

impl Source<String> for Grid {
	fn name(&self) -> &str {
		"grid"
	}

	fn shard_count(&self) -> u32 {
		8
	}

	fn search_shard(&self, shard: u32, results: &mut Accumulator<'_, String>) {
		for i in 0..500u32 {
			let key = (i * 7 + shard * 3) % 1500 + 1;
			let score = ((i * 31 + shard * 17) % 97) as i32;
			results.insert(key, score, label, format!("{shard}:{i}"), None);
		}
	}
}

#[test]
fn serial_and_parallel_sessions_rank_identically() {
	let serial = Session::new(RankerConfig {
		parallel_merge_threshold: usize::MAX,
		..config(3)
	})
	.expect("serial session");
	let parallel = Session::new(RankerConfig {
		parallel_merge_threshold: 64,
		merge_threads: Some(4),
		..config(3)
	})
	.expect("parallel session");
	serial.register(Grid).expect("register");
	parallel.register(Grid).expect("register");

	let a = serial.wait_for(serial.search(""), WAIT).expect("serial");
	let b = parallel.wait_for(parallel.search(""), WAIT).expect("parallel");
	assert!(!a.stats().expect("frozen").parallel);
	assert!(b.stats().expect("frozen").parallel);
	assert_eq!(a.count(), b.count());
	assert!(a.duplicates() > 0);

	let scores = |results: &ResultSet<String>| {
		(0..results.count())
			.map(|i| (results.record(i).map(|r| r.key()), results.score(i)))
			.collect::<Vec<_>>()
	};
	assert_eq!(scores(&a), scores(&b));

	let again = parallel.wait_for(parallel.search(""), WAIT).expect("again");
	assert_eq!(scores(&again), scores(&b));
}

static DROPPED_DESTROYED: AtomicUsize = AtomicUsize::new(0);

fn count_dropped(_context: usize) {
	DROPPED_DESTROYED.fetch_add(1, Ordering::SeqCst);
}

struct Flood;

impl Source<String> for Flood {
	fn name(&self) -> &str {
		"flood"
	}

	fn shard_count(&self) -> u32 {
		1
	}

	fn search_shard(&self, _shard: u32, results: &mut Accumulator<'_, String>) {
		for i in 0..20 {
			results.insert_unique(i, number, i as usize, Some(count_dropped));
		}
	}
}

#[test]
fn exhausted_pools_drop_inserts_but_destroy_everything() {
	let session = Session::new(RankerConfig {
		sheet_slots: 4,
		max_sheets: 2,
		..config(1)
	})
	.expect("session");
	session.register(Flood).expect("register");
	let results = session.wait_for(session.search(""), WAIT).expect("published");
	assert_eq!(results.count(), 8);
	assert_eq!(DROPPED_DESTROYED.load(Ordering::SeqCst), 12);

	drop(results);
	drop(session);
	assert_eq!(DROPPED_DESTROYED.load(Ordering::SeqCst), 20);
}

#[test]
fn consumers_can_read_the_session_they_are_called_from() {
	let session = Arc::new(Session::new(config(1)).expect("session"));
	session.register(Words::new("words", &["alpha"])).expect("register");
	let (tx, rx) = crossbeam_channel::unbounded();
	let weak = Arc::downgrade(&session);
	session.on_publish(move |results| {
		let Some(session) = weak.upgrade() else {
			return;
		};
		let latest = session.latest().map(|latest| latest.generation());
		let waited = session
			.wait_for(results.generation(), Duration::ZERO)
			.map(|waited| waited.generation());
		drop(session);
		let _ = tx.send((results.generation(), latest, waited));
	});

	let generation = session.search("a");
	let seen = rx.recv_timeout(WAIT).expect("consumer returned");
	assert_eq!(seen, (generation, Some(generation), Some(generation)));
}

#[test]
fn a_panicking_consumer_does_not_stall_later_searches() {
	let session = Session::new(config(1)).expect("session");
	session.register(Words::new("words", &["alpha", "beta"])).expect("register");
	let calls = Arc::new(AtomicUsize::new(0));
	let (tx, rx) = crossbeam_channel::unbounded();
	let counter = Arc::clone(&calls);
	session.on_publish(move |results| {
		assert!(counter.fetch_add(1, Ordering::SeqCst) > 0, "first publication rejected");
		let _ = tx.send(results.generation());
	});

	let first = session.search("a");
	assert!(session.wait_for(first, WAIT).is_some());
	let second = session.search("b");
	let results = session.wait_for(second, WAIT).expect("second published");
	assert_eq!(ranked(&results), vec!["beta"]);
	assert_eq!(rx.recv_timeout(WAIT), Ok(second));
	assert_eq!(calls.load(Ordering::SeqCst), 2);
}

static TEARDOWN_THREADS: Mutex<Vec<String>> = Mutex::new(Vec::new());

fn record_teardown(_context: usize) {
	let name = thread::current().name().unwrap_or("unnamed").to_owned();
	TEARDOWN_THREADS.lock().expect("lock").push(name);
}

struct Tracked;

impl Source<String> for Tracked {
	fn name(&self) -> &str {
		"tracked"
	}

	fn shard_count(&self) -> u32 {
		1
	}

	fn search_shard(&self, _shard: u32, results: &mut Accumulator<'_, String>) {
		for i in 0..3 {
			results.insert_unique(1, number, i, Some(record_teardown));
		}
	}
}

#[test]
fn superseded_result_sets_are_torn_down_on_pool_workers() {
	let session = Session::new(config(2)).expect("session");
	session.register(Tracked).expect("register");

	let first = session.search("");
	drop(session.wait_for(first, WAIT).expect("first published"));
	let second = session.search("");
	let results = session.wait_for(second, WAIT).expect("second published");
	assert_eq!(results.count(), 3);

	let deadline = Instant::now() + WAIT;
	let threads = loop {
		let threads = TEARDOWN_THREADS.lock().expect("lock").clone();
		if threads.len() >= 3 {
			break threads;
		}
		assert!(Instant::now() < deadline, "first result set was never torn down");
		thread::sleep(Duration::from_millis(1));
	};
	assert_eq!(threads.len(), 3);
	assert!(
		threads.iter().all(|name| name.starts_with("frz-ranker-")),
		"destructors ran on {threads:?}"
	);
}
