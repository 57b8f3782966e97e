//! Built-in sources driven through a ranking session.

use std::fs;
use std::io::Cursor;
use std::time::Duration;

use frz::{FilesSource, FilesystemOptions, LinesSource, Match, RankerConfig, Session, SourceFilter};
use tempfile::tempdir;

const WAIT: Duration = Duration::from_secs(10);

fn session(workers: usize) -> Session<Match> {
	Session::new(RankerConfig {
		workers,
		..RankerConfig::default()
	})
	.unwrap()
}

fn texts(session: &Session<Match>, generation: u64) -> Vec<String> {
	let results = session.wait_for(generation, WAIT).unwrap();
	results
		.window(0..results.count())
		.map(|(_, found)| found.text.clone())
		.collect()
}

#[test]
fn exact_line_ranks_first_across_many_shards() {
	let session = session(4);
	let window = session.config().dedup_window;
	let lines = (0..5_000).map(|i| format!("item{i}"));
	session
		.register(LinesSource::from_lines(lines, window).with_shard_size(100))
		.unwrap();

	let ranked = texts(&session, session.search("item42"));
	assert_eq!(ranked[0], "item42");
	assert!(ranked.iter().all(|text| text.contains('4') && text.contains('2')));
}

#[test]
fn repeated_lines_collapse_across_shards() {
	let session = session(3);
	let window = session.config().dedup_window;
	let mut lines = vec!["dup".to_owned(); 300];
	lines.push("other".to_owned());
	session
		.register(LinesSource::from_lines(lines, window).with_shard_size(64))
		.unwrap();

	let generation = session.search("d");
	let results = session.wait_for(generation, WAIT).unwrap();
	assert_eq!(results.count(), 1);
	assert_eq!(results.duplicates(), 299);
	assert_eq!(results.get(0).unwrap().text, "dup");
}

#[test]
fn filter_restricts_results_to_named_sources() {
	let dir = tempdir().unwrap();
	fs::write(dir.path().join("notes.txt"), b"").unwrap();

	let session = session(2);
	let window = session.config().dedup_window;
	let files = FilesSource::scan(dir.path(), &FilesystemOptions::default(), window).unwrap();
	session.register(files).unwrap();
	session
		.register(LinesSource::from_lines(["notes from stdin"], window))
		.unwrap();

	let both = texts(&session, session.search("notes"));
	assert_eq!(both.len(), 2);

	let filter = SourceFilter::only(["lines"]);
	let generation = session.begin_search("notes", &filter);
	let results = session.wait_for(generation, WAIT).unwrap();
	assert_eq!(results.count(), 1);
	let source = results.source(0).unwrap();
	assert_eq!(session.source_name(source).as_deref(), Some("lines"));
	assert!(session.check_filter(&SourceFilter::only(["missing"])).is_err());
}

#[test]
fn sorted_paths_rank_like_the_unsorted_scorer() {
	let session = session(2);
	let window = session.config().dedup_window;
	let paths = vec![
		"src/ranker/merge.rs".to_owned(),
		"src/ranker/mod.rs".to_owned(),
		"src/main.rs".to_owned(),
		"README.md".to_owned(),
	];
	session
		.register(FilesSource::from_paths(paths.clone(), window))
		.unwrap();
	let files = texts(&session, session.search("mrs"));

	let other = self::session(2);
	other.register(LinesSource::from_lines(paths, window)).unwrap();
	let mut lines = texts(&other, other.search("mrs"));

	let mut files_sorted = files.clone();
	files_sorted.sort();
	lines.sort();
	assert_eq!(files_sorted, lines);
	assert_eq!(files.len(), 3);
}

#[test]
fn a_newer_search_supersedes_the_previous_one() {
	let session = session(2);
	let window = session.config().dedup_window;
	let lines = (0..20_000).map(|i| format!("line {i}"));
	session
		.register(LinesSource::from_lines(lines, window).with_shard_size(256))
		.unwrap();

	let first = session.search("1");
	let second = session.search("19999");
	let results = session.wait_for(second, WAIT).unwrap();
	assert!(results.generation() > first);
	assert_eq!(results.query().text(), "19999");
	assert_eq!(results.get(0).unwrap().text, "line 19999");
}

#[test]
fn long_lines_are_highlighted_under_a_raised_haystack_limit() {
	let session = Session::new(RankerConfig {
		workers: 2,
		max_haystack_len: 4_096,
		..RankerConfig::default()
	})
	.unwrap();
	let window = session.config().dedup_window;
	let long = format!("{}needle", "x".repeat(2_000));
	session
		.register(LinesSource::from_lines([long.clone()], window))
		.unwrap();

	let results = session.wait_for(session.search("needle"), WAIT).unwrap();
	let found = results.get(0).unwrap();
	assert_eq!(found.text, long);
	assert_eq!(found.positions, (2_000..2_006).collect::<Vec<_>>());
}

#[test]
fn lines_with_invalid_utf8_are_still_ranked() {
	let session = session(2);
	let window = session.config().dedup_window;
	let input = Cursor::new(b"plain\nbad\xFF\xFEbyte\n".to_vec());
	session
		.register(LinesSource::from_reader(input, window).unwrap())
		.unwrap();

	let ranked = texts(&session, session.search("badbyte"));
	assert_eq!(ranked, vec!["bad\u{FFFD}\u{FFFD}byte".to_owned()]);
}
