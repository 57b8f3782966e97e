use std::borrow::Cow;
use std::io::BufRead;

use anyhow::{Context, Result};
use frz_ranker::{Accumulator, Source};
use rustc_hash::FxHashMap;
use tracing::debug;

use super::{CandidateList, Match, position_key};

/// Ranks the lines of a text stream.
///
/// Repeated lines share the dedup key of their first occurrence, so each
/// distinct line appears at most once in the ranked output.
#[derive(Debug, Clone)]
pub struct LinesSource {
	list: CandidateList,
	distinct: usize,
}

impl LinesSource {
	pub const NAME: &'static str = "lines";

	/// Read every line of `reader`. Blank lines are skipped and trailing
	/// carriage returns trimmed. Bytes that are not valid UTF-8 are replaced
	/// with U+FFFD; the line is kept.
	pub fn from_reader<R: BufRead>(mut reader: R, window: u32) -> Result<Self> {
		let mut lines = Vec::new();
		let mut buffer = Vec::new();
		let mut replaced = 0usize;
		loop {
			buffer.clear();
			let read = reader
				.read_until(b'\n', &mut buffer)
				.with_context(|| format!("failed to read input line {}", lines.len() + 1))?;
			if read == 0 {
				break;
			}
			if buffer.last() == Some(&b'\n') {
				buffer.pop();
			}
			let line = String::from_utf8_lossy(&buffer);
			if matches!(line, Cow::Owned(_)) {
				replaced += 1;
			}
			lines.push(line.into_owned());
		}
		if replaced > 0 {
			debug!(lines = replaced, "replaced invalid UTF-8 in input");
		}
		Ok(Self::from_lines(lines, window))
	}

	pub fn from_lines<I, S>(lines: I, window: u32) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let items: Vec<String> = lines
			.into_iter()
			.map(|line| {
				let mut line = line.into();
				if line.ends_with('\r') {
					line.pop();
				}
				line
			})
			.filter(|line| !line.is_empty())
			.collect();

		let mut first_seen: FxHashMap<&str, u32> = FxHashMap::default();
		let keys: Vec<u32> = items
			.iter()
			.enumerate()
			.map(|(index, line)| {
				*first_seen
					.entry(line.as_str())
					.or_insert_with(|| position_key(index, window))
			})
			.collect();
		let distinct = first_seen.len();
		drop(first_seen);

		Self {
			list: CandidateList::new(items, keys, false),
			distinct,
		}
	}

	#[must_use]
	pub fn with_shard_size(mut self, shard_size: usize) -> Self {
		self.list = self.list.with_shard_size(shard_size);
		self
	}

	pub fn len(&self) -> usize {
		self.list.len()
	}

	pub fn is_empty(&self) -> bool {
		self.list.len() == 0
	}

	/// Number of distinct lines.
	pub fn distinct(&self) -> usize {
		self.distinct
	}

	pub fn lines(&self) -> &[String] {
		self.list.items()
	}
}

impl Source<Match> for LinesSource {
	fn name(&self) -> &str {
		Self::NAME
	}

	fn shard_count(&self) -> u32 {
		self.list.shard_count()
	}

	fn search_shard(&self, shard: u32, results: &mut Accumulator<'_, Match>) {
		self.list.search_shard(shard, results);
	}
}
