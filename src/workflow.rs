use std::fs::File;
use std::io::{self, BufReader};
use std::time::Duration;

use anyhow::{Context, Result};
use frz::{FilesSource, LinesSource, Match, ResultSet, Session, SourceFilter};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::settings::{InputSource, ResolvedConfig};

/// One line of ranked output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct RankedMatch {
	pub(crate) rank: usize,
	pub(crate) score: u16,
	pub(crate) source: String,
	pub(crate) text: String,
	pub(crate) positions: Vec<usize>,
}

/// The top of a published result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SearchReport {
	pub(crate) query: String,
	pub(crate) generation: u64,
	/// `false` when the wait timed out before the generation was published.
	pub(crate) complete: bool,
	pub(crate) total: usize,
	pub(crate) duplicates: usize,
	pub(crate) matches: Vec<RankedMatch>,
}

/// Builds a ranking session for the configured input and runs one query.
pub(crate) struct SearchWorkflow {
	session: Session<Match>,
	query: String,
	limit: usize,
	timeout: Duration,
}

impl SearchWorkflow {
	pub(crate) fn from_config(config: ResolvedConfig) -> Result<Self> {
		let ResolvedConfig {
			ranker,
			input,
			filesystem,
			query,
			limit,
			timeout,
		} = config;

		let session = Session::new(ranker).context("failed to start ranking session")?;
		let window = session.config().dedup_window;

		let candidates = match input {
			InputSource::Files { root } => {
				let source = FilesSource::scan(&root, &filesystem, window)?;
				let len = source.len();
				session.register(source)?;
				len
			}
			InputSource::Stdin => {
				let source = LinesSource::from_reader(io::stdin().lock(), window)
					.context("failed to read standard input")?;
				let len = source.len();
				session.register(source)?;
				len
			}
			InputSource::File(path) => {
				let file = File::open(&path)
					.with_context(|| format!("failed to open {}", path.display()))?;
				let source = LinesSource::from_reader(BufReader::new(file), window)
					.with_context(|| format!("failed to read {}", path.display()))?;
				let len = source.len();
				session.register(source)?;
				len
			}
		};
		info!(candidates, sources = ?session.source_names(), "candidates loaded");

		Ok(Self {
			session,
			query,
			limit,
			timeout,
		})
	}

	pub(crate) fn run(self) -> Result<SearchReport> {
		let generation = self.session.begin_search(&self.query, &SourceFilter::All);
		let Some(results) = self.session.wait_for(generation, self.timeout) else {
			warn!(generation, timeout = ?self.timeout, "ranking did not finish in time");
			return Ok(SearchReport {
				query: self.query,
				generation,
				complete: false,
				total: 0,
				duplicates: 0,
				matches: Vec::new(),
			});
		};
		debug!(
			generation,
			total = results.count(),
			duplicates = results.duplicates(),
			"ranked"
		);
		Ok(self.report(&results))
	}

	fn report(&self, results: &ResultSet<Match>) -> SearchReport {
		let matches = results
			.window(0..self.limit)
			.map(|(rank, found)| RankedMatch {
				rank,
				score: results.score(rank).unwrap_or_default(),
				source: results
					.source(rank)
					.and_then(|id| self.session.source_name(id))
					.unwrap_or_default(),
				text: found.text.clone(),
				positions: found.positions.clone(),
			})
			.collect();

		SearchReport {
			query: self.query.clone(),
			generation: results.generation(),
			complete: true,
			total: results.count(),
			duplicates: results.duplicates(),
			matches,
		}
	}
}
