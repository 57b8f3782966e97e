//! Column-major scoring with a resumable cache.
//!
//! Every column of the DP depends only on the haystack prefix up to that
//! column: the bonus looks one codepoint back and gap penalties are chosen by
//! needle row. Scoring a sorted list of paths can therefore keep the columns
//! of the shared prefix and only compute the diverging suffix.

use super::{
	SCORE_GAP_LEADING, SCORE_MATCH_CONSECUTIVE, SCORE_MIN, Score, Scorer, add,
	fill_bonus, gap_for_row,
};
use crate::query::Text;

/// Cached DP columns for the most recently scored haystack.
#[derive(Debug, Default)]
pub struct ColumnCache {
	needle: Vec<char>,
	haystack: Vec<char>,
	bonus: Vec<Score>,
	/// `d[col * rows + row]`
	d: Vec<Score>,
	/// `m[col * rows + row]`
	m: Vec<Score>,
	/// Columns of `haystack` whose entries in `d`/`m` are valid.
	cols: usize,
}

impl ColumnCache {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of leading columns that can be reused for `haystack`: the
	/// length of its common prefix with the last scored haystack.
	#[must_use]
	pub fn resume_point(&self, haystack: Text<'_>) -> usize {
		self.haystack[..self.cols]
			.iter()
			.zip(haystack.chars())
			.take_while(|(cached, next)| cached == next)
			.count()
	}

	/// Forget every cached column.
	pub fn clear(&mut self) {
		self.cols = 0;
		self.haystack.clear();
		self.bonus.clear();
	}

	fn rebind(&mut self, needle: Text<'_>) {
		if self.needle != needle.upper() {
			self.needle.clear();
			self.needle.extend_from_slice(needle.upper());
			self.clear();
		}
	}

	/// Drop every column from `start` (or the first differing codepoint,
	/// whichever comes first) and record the new haystack.
	fn rewind(&mut self, haystack: Text<'_>, start: usize) {
		self.cols = start.min(self.resume_point(haystack));
		self.haystack.truncate(self.cols);
		self.haystack.extend_from_slice(&haystack.chars()[self.cols..]);
	}
}

impl Scorer {
	/// Score like [`Scorer::score`], reusing the first `start_col` columns
	/// from `cache`.
	///
	/// `start_col` is an upper bound on the columns to reuse; it is further
	/// clamped to the prefix actually shared with the cached haystack, so a
	/// stale hint costs time but never correctness.
	pub fn score_columns(
		&mut self,
		needle: Text<'_>,
		haystack: Text<'_>,
		start_col: usize,
		cache: &mut ColumnCache,
	) -> Score {
		cache.rebind(needle);
		cache.rewind(haystack, start_col);

		if let Some(score) = self.trivial(needle, haystack) {
			// The prefix columns stay valid; nothing past them was computed.
			cache.haystack.truncate(cache.cols);
			return score;
		}

		let rows = needle.len();
		let cols = haystack.len();
		let start = cache.cols;
		fill_bonus(haystack.chars(), start, &mut cache.bonus);
		cache.d.resize(cols * rows, SCORE_MIN);
		cache.m.resize(cols * rows, SCORE_MIN);

		let needle_upper = needle.upper();
		let haystack_upper = haystack.upper();
		for j in start..cols {
			let base = j * rows;
			for i in 0..rows {
				let cell = base + i;
				let left = if j > 0 { cache.m[cell - rows] } else { SCORE_MIN };
				let gap = gap_for_row(i, rows);
				if needle_upper[i] == haystack_upper[j] {
					let score = if i == 0 {
						(j as Score) * SCORE_GAP_LEADING + cache.bonus[j]
					} else if j > 0 {
						let diag = cell - rows - 1;
						add(cache.m[diag], cache.bonus[j])
							.max(add(cache.d[diag], SCORE_MATCH_CONSECUTIVE))
					} else {
						SCORE_MIN
					};
					cache.d[cell] = score;
					cache.m[cell] = score.max(add(left, gap));
				} else {
					cache.d[cell] = SCORE_MIN;
					cache.m[cell] = add(left, gap);
				}
			}
		}
		cache.cols = cols;

		cache.m[(cols - 1) * rows + rows - 1]
	}
}
