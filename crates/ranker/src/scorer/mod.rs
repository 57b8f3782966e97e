//! Fuzzy scoring.
//!
//! Scores are fixed-point (thousandths) so the dynamic program stays in
//! integer arithmetic and quantizes cleanly into the 16-bit rank field of a
//! [`Record`](crate::Record). [`SCORE_MIN`] is absorbing: adding anything to
//! it yields [`SCORE_MIN`] again.

mod column;

pub use column::ColumnCache;

use crate::query::Text;

/// Fixed-point match score.
pub type Score = i32;

/// Below-threshold sentinel. Never ranked.
pub const SCORE_MIN: Score = Score::MIN;
/// Reserved for needles that cover the whole haystack.
pub const SCORE_MAX: Score = Score::MAX;

pub const SCORE_GAP_LEADING: Score = -5;
pub const SCORE_GAP_TRAILING: Score = -5;
pub const SCORE_GAP_INNER: Score = -10;
pub const SCORE_MATCH_CONSECUTIVE: Score = 1000;
pub const SCORE_MATCH_SLASH: Score = 900;
pub const SCORE_MATCH_WORD: Score = 800;
pub const SCORE_MATCH_CAPITAL: Score = 700;
pub const SCORE_MATCH_DOT: Score = 600;

/// Haystacks longer than this are not scored.
pub const DEFAULT_MAX_HAYSTACK_LEN: usize = 1024;

/// Divisor applied before biasing a score into the rank field.
const RANK_QUANTUM: Score = 2;
/// Offset that moves the quantized score into unsigned territory.
const RANK_BIAS: Score = 16_384;

#[inline]
fn add(score: Score, delta: Score) -> Score {
	if score == SCORE_MIN {
		SCORE_MIN
	} else {
		score + delta
	}
}

#[inline]
fn gap_for_row(row: usize, rows: usize) -> Score {
	if row + 1 == rows {
		SCORE_GAP_TRAILING
	} else {
		SCORE_GAP_INNER
	}
}

fn separator_bonus(prev: char) -> Score {
	match prev {
		'/' | '\\' => SCORE_MATCH_SLASH,
		'-' | '_' | ' ' => SCORE_MATCH_WORD,
		'.' => SCORE_MATCH_DOT,
		_ => 0,
	}
}

/// Bonus for a match landing on `current` when it follows `prev`.
#[must_use]
pub fn position_bonus(prev: char, current: char) -> Score {
	if current.is_ascii_digit() || current.is_lowercase() {
		separator_bonus(prev)
	} else if current.is_uppercase() {
		if prev.is_lowercase() {
			SCORE_MATCH_CAPITAL
		} else {
			separator_bonus(prev)
		}
	} else {
		0
	}
}

/// Fill `bonus` with the per-position bonus of `haystack` from `start` on.
/// The start of the string behaves as if it followed a slash.
fn fill_bonus(haystack: &[char], start: usize, bonus: &mut Vec<Score>) {
	bonus.truncate(start);
	let mut prev = if start == 0 { '/' } else { haystack[start - 1] };
	for &c in &haystack[start..] {
		bonus.push(position_bonus(prev, c));
		prev = c;
	}
}

/// Case-insensitive subsequence test.
///
/// An empty needle never matches.
#[must_use]
pub fn has_match(needle: Text<'_>, haystack: Text<'_>) -> bool {
	if needle.is_empty() {
		return false;
	}
	let mut remaining = haystack.upper().iter();
	needle
		.upper()
		.iter()
		.all(|wanted| remaining.any(|candidate| candidate == wanted))
}

/// Map a score into the unsigned rank field. Zero is reserved for discarded
/// duplicates, so every real score lands in `1..=u16::MAX`.
#[must_use]
pub fn rank_score(score: Score) -> u16 {
	match score {
		SCORE_MAX => u16::MAX,
		SCORE_MIN => 1,
		_ => {
			let biased = score.div_euclid(RANK_QUANTUM) + RANK_BIAS;
			biased.clamp(1, Score::from(u16::MAX) - 1) as u16
		}
	}
}

/// Score `needle` against `haystack` with a throwaway [`Scorer`].
#[must_use]
pub fn score(needle: Text<'_>, haystack: Text<'_>) -> Score {
	Scorer::default().score(needle, haystack)
}

/// Matched haystack index for every needle codepoint, or `None` when the
/// needle does not match.
#[must_use]
pub fn positions(needle: Text<'_>, haystack: Text<'_>) -> Option<Vec<usize>> {
	Scorer::default().positions(needle, haystack)
}

/// Reusable scoring buffers. One per worker.
#[derive(Debug)]
pub struct Scorer {
	max_haystack_len: usize,
	bonus: Vec<Score>,
	d_prev: Vec<Score>,
	m_prev: Vec<Score>,
	d_cur: Vec<Score>,
	m_cur: Vec<Score>,
}

impl Default for Scorer {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_HAYSTACK_LEN)
	}
}

impl Scorer {
	#[must_use]
	pub fn new(max_haystack_len: usize) -> Self {
		Self {
			max_haystack_len,
			bonus: Vec::new(),
			d_prev: Vec::new(),
			m_prev: Vec::new(),
			d_cur: Vec::new(),
			m_cur: Vec::new(),
		}
	}

	#[must_use]
	pub fn max_haystack_len(&self) -> usize {
		self.max_haystack_len
	}

	/// Shared degenerate-case handling. `Some` short-circuits the DP.
	fn trivial(&self, needle: Text<'_>, haystack: Text<'_>) -> Option<Score> {
		let (n, m) = (needle.len(), haystack.len());
		if n == 0 || n > m || m > self.max_haystack_len {
			return Some(SCORE_MIN);
		}
		if !has_match(needle, haystack) {
			return Some(SCORE_MIN);
		}
		// A case-insensitive subsequence of equal length is the whole string.
		if n == m {
			return Some(SCORE_MAX);
		}
		None
	}

	/// Score `needle` against `haystack`.
	pub fn score(&mut self, needle: Text<'_>, haystack: Text<'_>) -> Score {
		if let Some(score) = self.trivial(needle, haystack) {
			return score;
		}

		let (n, m) = (needle.len(), haystack.len());
		fill_bonus(haystack.chars(), 0, &mut self.bonus);
		for row in [
			&mut self.d_prev,
			&mut self.m_prev,
			&mut self.d_cur,
			&mut self.m_cur,
		] {
			row.clear();
			row.resize(m, SCORE_MIN);
		}

		let needle_upper = needle.upper();
		let haystack_upper = haystack.upper();
		for i in 0..n {
			let gap = gap_for_row(i, n);
			let mut prev_score = SCORE_MIN;
			for j in 0..m {
				if needle_upper[i] == haystack_upper[j] {
					let score = if i == 0 {
						(j as Score) * SCORE_GAP_LEADING + self.bonus[j]
					} else if j > 0 {
						add(self.m_prev[j - 1], self.bonus[j])
							.max(add(self.d_prev[j - 1], SCORE_MATCH_CONSECUTIVE))
					} else {
						SCORE_MIN
					};
					self.d_cur[j] = score;
					prev_score = score.max(add(prev_score, gap));
				} else {
					self.d_cur[j] = SCORE_MIN;
					prev_score = add(prev_score, gap);
				}
				self.m_cur[j] = prev_score;
			}
			std::mem::swap(&mut self.d_prev, &mut self.d_cur);
			std::mem::swap(&mut self.m_prev, &mut self.m_cur);
		}

		self.m_prev[m - 1]
	}

	/// Matched haystack index per needle codepoint.
	///
	/// Keeps the full `n × m` tables for the backtrace, so this is meant for
	/// highlighting the handful of visible rows, not for ranking.
	pub fn positions(&mut self, needle: Text<'_>, haystack: Text<'_>) -> Option<Vec<usize>> {
		match self.trivial(needle, haystack) {
			Some(SCORE_MAX) => return Some((0..needle.len()).collect()),
			Some(_) => return None,
			None => {}
		}

		let (n, m) = (needle.len(), haystack.len());
		fill_bonus(haystack.chars(), 0, &mut self.bonus);
		let mut d = vec![SCORE_MIN; n * m];
		let mut best = vec![SCORE_MIN; n * m];
		let needle_upper = needle.upper();
		let haystack_upper = haystack.upper();

		for i in 0..n {
			let gap = gap_for_row(i, n);
			let mut prev_score = SCORE_MIN;
			for j in 0..m {
				let cell = i * m + j;
				if needle_upper[i] == haystack_upper[j] {
					let score = if i == 0 {
						(j as Score) * SCORE_GAP_LEADING + self.bonus[j]
					} else if j > 0 {
						let diag = cell - m - 1;
						add(best[diag], self.bonus[j]).max(add(d[diag], SCORE_MATCH_CONSECUTIVE))
					} else {
						SCORE_MIN
					};
					d[cell] = score;
					prev_score = score.max(add(prev_score, gap));
				} else {
					prev_score = add(prev_score, gap);
				}
				best[cell] = prev_score;
			}
		}

		let mut result = vec![0; n];
		let mut match_required = false;
		let mut j = m;
		for i in (0..n).rev() {
			while j > 0 {
				j -= 1;
				let cell = i * m + j;
				if d[cell] != SCORE_MIN && (match_required || d[cell] == best[cell]) {
					match_required = i > 0
						&& j > 0 && best[cell] == add(d[cell - m - 1], SCORE_MATCH_CONSECUTIVE);
					result[i] = j;
					break;
				}
			}
		}
		Some(result)
	}
}
