//! Query compilation.
//!
//! Needles and haystacks are both compared as decoded codepoint sequences
//! paired with an uppercase twin. Case folding is intentionally restricted to
//! the Latin ranges users actually type into a launcher prompt (ASCII, Latin-1
//! supplement and Latin Extended-A); everything else compares verbatim.

/// Emitted for every byte that does not start a well-formed sequence.
pub const REPLACEMENT: char = '\u{FFFD}';

/// Smallest buffer the compiler allocates once it needs to grow.
const MIN_CAPACITY: usize = 32;

/// Sequence length keyed by the top five bits of the lead byte. Zero marks a
/// byte that cannot start a sequence (continuation bytes and `0xF8..`).
const UTF8_LENGTH: [u8; 32] = [
	1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1, // 0xxxx
	0, 0, 0, 0, 0, 0, 0, 0, // 10xxx
	2, 2, 2, 2, // 110xx
	3, 3, // 1110x
	4, // 11110
	0, // 11111
];

/// Payload mask applied to the lead byte, indexed by sequence length.
const LEAD_MASK: [u8; 5] = [0, 0x7F, 0x1F, 0x0F, 0x07];

/// Smallest codepoint each sequence length may encode; anything lower is an
/// overlong encoding.
const MIN_CODEPOINT: [u32; 5] = [0, 0, 0x80, 0x800, 0x1_0000];

/// Uppercase a codepoint using the restricted Latin table.
#[must_use]
pub fn fold_upper(c: char) -> char {
	let cp = c as u32;
	let folded = match cp {
		0x61..=0x7A => cp - 0x20,
		0xE0..=0xFE if cp != 0xF7 => cp - 0x20,
		0xFF => 0x178,
		// dotless i and long s fold onto their ASCII capitals
		0x131 => 0x49,
		0x17F => 0x53,
		0x100..=0x137 | 0x14A..=0x177 if cp & 1 == 1 => cp - 1,
		0x139..=0x148 | 0x179..=0x17E if cp & 1 == 0 => cp - 1,
		_ => cp,
	};
	char::from_u32(folded).unwrap_or(c)
}

/// Decode one codepoint starting at `bytes[0]`, returning it with the number
/// of bytes consumed. Malformed input yields [`REPLACEMENT`] and consumes a
/// single byte so the caller always makes progress.
fn decode_one(bytes: &[u8]) -> (char, usize) {
	let lead = bytes[0];
	let len = UTF8_LENGTH[usize::from(lead >> 3)] as usize;
	if len == 0 || len > bytes.len() {
		return (REPLACEMENT, 1);
	}

	let mut cp = u32::from(lead & LEAD_MASK[len]);
	for &byte in &bytes[1..len] {
		if byte & 0xC0 != 0x80 {
			return (REPLACEMENT, 1);
		}
		cp = (cp << 6) | u32::from(byte & 0x3F);
	}

	if cp < MIN_CODEPOINT[len] {
		return (REPLACEMENT, 1);
	}
	match char::from_u32(cp) {
		Some(c) => (c, len),
		None => (REPLACEMENT, 1),
	}
}

/// Double `buf`'s capacity until it can hold `needed` items.
fn grow(buf: &mut Vec<char>, needed: usize) {
	if buf.capacity() >= needed {
		return;
	}
	let mut target = buf.capacity().max(MIN_CAPACITY);
	while target < needed {
		target *= 2;
	}
	buf.reserve_exact(target - buf.len());
}

/// Borrowed view over a compiled codepoint sequence.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Text<'a> {
	chars: &'a [char],
	upper: &'a [char],
}

impl<'a> Text<'a> {
	/// Original codepoints, case preserved.
	#[must_use]
	pub fn chars(&self) -> &'a [char] {
		self.chars
	}

	/// Uppercase twin used for case-insensitive comparison.
	#[must_use]
	pub fn upper(&self) -> &'a [char] {
		self.upper
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.chars.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.chars.is_empty()
	}

	/// View of the codepoints from `start` onwards.
	#[must_use]
	pub fn suffix(&self, start: usize) -> Text<'a> {
		let start = start.min(self.chars.len());
		Text {
			chars: &self.chars[start..],
			upper: &self.upper[start..],
		}
	}
}

/// Owned codepoint sequence with its uppercase twin.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Compiled {
	chars: Vec<char>,
	upper: Vec<char>,
}

impl Compiled {
	#[must_use]
	pub fn as_text(&self) -> Text<'_> {
		Text {
			chars: &self.chars,
			upper: &self.upper,
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.chars.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.chars.is_empty()
	}
}

/// Immutable per-search query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Query {
	text: String,
	needle: Compiled,
	spaceless: Compiled,
}

impl Query {
	/// Compile `text` with a throwaway compiler.
	#[must_use]
	pub fn new(text: &str) -> Self {
		QueryCompiler::default().compile(text)
	}

	/// The text as typed.
	#[must_use]
	pub fn text(&self) -> &str {
		&self.text
	}

	/// Needle with spaces preserved.
	#[must_use]
	pub fn needle(&self) -> Text<'_> {
		self.needle.as_text()
	}

	/// Needle with spaces removed, for word-boundary-insensitive matching.
	#[must_use]
	pub fn spaceless(&self) -> Text<'_> {
		self.spaceless.as_text()
	}

	/// Whether stripping spaces produced a different needle.
	#[must_use]
	pub fn has_spaces(&self) -> bool {
		self.spaceless.len() != self.needle.len()
	}

	/// Length of the needle in codepoints.
	#[must_use]
	pub fn len(&self) -> usize {
		self.needle.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.needle.is_empty()
	}
}

/// Reusable decoder for needles and haystacks.
///
/// The scratch buffers survive between calls so that scanning a shard of
/// haystacks does not allocate once the buffers have grown to fit the longest
/// candidate.
#[derive(Debug, Default)]
pub struct QueryCompiler {
	chars: Vec<char>,
	upper: Vec<char>,
}

impl QueryCompiler {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a [`Query`] from user input.
	pub fn compile(&mut self, text: &str) -> Query {
		self.decode(text.as_bytes());
		let needle = Compiled {
			chars: self.chars.clone(),
			upper: self.upper.clone(),
		};

		let (chars, upper): (Vec<char>, Vec<char>) = needle
			.chars
			.iter()
			.zip(&needle.upper)
			.filter(|(c, _)| **c != ' ')
			.map(|(c, u)| (*c, *u))
			.unzip();
		let spaceless = Compiled { chars, upper };

		Query {
			text: text.to_owned(),
			needle,
			spaceless,
		}
	}

	/// Decode `bytes` into the scratch buffers and return a view over them.
	///
	/// The view borrows the compiler, so it is only valid until the next call.
	pub fn haystack(&mut self, bytes: &[u8]) -> Text<'_> {
		self.decode(bytes);
		Text {
			chars: &self.chars,
			upper: &self.upper,
		}
	}

	/// Decode `bytes` into an owned sequence without disturbing the scratch view.
	#[must_use]
	pub fn compile_owned(bytes: &[u8]) -> Compiled {
		let mut compiler = Self::default();
		compiler.decode(bytes);
		Compiled {
			chars: compiler.chars,
			upper: compiler.upper,
		}
	}

	fn decode(&mut self, bytes: &[u8]) {
		self.chars.clear();
		self.upper.clear();
		// Never more codepoints than bytes.
		grow(&mut self.chars, bytes.len());
		grow(&mut self.upper, bytes.len());

		let mut offset = 0;
		while offset < bytes.len() {
			let (c, consumed) = decode_one(&bytes[offset..]);
			self.chars.push(c);
			self.upper.push(fold_upper(c));
			offset += consumed;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn decode(bytes: &[u8]) -> Vec<char> {
		QueryCompiler::compile_owned(bytes).chars
	}

	#[test]
	fn decodes_multibyte_sequences() {
		assert_eq!(decode("aé€😀".as_bytes()), vec!['a', 'é', '€', '😀']);
	}

	#[test]
	fn invalid_bytes_advance_one_at_a_time() {
		// stray continuation, truncated 3-byte lead, then ASCII
		assert_eq!(
			decode(&[0x80, 0xE2, 0x82, b'x']),
			vec![REPLACEMENT, REPLACEMENT, REPLACEMENT, 'x']
		);
	}

	#[test]
	fn overlong_and_surrogate_encodings_are_rejected() {
		assert_eq!(decode(&[0xC0, 0xAF]), vec![REPLACEMENT, REPLACEMENT]);
		assert_eq!(
			decode(&[0xED, 0xA0, 0x80]),
			vec![REPLACEMENT, REPLACEMENT, REPLACEMENT]
		);
	}

	#[test]
	fn fold_covers_latin_ranges_only() {
		assert_eq!(fold_upper('q'), 'Q');
		assert_eq!(fold_upper('é'), 'É');
		assert_eq!(fold_upper('÷'), '÷');
		assert_eq!(fold_upper('ÿ'), 'Ÿ');
		assert_eq!(fold_upper('ā'), 'Ā');
		assert_eq!(fold_upper('ł'), 'Ł');
		assert_eq!(fold_upper('ž'), 'Ž');
		assert_eq!(fold_upper('ı'), 'I');
		// Greek is outside the table
		assert_eq!(fold_upper('α'), 'α');
	}

	#[test]
	fn spaceless_variant_strips_spaces() {
		let query = Query::new("fi re fox");
		assert_eq!(query.text(), "fi re fox");
		assert_eq!(query.len(), 9);
		assert_eq!(query.spaceless().chars().iter().collect::<String>(), "firefox");
		assert_eq!(query.spaceless().upper().iter().collect::<String>(), "FIREFOX");
		assert!(query.has_spaces());
	}

	#[test]
	fn haystack_buffers_are_reused() {
		let mut compiler = QueryCompiler::new();
		let long = "x".repeat(300);
		assert_eq!(compiler.haystack(long.as_bytes()).len(), 300);
		let capacity = compiler.chars.capacity();
		assert!(capacity >= 300);
		assert_eq!(compiler.haystack(b"abc").upper(), &['A', 'B', 'C']);
		assert_eq!(compiler.chars.capacity(), capacity);
	}
}
