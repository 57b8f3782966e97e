use crate::record::Record;

/// One stable counting-sort pass over an 8-bit digit.
///
/// Sorts `records` through `scratch` and swaps them, so the result is always
/// back in `records`. A pass where every record shares one digit is skipped.
pub(super) fn pass(
	records: &mut Vec<Record>,
	scratch: &mut Vec<Record>,
	digit: impl Fn(Record) -> usize,
) {
	let mut counts = [0usize; 256];
	for record in records.iter() {
		counts[digit(*record)] += 1;
	}
	if counts.iter().any(|&count| count == records.len()) {
		return;
	}

	let mut offsets = [0usize; 256];
	let mut running = 0;
	for (offset, count) in offsets.iter_mut().zip(counts) {
		*offset = running;
		running += count;
	}

	scratch.clear();
	scratch.resize(records.len(), Record::default());
	for record in records.iter() {
		let bucket = digit(*record);
		scratch[offsets[bucket]] = *record;
		offsets[bucket] += 1;
	}
	std::mem::swap(records, scratch);
}
