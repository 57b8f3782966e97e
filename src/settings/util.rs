use rustc_hash::FxHashSet;

/// Normalize and deduplicate file extensions provided by the user.
pub(super) fn sanitize_extensions(values: Vec<String>) -> Vec<String> {
	let mut seen = FxHashSet::default();
	let mut cleaned = Vec::new();
	for value in values {
		let normalized = frz::sources::normalize_extension(&value);
		if normalized.is_empty() {
			continue;
		}
		if seen.insert(normalized.clone()) {
			cleaned.push(normalized);
		}
	}
	cleaned
}

/// Trim entries and drop the empty ones.
pub(super) fn sanitize_names(values: Vec<String>) -> Vec<String> {
	values
		.into_iter()
		.map(|value| value.trim().to_string())
		.filter(|value| !value.is_empty())
		.collect()
}
