use super::{InputSource, ResolvedConfig};

pub(super) fn print_summary(config: &ResolvedConfig) {
	print!("{}", render_summary(config));
}

pub(super) fn render_summary(config: &ResolvedConfig) -> String {
	let mut lines = vec!["Effective configuration:".to_string()];
	match &config.input {
		InputSource::Files { root } => lines.push(format!("  Input: files below {}", root.display())),
		InputSource::Stdin => lines.push("  Input: lines from standard input".to_string()),
		InputSource::File(path) => lines.push(format!("  Input: lines from {}", path.display())),
	}
	if config.query.is_empty() {
		lines.push("  Query: (empty, lists everything)".to_string());
	} else {
		lines.push(format!("  Query: {}", config.query));
	}
	lines.push(format!("  Limit: {}", config.limit));
	lines.push(format!("  Timeout: {} ms", config.timeout.as_millis()));

	let ranker = &config.ranker;
	lines.push(format!("  Workers: {}", ranker.workers));
	lines.push(format!(
		"  Sheets: {} x {} slots",
		ranker.max_sheets, ranker.sheet_slots
	));
	lines.push(format!(
		"  Dedup: {} (window {})",
		bool_to_word(ranker.dedup),
		ranker.dedup_window
	));
	lines.push(format!(
		"  Parallel merge: from {} records on {} threads",
		ranker.parallel_merge_threshold,
		ranker.merge_threads.unwrap_or(ranker.workers)
	));
	lines.push(format!("  Max haystack length: {}", ranker.max_haystack_len));

	if matches!(config.input, InputSource::Files { .. }) {
		let fs = &config.filesystem;
		lines.push(format!("  Include hidden: {}", bool_to_word(fs.include_hidden)));
		lines.push(format!("  Follow symlinks: {}", bool_to_word(fs.follow_symlinks)));
		lines.push(format!(
			"  Respect ignore files: {}",
			bool_to_word(fs.respect_ignore_files)
		));
		lines.push(format!("  Git ignore: {}", bool_to_word(fs.git_ignore)));
		lines.push(format!("  Git global: {}", bool_to_word(fs.git_global)));
		lines.push(format!("  Git exclude: {}", bool_to_word(fs.git_exclude)));
		match fs.max_depth {
			Some(depth) => lines.push(format!("  Max depth: {depth}")),
			None => lines.push("  Max depth: unlimited".to_string()),
		}
		match &fs.allowed_extensions {
			Some(exts) if !exts.is_empty() => {
				lines.push(format!("  Allowed extensions: {}", exts.join(", ")));
			}
			_ => lines.push("  Allowed extensions: (all)".to_string()),
		}
		if let Some(threads) = fs.threads {
			lines.push(format!("  Walker threads: {threads}"));
		}
		if !fs.global_ignores.is_empty() {
			lines.push(format!("  Global ignores: {}", fs.global_ignores.join(", ")));
		}
	}

	let mut out = lines.join("\n");
	out.push('\n');
	out
}

fn bool_to_word(value: bool) -> &'static str {
	if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
	use std::path::PathBuf;
	use std::time::Duration;

	use frz::{FilesystemOptions, RankerConfig};

	use super::*;

	#[test]
	fn bool_to_word_matches_expectations() {
		assert_eq!(bool_to_word(true), "yes");
		assert_eq!(bool_to_word(false), "no");
	}

	#[test]
	fn summary_describes_the_walk_only_for_files() {
		let mut config = ResolvedConfig {
			ranker: RankerConfig::default(),
			input: InputSource::Files {
				root: PathBuf::from("/tmp"),
			},
			filesystem: FilesystemOptions::default(),
			query: "main".into(),
			limit: 5,
			timeout: Duration::from_millis(250),
		};
		let files = render_summary(&config);
		assert!(files.contains("Input: files below /tmp"));
		assert!(files.contains("Query: main"));
		assert!(files.contains("Timeout: 250 ms"));
		assert!(files.contains("Git ignore: yes"));

		config.input = InputSource::Stdin;
		let lines = render_summary(&config);
		assert!(lines.contains("standard input"));
		assert!(!lines.contains("Git ignore"));
	}
}
