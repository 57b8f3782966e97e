use std::ffi::OsString;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use anyhow::{Result, bail};
use frz_ranker::{Accumulator, Source};
use ignore::{DirEntry, Error as IgnoreError, WalkBuilder, WalkState};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CandidateList, Match, position_key};

/// Directory traversal settings for the `files` source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemOptions {
	/// Include hidden files and directories.
	pub include_hidden: bool,
	/// Follow symbolic links during traversal.
	pub follow_symlinks: bool,
	/// Respect .ignore files.
	pub respect_ignore_files: bool,
	/// Respect .gitignore files.
	pub git_ignore: bool,
	/// Respect global gitignore settings.
	pub git_global: bool,
	/// Respect git exclude files.
	pub git_exclude: bool,
	/// Directory names to always skip.
	pub global_ignores: Vec<String>,
	/// Walker threads.
	pub threads: Option<usize>,
	/// Maximum directory traversal depth.
	pub max_depth: Option<usize>,
	/// Only keep files with one of these extensions.
	pub allowed_extensions: Option<Vec<String>>,
}

impl Default for FilesystemOptions {
	fn default() -> Self {
		Self {
			include_hidden: true,
			follow_symlinks: false,
			respect_ignore_files: true,
			git_ignore: true,
			git_global: true,
			git_exclude: true,
			global_ignores: [
				".git",
				"node_modules",
				"target",
				".venv",
				".cache",
				"__pycache__",
			]
			.into_iter()
			.map(str::to_owned)
			.collect(),
			threads: None,
			max_depth: None,
			allowed_extensions: None,
		}
	}
}

impl FilesystemOptions {
	/// Normalised extension set, if filtering is configured.
	pub fn extension_filter(&self) -> Option<FxHashSet<String>> {
		self.allowed_extensions.as_ref().map(|extensions| {
			extensions
				.iter()
				.map(|ext| normalize_extension(ext))
				.filter(|ext| !ext.is_empty())
				.collect()
		})
	}

	pub fn global_ignore_set(&self) -> FxHashSet<OsString> {
		self.global_ignores
			.iter()
			.map(|entry| OsString::from(entry.as_str()))
			.collect()
	}

	/// Effective walker thread count, defaulting to available parallelism.
	pub fn thread_count(&self) -> usize {
		self.threads
			.filter(|threads| *threads > 0)
			.unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get))
	}
}

/// Trim and lowercase an extension, dropping leading dots.
pub fn normalize_extension(ext: &str) -> String {
	ext.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Walk `root` and return every admitted file as a sorted path relative to it.
pub fn collect_paths(root: &Path, options: &FilesystemOptions) -> Result<Vec<String>> {
	if !root.is_dir() {
		bail!("{} is not a directory", root.display());
	}

	let (tx, rx) = mpsc::channel::<String>();
	let walker_root = Arc::new(root.to_path_buf());
	let extension_filter = options.extension_filter().map(Arc::new);
	let global_ignores = Arc::new(options.global_ignore_set());

	WalkBuilder::new(walker_root.as_path())
		.hidden(!options.include_hidden)
		.follow_links(options.follow_symlinks)
		.git_ignore(options.git_ignore)
		.git_global(options.git_global)
		.git_exclude(options.git_exclude)
		.ignore(options.respect_ignore_files)
		.parents(true)
		.threads(options.thread_count())
		.max_depth(options.max_depth)
		.build_parallel()
		.run(|| {
			let sender = tx.clone();
			let root = Arc::clone(&walker_root);
			let extension_filter = extension_filter.clone();
			let global_ignores = Arc::clone(&global_ignores);
			Box::new(move |entry: Result<DirEntry, IgnoreError>| {
				let entry = match entry {
					Ok(entry) => entry,
					Err(error) => {
						debug!(%error, "skipping unreadable entry");
						return WalkState::Continue;
					}
				};
				if !entry.file_type().is_some_and(|kind| kind.is_file()) {
					return WalkState::Continue;
				}
				let relative = relative_path(&root, entry.path());
				if relative
					.components()
					.any(|component| global_ignores.contains(component.as_os_str()))
				{
					return WalkState::Continue;
				}
				if let Some(filter) = extension_filter.as_ref() {
					let extension = relative
						.extension()
						.and_then(|ext| ext.to_str())
						.map(|ext| ext.to_ascii_lowercase());
					if extension.as_ref().is_none_or(|ext| !filter.contains(ext)) {
						return WalkState::Continue;
					}
				}
				let text = relative.to_string_lossy().into_owned();
				if sender.send(text).is_err() {
					return WalkState::Quit;
				}
				WalkState::Continue
			})
		});
	drop(tx);

	let mut paths: Vec<String> = rx.into_iter().collect();
	paths.sort_unstable();
	debug!(root = %root.display(), files = paths.len(), "filesystem walk complete");
	Ok(paths)
}

fn relative_path(root: &Path, path: &Path) -> PathBuf {
	path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Ranks the files below a directory by their relative path.
///
/// Paths are sorted, so neighbouring candidates share prefixes and the
/// resuming scorer can skip most of each scoring matrix.
#[derive(Debug, Clone)]
pub struct FilesSource {
	list: CandidateList,
}

impl FilesSource {
	pub const NAME: &'static str = "files";

	/// Walk `root` and build the source. `window` is the dedup window of the
	/// session the source will be registered with.
	pub fn scan(root: &Path, options: &FilesystemOptions, window: u32) -> Result<Self> {
		let paths = collect_paths(root, options)?;
		if paths.is_empty() {
			warn!(root = %root.display(), "no files found");
		}
		Ok(Self::from_paths(paths, window))
	}

	/// Build the source from an already collected path list. The list is
	/// sorted and deduplicated first.
	pub fn from_paths(mut paths: Vec<String>, window: u32) -> Self {
		paths.sort_unstable();
		paths.dedup();
		let keys = (0..paths.len())
			.map(|index| position_key(index, window))
			.collect();
		Self {
			list: CandidateList::new(paths, keys, true),
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

	pub fn paths(&self) -> &[String] {
		self.list.items()
	}
}

impl Source<Match> for FilesSource {
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

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::tempdir;

	use super::*;

	fn touch(root: &Path, relative: &str) {
		let path = root.join(relative);
		if let Some(parent) = path.parent() {
			fs::create_dir_all(parent).unwrap();
		}
		fs::write(path, b"").unwrap();
	}

	#[test]
	fn walk_returns_sorted_relative_paths() {
		let dir = tempdir().unwrap();
		touch(dir.path(), "src/main.rs");
		touch(dir.path(), "Cargo.toml");
		touch(dir.path(), "src/lib.rs");

		let paths = collect_paths(dir.path(), &FilesystemOptions::default()).unwrap();
		let expected: Vec<String> = [
			"Cargo.toml".to_owned(),
			Path::new("src").join("lib.rs").to_string_lossy().into_owned(),
			Path::new("src").join("main.rs").to_string_lossy().into_owned(),
		]
		.into();
		assert_eq!(paths, expected);
	}

	#[test]
	fn global_ignores_and_extension_filter_apply() {
		let dir = tempdir().unwrap();
		touch(dir.path(), "target/debug/build.rs");
		touch(dir.path(), "notes.md");
		touch(dir.path(), "lib.rs");

		let options = FilesystemOptions {
			allowed_extensions: Some(vec![".RS".into()]),
			..FilesystemOptions::default()
		};
		let paths = collect_paths(dir.path(), &options).unwrap();
		assert_eq!(paths, vec!["lib.rs".to_owned()]);
	}

	#[test]
	fn hidden_files_follow_the_option() {
		let dir = tempdir().unwrap();
		touch(dir.path(), ".hidden-note");
		touch(dir.path(), "visible");

		let shown = collect_paths(dir.path(), &FilesystemOptions::default()).unwrap();
		assert_eq!(shown.len(), 2);

		let options = FilesystemOptions {
			include_hidden: false,
			..FilesystemOptions::default()
		};
		let hidden = collect_paths(dir.path(), &options).unwrap();
		assert_eq!(hidden, vec!["visible".to_owned()]);
	}

	#[test]
	fn missing_root_is_an_error() {
		let dir = tempdir().unwrap();
		let missing = dir.path().join("absent");
		assert!(collect_paths(&missing, &FilesystemOptions::default()).is_err());
	}

	#[test]
	fn from_paths_sorts_and_shards() {
		let paths = (0..10).rev().map(|i| format!("file{i}")).collect();
		let source = FilesSource::from_paths(paths, 2).with_shard_size(4);
		assert_eq!(source.len(), 10);
		assert_eq!(source.paths()[0], "file0");
		assert_eq!(source.shard_count(), 3);
	}

	#[test]
	fn extensions_are_normalised() {
		assert_eq!(normalize_extension(" .TOML "), "toml");
		assert_eq!(normalize_extension("rs"), "rs");
	}
}
