use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{ArgAction, ColorChoice, Parser};

use super::options::OutputFormat;
use super::styles::{cli_styles, long_version};

/// Command-line arguments accepted by the `frz` binary.
#[derive(Parser, Debug)]
#[command(
	name = "frz",
	version,
	long_version = long_version(),
	about = "Rank files or lines against a fuzzy query",
	color = ColorChoice::Auto,
	styles = cli_styles()
)]
pub(crate) struct CliArgs {
	#[arg(
		short,
		long = "config",
		value_name = "FILE",
		env = "FRZ_CONFIG",
		action = ArgAction::Append,
		help = "Additional configuration file to merge (default: none)"
	)]
	pub(crate) config: Vec<PathBuf>,

	#[arg(
		short = 'n',
		long = "no-config",
		help = "Skip loading default configuration files (default: disabled)"
	)]
	pub(crate) no_config: bool,

	#[arg(
		short = 'q',
		long,
		value_name = "QUERY",
		help = "Query to rank candidates against (default: empty, lists everything)"
	)]
	pub(crate) query: Option<String>,

	#[arg(
		short = 'r',
		long,
		value_name = "PATH",
		conflicts_with_all = ["stdin", "input"],
		help = "Rank the files below this directory (default: current directory)"
	)]
	pub(crate) root: Option<PathBuf>,

	#[arg(
		long,
		conflicts_with = "input",
		help = "Rank the lines read from standard input (default: disabled)"
	)]
	pub(crate) stdin: bool,

	#[arg(
		short = 'i',
		long,
		value_name = "FILE",
		help = "Rank the lines of a text file (default: none)"
	)]
	pub(crate) input: Option<PathBuf>,

	#[arg(
		short = 'k',
		long,
		value_name = "NUM",
		help = "Print at most this many matches (default: 20)"
	)]
	pub(crate) limit: Option<usize>,

	#[arg(
		short = 'w',
		long,
		value_name = "NUM",
		help = "Ranking worker threads (default: available parallelism)"
	)]
	pub(crate) workers: Option<usize>,

	#[arg(
		long = "dedup",
		value_parser = BoolishValueParser::new(),
		help = "Collapse candidates with near-equal dedup keys (default: enabled)"
	)]
	pub(crate) dedup: Option<bool>,

	#[arg(
		long = "timeout-ms",
		value_name = "MILLIS",
		help = "Give up waiting for the ranked result after this long (default: 30000)"
	)]
	pub(crate) timeout_ms: Option<u64>,

	#[arg(
		short = 'H',
		long = "hidden",
		value_parser = BoolishValueParser::new(),
		help = "Include hidden files (default: enabled)"
	)]
	pub(crate) hidden: Option<bool>,

	#[arg(
		short = 's',
		long = "follow-symlinks",
		value_parser = BoolishValueParser::new(),
		help = "Follow symbolic links while scanning (default: disabled)"
	)]
	pub(crate) follow_symlinks: Option<bool>,

	#[arg(
		long = "respect-ignore-files",
		value_parser = BoolishValueParser::new(),
		help = "Respect .ignore files (default: enabled)"
	)]
	pub(crate) respect_ignore_files: Option<bool>,

	#[arg(
		long = "git-ignore",
		value_parser = BoolishValueParser::new(),
		help = "Respect .gitignore files (default: enabled)"
	)]
	pub(crate) git_ignore: Option<bool>,

	#[arg(
		long = "git-global",
		value_parser = BoolishValueParser::new(),
		help = "Respect global gitignore settings (default: enabled)"
	)]
	pub(crate) git_global: Option<bool>,

	#[arg(
		long = "git-exclude",
		value_parser = BoolishValueParser::new(),
		help = "Respect git exclude files (default: enabled)"
	)]
	pub(crate) git_exclude: Option<bool>,

	#[arg(
		short = 'j',
		long,
		value_name = "NUM",
		help = "Limit the number of directory walker threads (default: automatic)"
	)]
	pub(crate) threads: Option<usize>,

	#[arg(
		short = 'd',
		long = "max-depth",
		value_name = "NUM",
		help = "Limit directory traversal depth (default: unlimited)"
	)]
	pub(crate) max_depth: Option<usize>,

	#[arg(
		long = "extensions",
		value_delimiter = ',',
		value_name = "EXT",
		help = "Restrict files to specific extensions (default: all)"
	)]
	pub(crate) extensions: Option<Vec<String>>,

	#[arg(
		long = "global-ignores",
		value_delimiter = ',',
		value_name = "NAME",
		help = "Comma-separated directory names to always ignore (default: .git,node_modules,target,.venv,.cache,__pycache__)"
	)]
	pub(crate) global_ignores: Option<Vec<String>>,

	#[arg(
		short = 'p',
		long = "print-config",
		help = "Print the resolved configuration before running (default: disabled)"
	)]
	pub(crate) print_config: bool,

	#[arg(
		short = 'o',
		long = "output",
		value_enum,
		default_value_t = OutputFormat::Plain,
		help = "Choose how to print the ranked matches"
	)]
	pub(crate) output: OutputFormat,
}
