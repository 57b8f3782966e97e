//! Core crate exports for the `frz` command-line fuzzy finder.
//!
//! The ranking engine lives in [`frz_ranker`]; this crate adds the built-in
//! candidate sources, directory resolution and logging setup used by the
//! binary, and re-exports the engine types embedders need.

pub mod app_dirs;
pub mod logging;
pub mod sources;

pub use frz_ranker::{
	Accumulator, Query, RankerConfig, ResultSet, Session, Source, SourceFilter, SourceId,
};
pub use sources::{FilesSource, FilesystemOptions, LinesSource, Match};
