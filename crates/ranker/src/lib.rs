//! Concurrent fuzzy ranking engine behind `frz`.
//!
//! A [`Session`] owns a worker pool and a [`SourceRegistry`]. Each search
//! starts a new generation: registered [`Source`]s are split into shards, the
//! shards are scored on the pool through per-worker [`Accumulator`]s, and the
//! last worker to finish dedups and ranks everything into a [`ResultSet`] that
//! is published to the consumer. Candidates are materialized lazily, only for
//! the rows a presentation layer actually reads.

mod accumulator;
mod config;
mod coordinator;
mod error;
mod generation;
pub mod merge;
mod pool;
pub mod query;
mod record;
mod result_set;
pub mod scorer;
mod sheet;
mod source;

pub use accumulator::{Accumulator, USER_KEY_MASK, UniqueKeys};
pub use config::{DEFAULT_MAX_SHEETS, DEFAULT_SHEET_SLOTS, RankerConfig};
pub use coordinator::Session;
pub use error::{ConfigError, RegistryError, SessionError};
pub use generation::GenerationClock;
pub use merge::{DEFAULT_DEDUP_WINDOW, MergeOptions, MergeStats};
pub use query::{Query, QueryCompiler, Text};
pub use record::{AtomicRecord, Record, RecordBuffer};
pub use result_set::ResultSet;
pub use scorer::{SCORE_MAX, SCORE_MIN, Score, Scorer};
pub use sheet::{Destructor, Factory};
pub use source::{RegisteredSource, Source, SourceFilter, SourceId, SourceRegistry};
