//! Pluggable candidate providers and the registry that orders them.

use std::fmt;
use std::sync::Arc;

use crate::accumulator::Accumulator;
use crate::error::RegistryError;

/// A provider of candidates, split into independently searchable shards.
///
/// Shards are scheduled across the worker pool in any order and possibly in
/// parallel, so a source must not rely on one shard running before another.
/// Long shards should poll [`Accumulator::is_stale`] and return early once a
/// newer search has started.
pub trait Source<M>: Send + Sync {
	/// Unique name used for registration and filtering.
	fn name(&self) -> &str;

	/// Whether the source takes part in searches at all.
	fn is_enabled(&self) -> bool {
		true
	}

	/// Queries shorter than this (in codepoints) skip the source.
	fn min_query_len(&self) -> usize {
		0
	}

	/// Number of shards to schedule for the current search.
	fn shard_count(&self) -> u32;

	/// Score and insert the candidates of one shard.
	fn search_shard(&self, shard: u32, results: &mut Accumulator<'_, M>);
}

/// Registration index of a source, stamped into every record it produces.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u16);

impl SourceId {
	#[must_use]
	pub const fn from_index(index: u16) -> Self {
		Self(index)
	}

	#[must_use]
	pub const fn index(self) -> u16 {
		self.0
	}
}

impl fmt::Display for SourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "#{}", self.0)
	}
}

/// Restricts a search to a subset of registered sources.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SourceFilter {
	#[default]
	All,
	Only(Vec<String>),
}

impl SourceFilter {
	/// Filter that admits only the named sources.
	pub fn only<I, S>(names: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::Only(names.into_iter().map(Into::into).collect())
	}

	#[must_use]
	pub fn admits(&self, name: &str) -> bool {
		match self {
			Self::All => true,
			Self::Only(names) => names.iter().any(|allowed| allowed == name),
		}
	}
}

/// One scheduled unit of work: a shard of a source.
///
/// Packs the source index in the low half and the shard index in the high
/// half of a `u64`, so the whole schedule fits a flat array of tickets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct ShardTicket(u64);

impl ShardTicket {
	pub(crate) const fn new(source: SourceId, shard: u32) -> Self {
		Self((shard as u64) << 32 | source.0 as u64)
	}

	pub(crate) const fn source(self) -> SourceId {
		SourceId(self.0 as u16)
	}

	pub(crate) const fn shard(self) -> u32 {
		(self.0 >> 32) as u32
	}
}

/// A registered source with its assigned identifier.
pub struct RegisteredSource<M> {
	id: SourceId,
	source: Arc<dyn Source<M>>,
}

impl<M> RegisteredSource<M> {
	#[must_use]
	pub fn id(&self) -> SourceId {
		self.id
	}

	#[must_use]
	pub fn name(&self) -> &str {
		self.source.name()
	}

	#[must_use]
	pub fn source(&self) -> &Arc<dyn Source<M>> {
		&self.source
	}
}

impl<M> Clone for RegisteredSource<M> {
	fn clone(&self) -> Self {
		Self {
			id: self.id,
			source: Arc::clone(&self.source),
		}
	}
}

impl<M> fmt::Debug for RegisteredSource<M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("RegisteredSource")
			.field("id", &self.id)
			.field("name", &self.name())
			.finish()
	}
}

/// Registry of every source contributing candidates, in registration order.
pub struct SourceRegistry<M> {
	sources: Vec<RegisteredSource<M>>,
}

impl<M> SourceRegistry<M> {
	/// Highest number of sources a registry can address.
	pub const LIMIT: usize = u16::MAX as usize + 1;

	/// Create an empty registry.
	#[must_use]
	pub fn new() -> Self {
		Self {
			sources: Vec::new(),
		}
	}

	/// Register a source. Names must be unique.
	pub fn register<S>(&mut self, source: S) -> Result<SourceId, RegistryError>
	where
		S: Source<M> + 'static,
	{
		self.register_arc(Arc::new(source))
	}

	/// Register a shared source. Names must be unique.
	pub fn register_arc(&mut self, source: Arc<dyn Source<M>>) -> Result<SourceId, RegistryError> {
		if self.contains(source.name()) {
			return Err(RegistryError::DuplicateName {
				name: source.name().to_owned(),
			});
		}
		let index = u16::try_from(self.sources.len())
			.map_err(|_| RegistryError::Full { limit: Self::LIMIT })?;
		let id = SourceId(index);
		self.sources.push(RegisteredSource { id, source });
		Ok(id)
	}

	/// Lookup a source by identifier.
	#[must_use]
	pub fn get(&self, id: SourceId) -> Option<&RegisteredSource<M>> {
		self.sources.get(usize::from(id.0))
	}

	/// Lookup a source by name.
	#[must_use]
	pub fn by_name(&self, name: &str) -> Option<&RegisteredSource<M>> {
		self.sources.iter().find(|source| source.name() == name)
	}

	/// Returns `true` if a source with this name has been registered.
	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.by_name(name).is_some()
	}

	/// Iterate over registered sources in registration order.
	pub fn iter(&self) -> impl Iterator<Item = &RegisteredSource<M>> {
		self.sources.iter()
	}

	/// Return the number of registered sources.
	#[must_use]
	pub fn len(&self) -> usize {
		self.sources.len()
	}

	/// Returns `true` when no sources have been registered.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.sources.is_empty()
	}

	/// Ensure every name `filter` admits explicitly is registered.
	pub fn check(&self, filter: &SourceFilter) -> Result<(), RegistryError> {
		match filter {
			SourceFilter::All => Ok(()),
			SourceFilter::Only(names) => match names.iter().find(|name| !self.contains(name)) {
				Some(name) => Err(RegistryError::Unknown { name: name.clone() }),
				None => Ok(()),
			},
		}
	}

	/// Sources eligible for `query_len` under `filter`.
	pub fn eligible<'a>(
		&'a self,
		filter: &'a SourceFilter,
		query_len: usize,
	) -> impl Iterator<Item = &'a RegisteredSource<M>> + 'a {
		self.sources.iter().filter(move |registered| {
			let source = &registered.source;
			source.is_enabled() && query_len >= source.min_query_len() && filter.admits(source.name())
		})
	}

	/// Flatten every eligible source's shards into a schedule.
	pub(crate) fn schedule(&self, filter: &SourceFilter, query_len: usize) -> Vec<ShardTicket> {
		self.eligible(filter, query_len)
			.flat_map(|registered| {
				let id = registered.id;
				(0..registered.source.shard_count()).map(move |shard| ShardTicket::new(id, shard))
			})
			.collect()
	}
}

impl<M> Default for SourceRegistry<M> {
	fn default() -> Self {
		Self::new()
	}
}

impl<M> fmt::Debug for SourceRegistry<M> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.sources.iter()).finish()
	}
}
