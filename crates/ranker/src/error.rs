use thiserror::Error;

/// Errors that can occur when mutating a [`SourceRegistry`](crate::SourceRegistry).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
	/// A source attempted to register a name that already exists in the registry.
	#[error("source '{name}' is already registered")]
	DuplicateName { name: String },

	/// A filter named a source that was never registered.
	#[error("no source named '{name}' is registered")]
	Unknown { name: String },

	/// The registry cannot address more sources.
	#[error("source registry is full ({limit} sources)")]
	Full { limit: usize },
}

/// A ranker setting that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid ranker setting {key}: {reason} (value: {value})")]
pub struct ConfigError {
	pub key: &'static str,
	pub value: String,
	pub reason: String,
}

impl ConfigError {
	pub(crate) fn invalid<V, R>(key: &'static str, value: V, reason: R) -> Self
	where
		V: ToString,
		R: Into<String>,
	{
		Self {
			key,
			value: value.to_string(),
			reason: reason.into(),
		}
	}
}

/// Errors surfaced while starting a search session.
#[derive(Debug, Error)]
pub enum SessionError {
	#[error(transparent)]
	Config(#[from] ConfigError),

	#[error("failed to spawn ranker worker: {0}")]
	Spawn(#[from] std::io::Error),
}
