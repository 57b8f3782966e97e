use std::fmt;

use rustc_hash::FxHashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SettingSource {
	CliFlag(&'static str),
	Environment(&'static str),
	ConfigKey(String),
}

impl fmt::Display for SettingSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::CliFlag(flag) => write!(f, "CLI flag `{flag}`"),
			Self::Environment(var) => write!(f, "environment variable `{var}`"),
			Self::ConfigKey(key) => write!(f, "configuration key `{key}`"),
		}
	}
}

/// Origin of each explicitly set setting, keyed by dotted config key.
#[derive(Debug, Default, Clone)]
pub(crate) struct ConfigSources {
	origins: FxHashMap<&'static str, SettingSource>,
}

impl ConfigSources {
	pub(crate) fn record(&mut self, key: &'static str, origin: SettingSource) {
		self.origins.insert(key, origin);
	}

	/// Origin of `key`; settings nobody set explicitly report the config key.
	pub(crate) fn source_for(&self, key: &str) -> SettingSource {
		self.origins
			.get(key)
			.cloned()
			.unwrap_or_else(|| SettingSource::ConfigKey(key.to_owned()))
	}
}
