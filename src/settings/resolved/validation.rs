use super::{ConfigError, ConfigSources, ResolvedConfig};

pub(super) fn validate(config: &ResolvedConfig, sources: &ConfigSources) -> Result<(), ConfigError> {
	if let Err(err) = config.ranker.validate() {
		let key = format!("ranker.{}", err.key);
		let origin = sources.source_for(&key);
		return Err(ConfigError::invalid(key, err.value, origin, err.reason));
	}

	if let Some(threads) = config.filesystem.threads
		&& threads == 0
	{
		return Err(ConfigError::invalid(
			"filesystem.threads",
			threads.to_string(),
			sources.source_for("filesystem.threads"),
			"must be greater than zero",
		));
	}

	if let Some(max_depth) = config.filesystem.max_depth
		&& max_depth == 0
	{
		return Err(ConfigError::invalid(
			"filesystem.max_depth",
			max_depth.to_string(),
			sources.source_for("filesystem.max_depth"),
			"must be at least 1",
		));
	}

	if config.limit == 0 {
		return Err(ConfigError::invalid(
			"search.limit",
			"0",
			sources.source_for("search.limit"),
			"must be at least 1",
		));
	}

	if config.timeout.is_zero() {
		return Err(ConfigError::invalid(
			"search.timeout_ms",
			"0",
			sources.source_for("search.timeout_ms"),
			"must be greater than zero",
		));
	}

	Ok(())
}
