//! Resolve configuration and data directories for `frz`.
//!
//! Environment overrides win; otherwise the platform locations provided by the
//! `directories` crate are used.

use std::env;
use std::path::PathBuf;

use anyhow::{Result, anyhow};
use directories::ProjectDirs;

const QUALIFIER: &str = "io";
const ORGANIZATION: &str = "albo";
const APPLICATION: &str = "frz";

const CONFIG_DIR_ENV: &str = "FRZ_CONFIG_DIR";
const DATA_DIR_ENV: &str = "FRZ_DATA_DIR";

fn project_dirs() -> Result<ProjectDirs> {
	ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
		.ok_or_else(|| anyhow!("unable to determine project directories for frz"))
}

/// An empty override counts as unset.
fn dir_from_env(name: &str) -> Option<PathBuf> {
	env::var_os(name)
		.filter(|value| !value.is_empty())
		.map(PathBuf::from)
}

/// Directory holding `config.toml`.
pub fn get_config_dir() -> Result<PathBuf> {
	match dir_from_env(CONFIG_DIR_ENV) {
		Some(dir) => Ok(dir),
		None => Ok(project_dirs()?.config_local_dir().to_path_buf()),
	}
}

/// Directory for persistent application data.
pub fn get_data_dir() -> Result<PathBuf> {
	match dir_from_env(DATA_DIR_ENV) {
		Some(dir) => Ok(dir),
		None => Ok(project_dirs()?.data_local_dir().to_path_buf()),
	}
}
