// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Config file locations.
//!
//! The user file follows the XDG Base Directory layout; the workspace file
//! lives under `.weft/` in the directory the agent was started from.

use std::path::{Path, PathBuf};

use crate::ConfigError;

pub const SYSTEM_CONFIG_FILE: &str = "/etc/weft/config.toml";
pub const WORKSPACE_CONFIG_FILE: &str = ".weft/config.toml";

/// Where weft looks for its config files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathsConfig {
	/// `$XDG_CONFIG_HOME/weft/config.toml`
	pub user_config_file: PathBuf,
	pub system_config_file: PathBuf,
}

impl PathsConfig {
	pub fn under_config_home(config_home: &Path) -> Self {
		Self {
			user_config_file: config_home.join("weft").join("config.toml"),
			system_config_file: PathBuf::from(SYSTEM_CONFIG_FILE),
		}
	}
}

impl Default for PathsConfig {
	fn default() -> Self {
		Self::under_config_home(Path::new("~/.config"))
	}
}

/// Resolve the user config location from `XDG_CONFIG_HOME`, falling back to
/// `~/.config`.
pub fn resolve_xdg_paths() -> Result<PathsConfig, ConfigError> {
	let config_home = match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
		Some(dir) => PathBuf::from(dir),
		None => dirs::home_dir()
			.ok_or(ConfigError::HomeDirNotFound)?
			.join(".config"),
	};

	tracing::debug!(config_home = %config_home.display(), "resolved config home");

	Ok(PathsConfig::under_config_home(&config_home))
}

/// Workspace config file beneath the current directory.
pub fn workspace_config_path() -> Result<PathBuf, ConfigError> {
	Ok(std::env::current_dir()?.join(WORKSPACE_CONFIG_FILE))
}
