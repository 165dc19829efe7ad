// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: files, environment, CLI, defaults.

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace, warn};

use crate::layer::*;
use crate::paths::{PathsConfig, SYSTEM_CONFIG_FILE, WORKSPACE_CONFIG_FILE};
use crate::ConfigError;

pub const ENV_PREFIX: &str = "WEFT_";

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	SystemFile = 20,
	UserFile = 30,
	WorkspaceFile = 40,
	Environment = 50,
	Cli = 60,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	/// Name for logging
	fn name(&self) -> &'static str;

	/// Precedence level
	fn precedence(&self) -> Precedence;

	/// Load configuration layer from this source
	fn load(&self) -> Result<ConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading defaults");
		// Defaults are applied when the runtime config is built.
		Ok(ConfigLayer::default())
	}
}

/// File-based configuration source (TOML).
pub struct FileSource {
	path: PathBuf,
	precedence: Precedence,
	name: &'static str,
}

impl FileSource {
	/// System config: /etc/weft/config.toml
	pub fn system() -> Self {
		Self {
			path: PathBuf::from(SYSTEM_CONFIG_FILE),
			precedence: Precedence::SystemFile,
			name: "system-config",
		}
	}

	/// User config: ~/.config/weft/config.toml
	pub fn user(paths: &PathsConfig) -> Self {
		Self {
			path: paths.user_config_file.clone(),
			precedence: Precedence::UserFile,
			name: "user-config",
		}
	}

	/// Workspace config: .weft/config.toml
	pub fn workspace() -> Result<Self, ConfigError> {
		let cwd = std::env::current_dir()?;
		Ok(Self {
			path: cwd.join(WORKSPACE_CONFIG_FILE),
			precedence: Precedence::WorkspaceFile,
			name: "workspace-config",
		})
	}

	/// Custom file path with specified precedence
	pub fn custom(path: PathBuf, precedence: Precedence, name: &'static str) -> Self {
		Self {
			path,
			precedence,
			name,
		}
	}
}

impl ConfigSource for FileSource {
	fn name(&self) -> &'static str {
		self.name
	}
	fn precedence(&self) -> Precedence {
		self.precedence
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(
					path = %self.path.display(),
					source = self.name,
					"config file not found, skipping"
			);
			return Ok(ConfigLayer::default());
		}

		debug!(path = %self.path.display(), source = self.name, "loading config file");

		let content = std::fs::read_to_string(&self.path)?;
		let layer: ConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!(source = self.name, "parsed config layer");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Reads `WEFT_*` variables from the process environment, or from a fixed
/// snapshot when built with [`EnvSource::from_vars`].
#[derive(Default)]
pub struct EnvSource {
	vars: Option<Vec<(String, String)>>,
}

impl EnvSource {
	pub fn process() -> Self {
		Self { vars: None }
	}

	pub fn from_vars<I, K, V>(vars: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(
				vars
					.into_iter()
					.map(|(k, v)| (k.into(), v.into()))
					.collect(),
			),
		}
	}

	fn snapshot(&self) -> Vec<(String, String)> {
		match &self.vars {
			Some(vars) => vars.clone(),
			None => std::env::vars().collect(),
		}
	}
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Option<T> {
	match value.parse() {
		Ok(v) => Some(v),
		Err(_) => {
			warn!(key = %key, value = %value, "ignoring unparseable environment value");
			None
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading environment variables");
		let mut layer = ConfigLayer::default();

		for (key, value) in self.snapshot() {
			if !key.starts_with(ENV_PREFIX) {
				continue;
			}

			let value = value.trim().to_string();
			if value.is_empty() {
				continue;
			}

			trace!(key = %key, "processing env var");

			match key.as_str() {
				"WEFT_MODEL" => layer.agent_mut().default_model = Some(value),
				"WEFT_PROMPT_BUDGET_RATIO" => {
					layer.agent_mut().prompt_budget_ratio = parse_env(&key, &value);
				}
				"WEFT_CONTEXT_WINDOW" => {
					layer.agent_mut().default_context_window = parse_env(&key, &value);
				}
				"WEFT_MAX_NUDGES" => layer.agent_mut().max_nudges = parse_env(&key, &value),
				"WEFT_REASONING_EFFORT" => layer.agent_mut().reasoning_effort = Some(value),
				"WEFT_TOOL_OUTPUT_LIMIT" => {
					layer.agent_mut().tool_output_limit = parse_env(&key, &value);
				}
				"WEFT_WORKSPACE_ROOT" => {
					layer.agent_mut().workspace_root = Some(PathBuf::from(value));
				}
				"WEFT_LOG_LEVEL" => layer.logging_mut().level = Some(value),
				"WEFT_LOG_FORMAT" => layer.logging_mut().format = Some(value),
				_ => {
					// Unknown WEFT_ variable, ignore
				}
			}
		}

		Ok(layer)
	}
}

/// CLI override source.
pub struct CliSource {
	overrides: CliOverrides,
}

/// Overrides supplied by the embedding binary's command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
	pub model: Option<String>,
	pub workspace: Option<PathBuf>,
	pub log_level: Option<String>,
	pub log_format: Option<String>,
	/// Extra TOML file merged above the workspace file.
	pub config_file: Option<PathBuf>,
}

impl CliSource {
	pub fn new(overrides: CliOverrides) -> Self {
		Self { overrides }
	}
}

impl ConfigSource for CliSource {
	fn name(&self) -> &'static str {
		"cli"
	}
	fn precedence(&self) -> Precedence {
		Precedence::Cli
	}

	fn load(&self) -> Result<ConfigLayer, ConfigError> {
		debug!("loading CLI overrides");
		let mut layer = ConfigLayer::default();

		if let Some(ref model) = self.overrides.model {
			layer.agent_mut().default_model = Some(model.clone());
		}

		if let Some(ref workspace) = self.overrides.workspace {
			layer.agent_mut().workspace_root = Some(workspace.clone());
		}

		if let Some(ref level) = self.overrides.log_level {
			layer.logging_mut().level = Some(level.clone());
		}

		if let Some(ref format) = self.overrides.log_format {
			layer.logging_mut().format = Some(format.clone());
		}

		Ok(layer)
	}
}
