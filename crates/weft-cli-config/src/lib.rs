// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration management for the weft agent.
//!
//! This crate provides:
//! - XDG Base Directory compliant path resolution
//! - Layered configuration from TOML files, `WEFT_*` environment
//!   variables and command-line overrides
//! - Configuration validation
//! - Tracing subscriber setup

pub mod error;
pub mod layer;
pub mod logging;
pub mod paths;
pub mod registry;
pub mod runtime;
pub mod sources;
pub mod validation;

pub use error::ConfigError;
pub use layer::ConfigLayer;
pub use logging::init_tracing;
pub use paths::PathsConfig;
pub use registry::ConfigRegistry;
pub use runtime::{LogFormat, LogLevel, LoggingConfig, WeftConfig};
pub use sources::{CliOverrides, ConfigSource, Precedence};

/// Load configuration from all sources with default precedence.
pub fn load_config() -> Result<WeftConfig, ConfigError> {
	load_config_with_cli(sources::CliOverrides::default())
}

/// Load configuration with CLI overrides.
pub fn load_config_with_cli(cli: sources::CliOverrides) -> Result<WeftConfig, ConfigError> {
	let paths = paths::resolve_xdg_paths()?;

	let mut registry = ConfigRegistry::new();

	registry.register(Box::new(sources::DefaultsSource));
	registry.register(Box::new(sources::FileSource::system()));
	registry.register(Box::new(sources::FileSource::user(&paths)));
	if let Ok(ws) = sources::FileSource::workspace() {
		registry.register(Box::new(ws));
	}
	if let Some(path) = cli.config_file.clone() {
		registry.register(Box::new(sources::FileSource::custom(
			path,
			Precedence::WorkspaceFile,
			"cli-config-file",
		)));
	}
	registry.register(Box::new(sources::EnvSource::process()));
	registry.register(Box::new(sources::CliSource::new(cli)));

	registry.load(paths)
}
