// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration registry - manages sources and merges layers.

use tracing::{debug, info, warn};

use crate::layer::ConfigLayer;
use crate::paths::PathsConfig;
use crate::runtime::WeftConfig;
use crate::sources::ConfigSource;
use crate::validation::validate_config;
use crate::ConfigError;

/// Registry that manages configuration sources and merges them.
pub struct ConfigRegistry {
	sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigRegistry {
	/// Create a new empty registry.
	pub fn new() -> Self {
		Self {
			sources: Vec::new(),
		}
	}

	/// Register a configuration source.
	pub fn register(&mut self, source: Box<dyn ConfigSource>) {
		debug!(
				source = source.name(),
				precedence = ?source.precedence(),
				"registering config source"
		);
		self.sources.push(source);
	}

	/// Load configuration from all sources, merge, and validate.
	///
	/// Sources are merged lowest precedence first. A source that fails to
	/// load is skipped with a warning; a merged result that fails
	/// validation is an error.
	pub fn load(&self, paths: PathsConfig) -> Result<WeftConfig, ConfigError> {
		let mut sorted_sources: Vec<_> = self.sources.iter().collect();
		sorted_sources.sort_by_key(|s| s.precedence());

		info!(
			source_count = sorted_sources.len(),
			"loading configuration from sources"
		);

		let mut merged = ConfigLayer::default();
		for source in &sorted_sources {
			match source.load() {
				Ok(layer) => {
					debug!(source = source.name(), "merging config layer");
					merged.merge(layer);
				}
				Err(e) => {
					warn!(
							source = source.name(),
							error = %e,
							"failed to load config source, skipping"
					);
				}
			}
		}

		let config = WeftConfig::from_layer(merged, paths);

		validate_config(&config)?;

		info!(
				default_model = %config.agent.default_model,
				prompt_budget_ratio = config.agent.prompt_budget_ratio,
				log_level = ?config.logging.level,
				"configuration loaded successfully"
		);

		Ok(config)
	}

	/// Get the number of registered sources.
	pub fn source_count(&self) -> usize {
		self.sources.len()
	}
}

impl Default for ConfigRegistry {
	fn default() -> Self {
		Self::new()
	}
}
