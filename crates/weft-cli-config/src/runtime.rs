// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Runtime configuration types with resolved defaults.

use serde::{Deserialize, Serialize};
use weft_common_core::AgentConfig;

use crate::layer::*;
use crate::paths::PathsConfig;

/// The final, validated configuration for weft.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeftConfig {
	pub agent: AgentConfig,
	pub logging: LoggingConfig,

	/// Resolved XDG paths (not serialized)
	#[serde(skip)]
	pub paths: PathsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
	pub level: LogLevel,
	pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
	Error,
	Warn,
	#[default]
	Info,
	Debug,
	Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
	#[default]
	Pretty,
	Json,
	Compact,
}

impl WeftConfig {
	/// Build runtime config from a merged layer and paths.
	pub fn from_layer(layer: ConfigLayer, paths: PathsConfig) -> Self {
		Self {
			agent: build_agent_config(layer.agent),
			logging: build_logging_config(layer.logging),
			paths,
		}
	}
}

fn build_agent_config(layer: Option<AgentLayer>) -> AgentConfig {
	let layer = layer.unwrap_or_default();
	let defaults = AgentConfig::default();
	AgentConfig {
		default_model: layer.default_model.unwrap_or(defaults.default_model),
		prompt_budget_ratio: layer
			.prompt_budget_ratio
			.unwrap_or(defaults.prompt_budget_ratio),
		default_context_window: layer
			.default_context_window
			.unwrap_or(defaults.default_context_window),
		max_nudges: layer.max_nudges.unwrap_or(defaults.max_nudges),
		reasoning_effort: layer.reasoning_effort.or(defaults.reasoning_effort),
		tool_output_limit: layer.tool_output_limit.unwrap_or(defaults.tool_output_limit),
		system_preamble: layer.system_preamble.unwrap_or(defaults.system_preamble),
		workspace_root: layer.workspace_root.or(defaults.workspace_root),
		project_context_files: layer
			.project_context_files
			.unwrap_or(defaults.project_context_files),
		max_tokens: layer.max_tokens.or(defaults.max_tokens),
		temperature: layer.temperature.or(defaults.temperature),
	}
}

fn build_logging_config(layer: Option<LoggingLayer>) -> LoggingConfig {
	let layer = layer.unwrap_or_default();
	LoggingConfig {
		level: parse_log_level(layer.level.as_deref()),
		format: parse_log_format(layer.format.as_deref()),
	}
}

fn parse_log_level(s: Option<&str>) -> LogLevel {
	match s {
		Some("error") => LogLevel::Error,
		Some("warn") => LogLevel::Warn,
		Some("info") => LogLevel::Info,
		Some("debug") => LogLevel::Debug,
		Some("trace") => LogLevel::Trace,
		_ => LogLevel::Info,
	}
}

fn parse_log_format(s: Option<&str>) -> LogFormat {
	match s {
		Some("json") => LogFormat::Json,
		Some("compact") => LogFormat::Compact,
		Some("pretty") => LogFormat::Pretty,
		_ => LogFormat::Pretty,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_empty_layer_yields_defaults() {
		let config = WeftConfig::from_layer(ConfigLayer::default(), PathsConfig::default());
		assert_eq!(config.agent, AgentConfig::default());
		assert_eq!(config.logging, LoggingConfig::default());
	}

	#[test]
	fn test_layer_values_override_defaults() {
		let layer = ConfigLayer {
			agent: Some(AgentLayer {
				max_nudges: Some(0),
				reasoning_effort: Some("high".to_string()),
				..Default::default()
			}),
			logging: Some(LoggingLayer {
				level: Some("trace".to_string()),
				format: Some("compact".to_string()),
			}),
		};
		let config = WeftConfig::from_layer(layer, PathsConfig::default());
		assert_eq!(config.agent.max_nudges, 0);
		assert_eq!(config.agent.reasoning_effort.as_deref(), Some("high"));
		assert_eq!(config.logging.level, LogLevel::Trace);
		assert_eq!(config.logging.format, LogFormat::Compact);
	}

	#[test]
	fn test_unknown_log_values_fall_back() {
		assert_eq!(parse_log_level(Some("loud")), LogLevel::Info);
		assert_eq!(parse_log_format(Some("xml")), LogFormat::Pretty);
	}
}
