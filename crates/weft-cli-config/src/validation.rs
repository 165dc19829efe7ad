// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration validation rules.

use tracing::warn;

use crate::runtime::WeftConfig;
use crate::ConfigError;

/// Smallest tool output cap that still leaves room for the truncation marker.
pub const MIN_TOOL_OUTPUT_LIMIT: usize = 16;

/// Validate the configuration.
///
/// Returns Ok(()) if valid, or ConfigError::InvalidValue with details.
pub fn validate_config(config: &WeftConfig) -> Result<(), ConfigError> {
	validate_agent(config)?;

	Ok(())
}

fn validate_agent(config: &WeftConfig) -> Result<(), ConfigError> {
	let agent = &config.agent;

	// Written as a negated range check so NaN is rejected too.
	if !(agent.prompt_budget_ratio > 0.0 && agent.prompt_budget_ratio <= 1.0) {
		return Err(ConfigError::invalid_value(
			"agent.prompt_budget_ratio",
			"must be greater than 0 and at most 1",
		));
	}

	if agent.default_context_window == 0 {
		return Err(ConfigError::invalid_value(
			"agent.default_context_window",
			"must be at least 1",
		));
	}

	if agent.system_preamble.trim().is_empty() {
		return Err(ConfigError::invalid_value(
			"agent.system_preamble",
			"cannot be empty",
		));
	}

	if agent.default_model.trim().is_empty() {
		return Err(ConfigError::invalid_value(
			"agent.default_model",
			"cannot be empty",
		));
	}

	if agent.tool_output_limit < MIN_TOOL_OUTPUT_LIMIT {
		return Err(ConfigError::invalid_value(
			"agent.tool_output_limit",
			format!("must be at least {MIN_TOOL_OUTPUT_LIMIT}"),
		));
	}

	if let Some(effort) = &agent.reasoning_effort {
		if !matches!(effort.as_str(), "low" | "medium" | "high") {
			// Providers differ in what they accept; pass it through anyway.
			warn!(reasoning_effort = %effort, "unrecognised reasoning effort");
		}
	}

	Ok(())
}
