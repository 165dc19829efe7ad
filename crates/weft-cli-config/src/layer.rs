// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Partial configuration layer for merging from multiple sources.

use serde::Deserialize;
use std::path::PathBuf;

/// Partial configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
	#[serde(default)]
	pub agent: Option<AgentLayer>,
	#[serde(default)]
	pub logging: Option<LoggingLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentLayer {
	#[serde(default)]
	pub default_model: Option<String>,
	#[serde(default)]
	pub prompt_budget_ratio: Option<f64>,
	#[serde(default)]
	pub default_context_window: Option<u32>,
	#[serde(default)]
	pub max_nudges: Option<u32>,
	#[serde(default)]
	pub reasoning_effort: Option<String>,
	#[serde(default)]
	pub tool_output_limit: Option<usize>,
	#[serde(default)]
	pub system_preamble: Option<String>,
	#[serde(default)]
	pub workspace_root: Option<PathBuf>,
	#[serde(default)]
	pub project_context_files: Option<Vec<String>>,
	#[serde(default)]
	pub max_tokens: Option<u32>,
	#[serde(default)]
	pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
	#[serde(default)]
	pub level: Option<String>,
	#[serde(default)]
	pub format: Option<String>,
}

impl ConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: ConfigLayer) {
		merge_option(&mut self.agent, other.agent, AgentLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingLayer::merge);
	}

	pub(crate) fn agent_mut(&mut self) -> &mut AgentLayer {
		self.agent.get_or_insert_with(AgentLayer::default)
	}

	pub(crate) fn logging_mut(&mut self) -> &mut LoggingLayer {
		self.logging.get_or_insert_with(LoggingLayer::default)
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

fn replace_if_some<T>(target: &mut Option<T>, source: Option<T>) {
	if source.is_some() {
		*target = source;
	}
}

impl AgentLayer {
	fn merge(&mut self, other: AgentLayer) {
		replace_if_some(&mut self.default_model, other.default_model);
		replace_if_some(&mut self.prompt_budget_ratio, other.prompt_budget_ratio);
		replace_if_some(&mut self.default_context_window, other.default_context_window);
		replace_if_some(&mut self.max_nudges, other.max_nudges);
		replace_if_some(&mut self.reasoning_effort, other.reasoning_effort);
		replace_if_some(&mut self.tool_output_limit, other.tool_output_limit);
		replace_if_some(&mut self.system_preamble, other.system_preamble);
		replace_if_some(&mut self.workspace_root, other.workspace_root);
		replace_if_some(&mut self.project_context_files, other.project_context_files);
		replace_if_some(&mut self.max_tokens, other.max_tokens);
		replace_if_some(&mut self.temperature, other.temperature);
	}
}

impl LoggingLayer {
	fn merge(&mut self, other: LoggingLayer) {
		replace_if_some(&mut self.level, other.level);
		replace_if_some(&mut self.format, other.format);
	}
}
