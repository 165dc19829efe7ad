// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTEXT_WINDOW: u32 = 8192;
pub const DEFAULT_PROMPT_BUDGET_RATIO: f64 = 0.9;
pub const DEFAULT_MAX_NUDGES: u32 = 2;
pub const DEFAULT_TOOL_OUTPUT_LIMIT: usize = 8000;
pub const DEFAULT_SYSTEM_PREAMBLE: &str = "You are weft, a coding assistant working inside the user's \
editor. Use the available tools to inspect and change the workspace instead of describing what you \
would do. Keep answers short and concrete.";

/// Configuration for the agentic loop and its prompt assembly.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
	/// Model used when the session has no mode naming one.
	pub default_model: String,
	/// Share of the context window the prompt may occupy, in (0, 1].
	pub prompt_budget_ratio: f64,
	/// Context window assumed when the model manager does not know the model.
	pub default_context_window: u32,
	pub max_nudges: u32,
	pub reasoning_effort: Option<String>,
	/// Per-block character cap for tool output streamed to the editor.
	pub tool_output_limit: usize,
	pub system_preamble: String,
	pub workspace_root: Option<PathBuf>,
	pub project_context_files: Vec<String>,
	pub max_tokens: Option<u32>,
	pub temperature: Option<f32>,
}

impl Default for AgentConfig {
	fn default() -> Self {
		Self {
			default_model: "gpt-4o-mini".to_string(),
			prompt_budget_ratio: DEFAULT_PROMPT_BUDGET_RATIO,
			default_context_window: DEFAULT_CONTEXT_WINDOW,
			max_nudges: DEFAULT_MAX_NUDGES,
			reasoning_effort: None,
			tool_output_limit: DEFAULT_TOOL_OUTPUT_LIMIT,
			system_preamble: DEFAULT_SYSTEM_PREAMBLE.to_string(),
			workspace_root: None,
			project_context_files: vec!["AGENTS.md".to_string()],
			max_tokens: None,
			temperature: None,
		}
	}
}

impl AgentConfig {
	/// The configured ratio, or the default when it lies outside (0, 1].
	pub fn effective_budget_ratio(&self) -> f64 {
		if self.prompt_budget_ratio > 0.0 && self.prompt_budget_ratio <= 1.0 {
			self.prompt_budget_ratio
		} else {
			DEFAULT_PROMPT_BUDGET_RATIO
		}
	}
}
