// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Model abstraction types for request/response handling.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::message::{Message, ToolCall};
use crate::tool::ToolDefinition;

/// How the model may use the supplied tools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolChoice {
	Auto,
}

/// Request to send to a model for completion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelRequest {
	pub model: String,
	pub messages: Vec<Message>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub tools: Vec<ToolDefinition>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tool_choice: Option<ToolChoice>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub reasoning_effort: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_tokens: Option<u32>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f32>,
}

impl ModelRequest {
	pub fn new(model: impl Into<String>) -> Self {
		Self {
			model: model.into(),
			messages: Vec::new(),
			tools: Vec::new(),
			tool_choice: None,
			reasoning_effort: None,
			max_tokens: None,
			temperature: None,
		}
	}

	pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
		self.messages = messages;
		self
	}

	/// Attach tools with automatic tool choice. An empty list leaves tools off.
	pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
		self.tool_choice = if tools.is_empty() {
			None
		} else {
			Some(ToolChoice::Auto)
		};
		self.tools = tools;
		self
	}

	pub fn with_reasoning_effort(mut self, effort: Option<String>) -> Self {
		self.reasoning_effort = effort;
		self
	}

	pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
		self.max_tokens = Some(max_tokens);
		self
	}

	pub fn with_temperature(mut self, temperature: f32) -> Self {
		self.temperature = Some(temperature);
		self
	}

	pub fn tools_enabled(&self) -> bool {
		!self.tools.is_empty()
	}
}

/// Response from a model completion request.
#[derive(Clone, Debug, Default)]
pub struct ModelResponse {
	pub content: String,
	pub reasoning: Option<String>,
	pub tool_calls: Vec<ToolCall>,
	pub usage: Option<Usage>,
	pub finish_reason: Option<String>,
}

impl ModelResponse {
	pub fn text(content: impl Into<String>) -> Self {
		Self {
			content: content.into(),
			finish_reason: Some("stop".to_string()),
			..Self::default()
		}
	}

	pub fn with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
		Self {
			content: content.into(),
			tool_calls,
			finish_reason: Some("tool_calls".to_string()),
			..Self::default()
		}
	}
}

/// Token usage statistics from a model request.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Usage {
	pub input_tokens: u32,
	pub output_tokens: u32,
}

/// Per-million-token pricing, in USD.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pricing {
	pub input_per_million: f64,
	pub output_per_million: f64,
}

impl Pricing {
	pub fn cost(&self, usage: &Usage) -> f64 {
		(f64::from(usage.input_tokens) * self.input_per_million
			+ f64::from(usage.output_tokens) * self.output_per_million)
			/ 1_000_000.0
	}
}

/// What the model manager knows about a model.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
	pub id: String,
	/// Context window in tokens, when the provider reports one.
	pub context_length: Option<u32>,
	pub pricing: Option<Pricing>,
	pub supports_reasoning: bool,
}

/// Model provider collaborator.
#[async_trait]
pub trait ModelManager: Send + Sync {
	/// Send a completion request and wait for the full response.
	async fn chat_completion(&self, request: ModelRequest) -> Result<ModelResponse, ModelError>;

	/// Metadata for a model id, if known.
	fn model_info(&self, model: &str) -> Option<ModelInfo>;
}
