// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

/// Role of a message participant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
	Tool,
}

impl Role {
	pub fn as_str(&self) -> &'static str {
		match self {
			Role::System => "system",
			Role::User => "user",
			Role::Assistant => "assistant",
			Role::Tool => "tool",
		}
	}
}

/// A message in a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
	pub role: Role,
	pub content: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub tool_call_id: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub tool_calls: Vec<ToolCall>,
	/// Model reasoning attached to an assistant reply, if the provider returned any.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub reasoning: Option<String>,
	/// Cached token estimate, filled in when the message enters a conversation.
	#[serde(default)]
	pub token_count: usize,
}

impl Message {
	fn with_role(role: Role, content: impl Into<String>) -> Self {
		Self {
			role,
			content: content.into(),
			tool_call_id: None,
			name: None,
			tool_calls: Vec::new(),
			reasoning: None,
			token_count: 0,
		}
	}

	pub fn system(content: impl Into<String>) -> Self {
		Self::with_role(Role::System, content)
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self::with_role(Role::User, content)
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self::with_role(Role::Assistant, content)
	}

	pub fn assistant_with_tool_calls(
		content: impl Into<String>,
		tool_calls: Vec<ToolCall>,
	) -> Self {
		Self {
			tool_calls,
			..Self::with_role(Role::Assistant, content)
		}
	}

	pub fn tool(
		tool_call_id: impl Into<String>,
		name: impl Into<String>,
		content: impl Into<String>,
	) -> Self {
		Self {
			tool_call_id: Some(tool_call_id.into()),
			name: Some(name.into()),
			..Self::with_role(Role::Tool, content)
		}
	}

	pub fn with_reasoning(mut self, reasoning: Option<String>) -> Self {
		self.reasoning = reasoning.filter(|r| !r.trim().is_empty());
		self
	}

	pub fn is_system(&self) -> bool {
		self.role == Role::System
	}
}

/// A tool call requested by the model.
///
/// `arguments` is kept as the raw text the model produced; it is parsed only
/// when the call is executed so malformed JSON can be reported back to the
/// model instead of failing the whole reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
	#[serde(default)]
	pub id: String,
	pub tool_name: String,
	#[serde(default)]
	pub arguments: String,
}

impl ToolCall {
	pub fn new(
		id: impl Into<String>,
		tool_name: impl Into<String>,
		arguments: impl Into<String>,
	) -> Self {
		Self {
			id: id.into(),
			tool_name: tool_name.into(),
			arguments: arguments.into(),
		}
	}

	/// Parse the raw argument text. Blank arguments are treated as an empty object.
	pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
		if self.arguments.trim().is_empty() {
			return Ok(serde_json::Value::Object(serde_json::Map::new()));
		}
		serde_json::from_str(&self.arguments)
	}
}

/// Give every call without an id a positional `tool-<n>` id (1-based).
pub fn assign_tool_call_ids(calls: &mut [ToolCall]) {
	for (index, call) in calls.iter_mut().enumerate() {
		if call.id.trim().is_empty() {
			call.id = format!("tool-{}", index + 1);
		}
	}
}
