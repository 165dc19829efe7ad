// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// Parameter schema for a tool, built once when the tool is registered.
///
/// Serializes as the matching JSON Schema fragment, so a definition can be
/// handed to a model provider without re-deriving it per call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolSchema {
	Object {
		#[serde(default)]
		properties: BTreeMap<String, ToolSchema>,
		#[serde(default, skip_serializing_if = "Vec::is_empty")]
		required: Vec<String>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		description: Option<String>,
	},
	String {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		description: Option<String>,
		#[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
		allowed_values: Option<Vec<String>>,
	},
	Number {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		description: Option<String>,
	},
	Integer {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		description: Option<String>,
	},
	Boolean {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		description: Option<String>,
	},
	Array {
		items: Box<ToolSchema>,
		#[serde(default, skip_serializing_if = "Option::is_none")]
		description: Option<String>,
	},
}

impl ToolSchema {
	/// An object schema with no properties.
	pub fn empty_object() -> Self {
		ToolSchema::Object {
			properties: BTreeMap::new(),
			required: Vec::new(),
			description: None,
		}
	}

	/// Convert a JSON Schema document (from a manifest or a model function
	/// definition) into the tagged form.
	pub fn from_json(value: &Value) -> Result<Self, ToolError> {
		serde_json::from_value(value.clone())
			.map_err(|e| ToolError::InvalidArguments(format!("unsupported tool schema: {e}")))
	}

	pub fn to_json(&self) -> Value {
		serde_json::to_value(self).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
	}
}

/// Definition of a tool for the model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
	pub name: String,
	pub description: String,
	pub parameters: ToolSchema,
}

impl ToolDefinition {
	pub fn new(
		name: impl Into<String>,
		description: impl Into<String>,
		parameters: ToolSchema,
	) -> Self {
		let name = name.into();
		tracing::debug!(
				tool_name = %name,
				"Creating tool definition"
		);
		Self {
			name,
			description: description.into(),
			parameters,
		}
	}

	/// Render as an OpenAI-style function entry.
	pub fn to_openai_function(&self) -> Value {
		serde_json::json!({
				"type": "function",
				"function": {
						"name": self.name,
						"description": self.description,
						"parameters": self.parameters.to_json(),
				}
		})
	}
}

/// Serialize a tool list the way it is sent to the model, for budgeting.
pub fn tool_schema_text(tools: &[ToolDefinition]) -> String {
	let functions: Vec<Value> = tools.iter().map(ToolDefinition::to_openai_function).collect();
	serde_json::to_string(&functions).unwrap_or_default()
}

/// Context provided to tools during execution.
#[derive(Clone, Debug)]
pub struct ToolContext {
	pub workspace_root: PathBuf,
	pub session_id: String,
}

impl ToolContext {
	pub fn new(workspace_root: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
		let workspace_root = workspace_root.into();
		tracing::debug!(
				workspace_root = %workspace_root.display(),
				"Creating tool context"
		);
		Self {
			workspace_root,
			session_id: session_id.into(),
		}
	}
}

/// A before/after preview of a file edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DiffPreview {
	pub path: PathBuf,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub old_text: Option<String>,
	pub new_text: String,
}

/// Structured result of a successful tool execution.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub output: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stdout: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub stderr: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub exit_code: Option<i32>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub diff: Option<DiffPreview>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl ToolOutput {
	pub fn text(output: impl Into<String>) -> Self {
		Self {
			output: Some(output.into()),
			..Self::default()
		}
	}

	pub fn command(stdout: impl Into<String>, stderr: impl Into<String>, exit_code: i32) -> Self {
		Self {
			stdout: Some(stdout.into()),
			stderr: Some(stderr.into()),
			exit_code: Some(exit_code),
			..Self::default()
		}
	}

	pub fn with_diff(mut self, diff: DiffPreview) -> Self {
		self.diff = Some(diff);
		self
	}

	/// Short human-readable summary for status lines.
	pub fn display(&self) -> String {
		if let Some(output) = self.output.as_deref().filter(|o| !o.trim().is_empty()) {
			return output.to_string();
		}
		if let Some(diff) = &self.diff {
			return format!("Updated {}", diff.path.display());
		}
		if let Some(code) = self.exit_code {
			return format!("Exited with code {code}");
		}
		if let Some(stdout) = self.stdout.as_deref().filter(|o| !o.trim().is_empty()) {
			return stdout.to_string();
		}
		"Completed".to_string()
	}

	/// Text recorded in the conversation as the tool response.
	pub fn to_model_content(&self) -> String {
		serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
	}
}

/// Executes tools on behalf of the agentic loop.
///
/// `allowed` is the active skill filter: `None` means every registered tool
/// may be used, `Some(list)` restricts to the listed names.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
	/// Definitions for the tools visible under the filter.
	fn functions_filtered(&self, allowed: Option<&[String]>) -> Vec<ToolDefinition>;

	async fn execute(
		&self,
		name: &str,
		params: Value,
		ctx: &ToolContext,
	) -> Result<ToolOutput, ToolError>;

	fn is_tool_allowed(&self, name: &str, allowed: Option<&[String]>) -> bool {
		is_name_allowed(name, allowed)
	}
}

/// Allow-list check shared by executors.
pub fn is_name_allowed(name: &str, allowed: Option<&[String]>) -> bool {
	match allowed {
		None => true,
		Some(list) => list.iter().any(|n| n == name),
	}
}
