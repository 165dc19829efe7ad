// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use weft_common_core::{
	is_name_allowed, ToolContext, ToolDefinition, ToolError, ToolExecutor, ToolOutput, ToolSchema,
};

#[async_trait]
pub trait Tool: Send + Sync {
	fn name(&self) -> &str;

	fn description(&self) -> &str;

	fn parameters(&self) -> ToolSchema;

	fn to_definition(&self) -> ToolDefinition {
		ToolDefinition::new(self.name(), self.description(), self.parameters())
	}

	async fn invoke(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput, ToolError>;
}

struct RegisteredTool {
	tool: Box<dyn Tool>,
	definition: ToolDefinition,
}

/// Tools keyed by name. Definitions are captured once at registration and
/// served in name order so the model sees a stable schema between rounds.
pub struct ToolRegistry {
	tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
	pub fn new() -> Self {
		Self {
			tools: BTreeMap::new(),
		}
	}

	/// Register a tool, replacing any previous tool with the same name.
	pub fn register(&mut self, tool: Box<dyn Tool>) {
		let definition = tool.to_definition();
		let name = definition.name.clone();
		tracing::debug!(tool_name = %name, "registering tool");
		if self
			.tools
			.insert(name.clone(), RegisteredTool { tool, definition })
			.is_some()
		{
			tracing::warn!(tool_name = %name, "replaced previously registered tool");
		}
	}

	pub fn get(&self, name: &str) -> Option<&dyn Tool> {
		self.tools.get(name).map(|t| t.tool.as_ref())
	}

	pub fn definitions(&self) -> Vec<ToolDefinition> {
		self.tools.values().map(|t| t.definition.clone()).collect()
	}

	pub fn len(&self) -> usize {
		self.tools.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tools.is_empty()
	}
}

impl Default for ToolRegistry {
	fn default() -> Self {
		Self::new()
	}
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
	fn functions_filtered(&self, allowed: Option<&[String]>) -> Vec<ToolDefinition> {
		self.tools
			.values()
			.filter(|t| is_name_allowed(&t.definition.name, allowed))
			.map(|t| t.definition.clone())
			.collect()
	}

	async fn execute(
		&self,
		name: &str,
		params: Value,
		ctx: &ToolContext,
	) -> Result<ToolOutput, ToolError> {
		let tool = self
			.get(name)
			.ok_or_else(|| ToolError::NotFound(name.to_string()))?;
		tracing::debug!(tool_name = %name, session_id = %ctx.session_id, "invoking tool");
		tool.invoke(params, ctx).await
	}
}
