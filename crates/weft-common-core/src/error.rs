// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Provider error phrases that mean "this model cannot take a tool schema".
///
/// Only consulted when the model client did not classify the failure as
/// [`ModelError::ToolCallingUnsupported`] itself.
const TOOL_CALLING_UNSUPPORTED_PATTERNS: &[&str] = &[
	"does not support tool calling",
	"does not support tools",
	"tool calling is not supported",
	"tools are not supported",
	"does not support function calling",
];

/// Errors that can occur during model interactions.
#[derive(Clone, Error, Debug)]
pub enum ModelError {
	#[error("HTTP error: {0}")]
	Http(String),

	#[error("API error: {0}")]
	Api(String),

	#[error("Request timed out")]
	Timeout,

	#[error("Invalid response: {0}")]
	InvalidResponse(String),

	#[error("Rate limited: retry after {retry_after_secs:?} seconds")]
	RateLimited { retry_after_secs: Option<u64> },

	#[error("Model does not support tool calling: {0}")]
	ToolCallingUnsupported(String),
}

impl ModelError {
	/// Whether the failure means the model rejected the tool schema.
	///
	/// The structured variant is authoritative; the message pattern check is
	/// a fallback for clients that only surface provider text.
	pub fn is_tool_calling_unsupported(&self) -> bool {
		match self {
			ModelError::ToolCallingUnsupported(_) => true,
			ModelError::Http(msg) | ModelError::Api(msg) | ModelError::InvalidResponse(msg) => {
				matches_tool_calling_unsupported(msg)
			}
			ModelError::Timeout | ModelError::RateLimited { .. } => false,
		}
	}
}

fn matches_tool_calling_unsupported(message: &str) -> bool {
	let lower = message.to_lowercase();
	TOOL_CALLING_UNSUPPORTED_PATTERNS
		.iter()
		.any(|pattern| lower.contains(pattern))
}

/// Errors that can occur during tool execution.
#[derive(Clone, Error, Debug)]
pub enum ToolError {
	#[error("Tool not found: {0}")]
	NotFound(String),

	#[error("Invalid arguments: {0}")]
	InvalidArguments(String),

	#[error("Tool not allowed: {0}")]
	NotAllowed(String),

	#[error("IO error: {0}")]
	Io(String),

	#[error("Tool execution timed out")]
	Timeout,

	#[error("Internal error: {0}")]
	Internal(String),
}

impl From<std::io::Error> for ToolError {
	fn from(err: std::io::Error) -> Self {
		ToolError::Io(err.to_string())
	}
}

/// Errors from the conversation persistence collaborator.
#[derive(Debug, Error)]
pub enum ConversationStoreError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("store unavailable: {0}")]
	Unavailable(String),
}

/// Errors raised while loading per-session context (skills, project files).
#[derive(Debug, Error)]
pub enum ContextError {
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("invalid skill definition: {0}")]
	InvalidSkill(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn structured_variant_is_recognised() {
		let err = ModelError::ToolCallingUnsupported("tiny-model".to_string());
		assert!(err.is_tool_calling_unsupported());
	}

	#[test]
	fn provider_text_falls_back_to_patterns() {
		let err = ModelError::Api("400: model llama2 does not support tool calling".to_string());
		assert!(err.is_tool_calling_unsupported());

		let err = ModelError::Http("Tool calling is NOT supported for this deployment".to_string());
		assert!(err.is_tool_calling_unsupported(), "matching ignores case");

		let err = ModelError::Api("this endpoint cannot handle functions".to_string());
		assert!(!err.is_tool_calling_unsupported(), "only the fixed phrases match");
	}

	#[test]
	fn unrelated_errors_are_not_tool_errors() {
		assert!(!ModelError::Timeout.is_tool_calling_unsupported());
		assert!(!ModelError::RateLimited {
			retry_after_secs: Some(3)
		}
		.is_tool_calling_unsupported());
		let overflow = ModelError::Api("context length exceeded".to_string());
		assert!(!overflow.is_tool_calling_unsupported());
	}
}
