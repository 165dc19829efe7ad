// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ACP ↔ weft type conversions.
//!
//! Pure functions only: no I/O and no async. They turn prompt content blocks
//! into conversation text and tool results into `session/update` payloads.

use weft_common_core::ToolOutput;

use crate::error::AcpError;
use crate::prompt_loop::TurnOutcome;
use crate::protocol::{
	ContentBlock, ContentChunk, DiffContent, ResourceContents, StopReason, ToolCallContent,
	ToolKind,
};

const TRUNCATION_MARKER: char = '…';

// =============================================================================
// ACP ContentBlock → prompt text
// =============================================================================

/// Flatten prompt content into the text of one user message.
///
/// Text blocks are taken as-is, resource links become `Title: URI` and
/// embedded text resources are inlined under a `Resource (label):` header.
/// Images, audio and binary resources are skipped.
pub fn extract_prompt_text(blocks: &[ContentBlock]) -> Result<String, AcpError> {
	let text = blocks
		.iter()
		.filter_map(render_block)
		.collect::<Vec<_>>()
		.join("\n");

	if text.trim().is_empty() {
		return Err(AcpError::EmptyPrompt);
	}
	Ok(text)
}

fn render_block(block: &ContentBlock) -> Option<String> {
	match block {
		ContentBlock::Text(t) => Some(t.text.clone()),
		ContentBlock::ResourceLink(link) => {
			let title = link.title.as_deref().unwrap_or(&link.name);
			Some(format!("{title}: {}", link.uri))
		}
		ContentBlock::Resource(embedded) => match &embedded.resource {
			ResourceContents::Text(resource) => {
				let label = if !resource.uri.is_empty() {
					resource.uri.as_str()
				} else if let Some(mime) = resource.mime_type.as_deref() {
					mime
				} else {
					resource.text.as_str()
				};
				Some(format!("Resource ({label}):\n{}", resource.text))
			}
			ResourceContents::Blob(_) => None,
		},
		ContentBlock::Image(_) | ContentBlock::Audio(_) => None,
	}
}

/// Convert assistant text into an ACP content chunk for streaming.
pub fn text_to_content_chunk(text: impl Into<String>) -> ContentChunk {
	ContentChunk::text(text)
}

// =============================================================================
// Tool presentation
// =============================================================================

/// Human-readable title for a tool name: `search_text` → `Search text`.
pub fn tool_title(name: &str) -> String {
	let words: Vec<&str> = name
		.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
		.filter(|w| !w.is_empty())
		.collect();
	let joined = words.join(" ").to_lowercase();

	let mut chars = joined.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => name.to_string(),
	}
}

/// Classify a tool by the words in its name.
pub fn tool_kind(name: &str) -> ToolKind {
	let lower = name.to_lowercase();
	let tokens: Vec<&str> = lower
		.split(|c: char| !c.is_ascii_alphanumeric())
		.filter(|t| !t.is_empty())
		.collect();
	let has = |words: &[&str]| tokens.iter().any(|t| words.contains(t));

	if has(&["search", "grep", "find", "glob"]) {
		ToolKind::Search
	} else if has(&["read", "view", "cat", "list", "ls", "open", "get"]) {
		ToolKind::Read
	} else if has(&[
		"edit", "write", "patch", "replace", "apply", "create", "update", "delete",
	]) {
		ToolKind::Edit
	} else if has(&["run", "exec", "execute", "shell", "bash", "command"]) {
		ToolKind::Execute
	} else if has(&["fetch", "http", "web", "url", "download"]) {
		ToolKind::Fetch
	} else {
		ToolKind::Other
	}
}

/// Cap `text` at `limit` characters, the marker included.
pub fn truncate_text(text: &str, limit: usize) -> String {
	if text.chars().count() <= limit {
		return text.to_string();
	}
	if limit == 0 {
		return String::new();
	}
	let mut truncated: String = text.chars().take(limit - 1).collect();
	truncated.push(TRUNCATION_MARKER);
	truncated
}

/// Structured content for a finished tool call.
///
/// A diff becomes a diff block; output, stdout and stderr each become a
/// text block capped at `limit` characters. Blank streams are omitted.
pub fn tool_output_content(output: &ToolOutput, limit: usize) -> Vec<ToolCallContent> {
	let mut content = Vec::new();

	if let Some(diff) = &output.diff {
		content.push(ToolCallContent::Diff(DiffContent {
			path: diff.path.clone(),
			old_text: diff.old_text.clone(),
			new_text: diff.new_text.clone(),
		}));
	}

	for text in [&output.output, &output.stdout, &output.stderr]
		.into_iter()
		.flatten()
	{
		if text.trim().is_empty() {
			continue;
		}
		content.push(text_content(&truncate_text(text, limit)));
	}

	content
}

pub fn text_content(text: &str) -> ToolCallContent {
	ToolCallContent::Content(text_to_content_chunk(text))
}

// =============================================================================
// StopReason Mapping
// =============================================================================

pub fn map_stop_reason(outcome: &TurnOutcome) -> StopReason {
	match outcome {
		TurnOutcome::Completed(_) => StopReason::EndTurn,
		TurnOutcome::Cancelled => StopReason::Cancelled,
	}
}

// =============================================================================
// Tests
// =============================================================================
