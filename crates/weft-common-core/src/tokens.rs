// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Deterministic token estimation.
//!
//! Every budget decision uses the same counter so system prompt, history and
//! tool schema are measured in the same unit. The estimate is roughly four
//! characters per token, which over-counts slightly for English prose.

use crate::message::Message;

/// Fixed framing cost charged for every message on top of its text.
pub const MESSAGE_OVERHEAD_TOKENS: usize = 4;

const CHARS_PER_TOKEN: usize = 4;

/// Estimate tokens for a piece of text: `ceil(chars / 4)`.
pub fn estimate_tokens(text: &str) -> usize {
	text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Estimate the full cost of a message: overhead, role label, content,
/// reasoning and any tool-call payload.
pub fn message_tokens(message: &Message) -> usize {
	if message.token_count > 0 {
		return message.token_count;
	}
	compute_message_tokens(message)
}

pub(crate) fn compute_message_tokens(message: &Message) -> usize {
	let mut total = MESSAGE_OVERHEAD_TOKENS
		+ estimate_tokens(message.role.as_str())
		+ estimate_tokens(&message.content);

	if let Some(reasoning) = &message.reasoning {
		total += estimate_tokens(reasoning);
	}
	if let Some(id) = &message.tool_call_id {
		total += estimate_tokens(id);
	}
	if let Some(name) = &message.name {
		total += estimate_tokens(name);
	}
	for call in &message.tool_calls {
		total += estimate_tokens(&call.id)
			+ estimate_tokens(&call.tool_name)
			+ estimate_tokens(&call.arguments);
	}

	total
}
