// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fit the system prompt and conversation history into the model's window.
//!
//! All sizes use the shared four-characters-per-token estimate from
//! `weft_common_core::tokens`, so the system prompt, history and tool schema
//! are charged in the same unit.

use std::path::Path;

use weft_common_core::{
	estimate_tokens, message_tokens, AgentConfig, Message, ProjectContext, Role, SkillDescription,
	DEFAULT_CONTEXT_WINDOW,
};

const SKILLS_HEADER: &str = "Available skills:";

/// Token budget for one request: window × ratio, floored.
///
/// An unknown or zero context length falls back to the configured default
/// window; a result of zero falls back to the whole window.
pub fn prompt_budget(context_length: Option<u32>, config: &AgentConfig) -> usize {
	let window = context_length
		.filter(|len| *len > 0)
		.unwrap_or(config.default_context_window);
	let window = if window == 0 {
		DEFAULT_CONTEXT_WINDOW
	} else {
		window
	} as usize;

	let budget = (window as f64 * config.effective_budget_ratio()).floor() as usize;
	if budget == 0 {
		window
	} else {
		budget
	}
}

/// Assemble the system prompt within `budget` tokens.
///
/// The preamble and working-directory line are always present. Project
/// context goes in raw if it fits, otherwise as its summary if that fits.
/// Skill lines follow while they fit.
pub fn build_system_prompt(
	preamble: &str,
	project: &ProjectContext,
	cwd: &Path,
	skills: &[SkillDescription],
	budget: usize,
) -> String {
	let cwd_line = format!("Working directory: {}", cwd.display());
	let mut sections = vec![preamble.to_string()];

	let fits = |sections: &[String], extra: &[&str]| {
		let mut parts: Vec<&str> = sections.iter().map(String::as_str).collect();
		parts.extend_from_slice(extra);
		estimate_tokens(&parts.join("\n\n")) <= budget
	};

	let project_text = [project.raw.as_deref(), project.summary.as_deref()]
		.into_iter()
		.flatten()
		.find(|text| fits(&sections, &[text, &cwd_line]));
	if let Some(text) = project_text {
		sections.push(text.to_string());
	}

	sections.push(cwd_line);

	let mut skill_lines: Vec<String> = Vec::new();
	for skill in skills {
		let line = skill.render();
		let mut block = vec![SKILLS_HEADER.to_string()];
		block.extend(skill_lines.iter().cloned());
		block.push(line.clone());
		if !fits(&sections, &[&block.join("\n")]) {
			break;
		}
		skill_lines.push(line);
	}
	if !skill_lines.is_empty() {
		sections.push(format!("{SKILLS_HEADER}\n{}", skill_lines.join("\n")));
	}

	sections.join("\n\n")
}

/// Select the history that fits in `budget` tokens.
///
/// System messages are kept oldest-first while they fit, skipping one copy
/// of `default_preamble`. The latest non-system message is always kept.
/// Older messages are then taken newest-first until one does not fit.
/// A leading tool response whose call was cut is dropped.
pub fn trim_conversation(
	messages: &[Message],
	budget: usize,
	default_preamble: &str,
) -> Vec<Message> {
	let mut used = 0usize;
	let mut systems: Vec<&Message> = Vec::new();
	let mut skipped_preamble = false;

	for message in messages.iter().filter(|m| m.is_system()) {
		if !skipped_preamble && message.content == default_preamble {
			skipped_preamble = true;
			continue;
		}
		let tokens = message_tokens(message);
		if used + tokens > budget {
			break;
		}
		used += tokens;
		systems.push(message);
	}

	let Some(latest) = messages.iter().rposition(|m| !m.is_system()) else {
		return systems.into_iter().cloned().collect();
	};
	used += message_tokens(&messages[latest]);

	let mut kept: Vec<usize> = Vec::new();
	for (idx, message) in messages[..latest].iter().enumerate().rev() {
		if message.is_system() {
			continue;
		}
		let tokens = message_tokens(message);
		if used + tokens > budget {
			break;
		}
		used += tokens;
		kept.push(idx);
	}
	kept.reverse();

	let orphaned = kept
		.iter()
		.take_while(|idx| messages[**idx].role == Role::Tool)
		.count();
	kept.drain(..orphaned);
	kept.push(latest);

	systems
		.into_iter()
		.cloned()
		.chain(kept.into_iter().map(|idx| messages[idx].clone()))
		.collect()
}
