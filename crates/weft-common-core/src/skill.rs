// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ContextError;

/// A skill's entry in the system prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkillDescription {
	pub name: String,
	pub description: String,
}

impl SkillDescription {
	pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			description: description.into(),
		}
	}

	pub fn render(&self) -> String {
		format!("- {}: {}", self.name, self.description)
	}
}

/// Per-session skill state.
pub trait SkillState: Send + Sync {
	/// Current allowed-tool filter. `None` leaves every tool available.
	fn allowed_tools(&self) -> Option<Vec<String>>;

	/// Skills to advertise in the system prompt.
	fn descriptions(&self) -> Vec<SkillDescription>;
}

/// Loads skill state for a new session rooted at `cwd`.
#[async_trait]
pub trait SkillLoader: Send + Sync {
	async fn load(&self, cwd: &Path) -> Result<Arc<dyn SkillState>, ContextError>;
}

/// Skill state with no skills and no tool restriction.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSkills;

impl SkillState for NoSkills {
	fn allowed_tools(&self) -> Option<Vec<String>> {
		None
	}

	fn descriptions(&self) -> Vec<SkillDescription> {
		Vec::new()
	}
}

#[async_trait]
impl SkillLoader for NoSkills {
	async fn load(&self, _cwd: &Path) -> Result<Arc<dyn SkillState>, ContextError> {
		Ok(Arc::new(NoSkills))
	}
}

/// Fixed skill state, shared by every session it is loaded into.
#[derive(Debug, Default, Clone)]
pub struct StaticSkills {
	pub allowed_tools: Option<Vec<String>>,
	pub skills: Vec<SkillDescription>,
}

impl StaticSkills {
	pub fn new(allowed_tools: Option<Vec<String>>, skills: Vec<SkillDescription>) -> Self {
		Self {
			allowed_tools,
			skills,
		}
	}
}

impl SkillState for StaticSkills {
	fn allowed_tools(&self) -> Option<Vec<String>> {
		self.allowed_tools.clone()
	}

	fn descriptions(&self) -> Vec<SkillDescription> {
		self.skills.clone()
	}
}

#[async_trait]
impl SkillLoader for StaticSkills {
	async fn load(&self, _cwd: &Path) -> Result<Arc<dyn SkillState>, ContextError> {
		Ok(Arc::new(self.clone()))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn no_skills_leaves_tools_unrestricted() {
		let state = NoSkills.load(Path::new("/tmp")).await.unwrap();
		assert!(state.allowed_tools().is_none());
		assert!(state.descriptions().is_empty());
	}

	#[tokio::test]
	async fn static_skills_are_cloned_per_session() {
		let loader = StaticSkills::new(
			Some(vec!["read_file".to_string()]),
			vec![SkillDescription::new("review", "Reviews diffs")],
		);
		let state = loader.load(Path::new("/tmp")).await.unwrap();
		assert_eq!(state.allowed_tools(), Some(vec!["read_file".to_string()]));
		assert_eq!(state.descriptions()[0].render(), "- review: Reviews diffs");
	}
}
