// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Project context that feeds the system prompt.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::ContextError;

/// Project instructions for a session, in full and (optionally) condensed form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProjectContext {
	pub raw: Option<String>,
	pub summary: Option<String>,
}

impl ProjectContext {
	pub fn is_empty(&self) -> bool {
		self.raw.is_none() && self.summary.is_none()
	}
}

#[async_trait]
pub trait ProjectContextLoader: Send + Sync {
	async fn load(&self, cwd: &Path) -> Result<ProjectContext, ContextError>;
}

/// Reads project context from files in the session's working directory.
///
/// The first existing file in `context_files` becomes the raw context;
/// `summary_file`, when present, supplies the condensed form.
#[derive(Clone, Debug)]
pub struct FileProjectContextLoader {
	pub context_files: Vec<String>,
	pub summary_file: Option<String>,
}

const SUMMARY_FILE: &str = ".weft/context-summary.md";

impl FileProjectContextLoader {
	pub fn new(context_files: Vec<String>) -> Self {
		Self {
			context_files,
			summary_file: Some(SUMMARY_FILE.to_string()),
		}
	}
}

impl Default for FileProjectContextLoader {
	fn default() -> Self {
		Self::new(vec!["AGENTS.md".to_string()])
	}
}

async fn read_optional(path: &Path) -> Result<Option<String>, ContextError> {
	match tokio::fs::read_to_string(path).await {
		Ok(content) if content.trim().is_empty() => Ok(None),
		Ok(content) => Ok(Some(content)),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(ContextError::Io(e)),
	}
}

#[async_trait]
impl ProjectContextLoader for FileProjectContextLoader {
	async fn load(&self, cwd: &Path) -> Result<ProjectContext, ContextError> {
		let mut context = ProjectContext::default();

		for name in &self.context_files {
			let path = cwd.join(name);
			if let Some(content) = read_optional(&path).await? {
				debug!(path = %path.display(), size = content.len(), "loaded project context");
				context.raw = Some(content);
				break;
			}
		}

		if let Some(name) = &self.summary_file {
			context.summary = read_optional(&cwd.join(name)).await?;
		}

		Ok(context)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn missing_files_yield_empty_context() {
		let dir = tempfile::tempdir().unwrap();
		let context = FileProjectContextLoader::default().load(dir.path()).await.unwrap();
		assert!(context.is_empty());
	}

	#[tokio::test]
	async fn first_existing_file_wins() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("CONTRIBUTING.md"), "contrib rules").unwrap();
		std::fs::write(dir.path().join("AGENTS.md"), "agent rules").unwrap();

		let loader = FileProjectContextLoader {
			context_files: vec!["AGENTS.md".to_string(), "CONTRIBUTING.md".to_string()],
			summary_file: None,
		};
		let context = loader.load(dir.path()).await.unwrap();
		assert_eq!(context.raw.as_deref(), Some("agent rules"));
		assert!(context.summary.is_none());
	}

	#[tokio::test]
	async fn summary_is_loaded_alongside_raw() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::create_dir_all(dir.path().join(".weft")).unwrap();
		std::fs::write(dir.path().join("AGENTS.md"), "long rules").unwrap();
		std::fs::write(dir.path().join(".weft/context-summary.md"), "short rules").unwrap();

		let context = FileProjectContextLoader::default().load(dir.path()).await.unwrap();
		assert_eq!(context.raw.as_deref(), Some("long rules"));
		assert_eq!(context.summary.as_deref(), Some("short rules"));
	}
}
