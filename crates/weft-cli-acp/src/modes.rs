// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;

use crate::protocol::SessionMode;

/// Source of the modes offered to each new session.
///
/// The first mode returned becomes the session's current mode.
#[async_trait]
pub trait ModeCatalog: Send + Sync {
	async fn available_modes(&self) -> Vec<SessionMode>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoModes;

#[async_trait]
impl ModeCatalog for NoModes {
	async fn available_modes(&self) -> Vec<SessionMode> {
		Vec::new()
	}
}

/// A fixed list of modes, typically one per configured model.
#[derive(Debug, Default, Clone)]
pub struct StaticModes {
	modes: Vec<SessionMode>,
}

impl StaticModes {
	pub fn new(modes: Vec<SessionMode>) -> Self {
		Self { modes }
	}

	/// One mode per model id, named after the model.
	pub fn from_models<I, S>(models: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::new(
			models
				.into_iter()
				.map(|id| {
					let id = id.into();
					SessionMode::new(id.clone(), id)
				})
				.collect(),
		)
	}
}

#[async_trait]
impl ModeCatalog for StaticModes {
	async fn available_modes(&self) -> Vec<SessionMode> {
		self.modes.clone()
	}
}
