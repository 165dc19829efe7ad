// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Conversation history and the persistence seam behind it.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ConversationStoreError;
use crate::message::Message;
use crate::tokens::compute_message_tokens;

/// Append-only message history for one session.
///
/// Messages are never removed or rewritten; a budgeted view is computed for
/// each model request instead.
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
	messages: Vec<Message>,
}

impl ConversationState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append a message, caching its token estimate. Returns the stored copy.
	pub fn push(&mut self, mut message: Message) -> &Message {
		message.token_count = compute_message_tokens(&message);
		debug!(
				role = ?message.role,
				tokens = message.token_count,
				"appending message to conversation"
		);
		self.messages.push(message);
		&self.messages[self.messages.len() - 1]
	}

	pub fn messages(&self) -> &[Message] {
		&self.messages
	}

	pub fn len(&self) -> usize {
		self.messages.len()
	}

	pub fn is_empty(&self) -> bool {
		self.messages.is_empty()
	}

	pub fn last(&self) -> Option<&Message> {
		self.messages.last()
	}
}

/// Persistence collaborator for conversation messages.
///
/// Callers treat every append as best effort: a failure is logged and the
/// in-memory conversation stays authoritative.
#[async_trait]
pub trait ConversationStore: Send + Sync {
	async fn append(
		&self,
		session_id: &str,
		message: &Message,
	) -> Result<(), ConversationStoreError>;
}

/// Store that keeps messages in memory, keyed by session.
#[derive(Debug, Default)]
pub struct MemoryConversationStore {
	sessions: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryConversationStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn messages(&self, session_id: &str) -> Vec<Message> {
		self
			.sessions
			.lock()
			.await
			.get(session_id)
			.cloned()
			.unwrap_or_default()
	}
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
	async fn append(
		&self,
		session_id: &str,
		message: &Message,
	) -> Result<(), ConversationStoreError> {
		self
			.sessions
			.lock()
			.await
			.entry(session_id.to_string())
			.or_default()
			.push(message.clone());
		Ok(())
	}
}

/// Store that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullConversationStore;

#[async_trait]
impl ConversationStore for NullConversationStore {
	async fn append(
		&self,
		_session_id: &str,
		_message: &Message,
	) -> Result<(), ConversationStoreError> {
		Ok(())
	}
}
