// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session state management for ACP integration.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use weft_common_core::{ConversationState, NoSkills, ProjectContext, SkillState};

use crate::error::AcpError;
use crate::protocol::{SessionModeState, SessionNotification, SessionUpdate};

/// A request to send a session notification to the client.
pub struct SessionNotificationRequest {
	pub notification: SessionNotification,
	pub completion_tx: oneshot::Sender<()>,
}

/// Sends `session/update` notifications and waits until each is written.
#[derive(Clone, Debug)]
pub struct SessionNotifier {
	tx: mpsc::UnboundedSender<SessionNotificationRequest>,
}

impl SessionNotifier {
	pub fn new(tx: mpsc::UnboundedSender<SessionNotificationRequest>) -> Self {
		Self { tx }
	}

	pub async fn send(&self, session_id: &str, update: SessionUpdate) -> Result<(), AcpError> {
		let (completion_tx, completion_rx) = oneshot::channel();
		self
			.tx
			.send(SessionNotificationRequest {
				notification: SessionNotification {
					session_id: session_id.to_string(),
					update,
				},
				completion_tx,
			})
			.map_err(|_| AcpError::NotificationChannelClosed)?;

		completion_rx
			.await
			.map_err(|_| AcpError::NotificationChannelClosed)
	}
}

/// State only touched while a prompt holds the session lock.
pub struct SessionRuntime {
	pub conversation: ConversationState,
	pub skills: Arc<dyn SkillState>,
	pub project: ProjectContext,
}

impl Default for SessionRuntime {
	fn default() -> Self {
		Self {
			conversation: ConversationState::new(),
			skills: Arc::new(NoSkills),
			project: ProjectContext::default(),
		}
	}
}

/// One editor conversation.
pub struct Session {
	pub id: String,
	pub created_at: DateTime<Utc>,
	pub cwd: PathBuf,
	pub env: BTreeMap<String, String>,
	/// Declared by the client; recorded but not connected.
	pub mcp_servers: Vec<Value>,
	modes: RwLock<Option<SessionModeState>>,
	runtime: tokio::sync::Mutex<SessionRuntime>,
}

impl Session {
	pub fn new(id: impl Into<String>, cwd: PathBuf, runtime: SessionRuntime) -> Self {
		Self {
			id: id.into(),
			created_at: Utc::now(),
			cwd,
			env: BTreeMap::new(),
			mcp_servers: Vec::new(),
			modes: RwLock::new(None),
			runtime: tokio::sync::Mutex::new(runtime),
		}
	}

	pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
		self.env = env;
		self
	}

	pub fn with_mcp_servers(mut self, servers: Vec<Value>) -> Self {
		self.mcp_servers = servers;
		self
	}

	pub fn with_modes(self, modes: Option<SessionModeState>) -> Self {
		*self.modes.write() = modes;
		self
	}

	/// Exclusive access to the conversation for the length of one prompt.
	pub async fn lock_runtime(&self) -> tokio::sync::MutexGuard<'_, SessionRuntime> {
		self.runtime.lock().await
	}

	pub fn mode_state(&self) -> Option<SessionModeState> {
		self.modes.read().clone()
	}

	pub fn current_mode_id(&self) -> Option<String> {
		self
			.modes
			.read()
			.as_ref()
			.map(|m| m.current_mode_id.clone())
	}

	/// Switch the current mode. Ids outside a non-empty mode list are
	/// rejected and leave the mode unchanged.
	pub fn set_mode(&self, mode_id: &str) -> Result<(), AcpError> {
		let mut modes = self.modes.write();
		match modes.as_mut() {
			Some(state) if !state.available_modes.is_empty() => {
				if !state.available_modes.iter().any(|m| m.id == mode_id) {
					return Err(AcpError::InvalidParams(format!("unknown mode: {mode_id}")));
				}
				state.current_mode_id = mode_id.to_string();
			}
			Some(state) => state.current_mode_id = mode_id.to_string(),
			None => {
				*modes = Some(SessionModeState {
					current_mode_id: mode_id.to_string(),
					available_modes: Vec::new(),
				});
			}
		}
		Ok(())
	}
}

impl std::fmt::Debug for Session {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Session")
			.field("id", &self.id)
			.field("created_at", &self.created_at)
			.field("cwd", &self.cwd)
			.field("current_mode", &self.current_mode_id())
			.finish()
	}
}

/// Registry of live sessions keyed by id.
#[derive(Debug, Default)]
pub struct SessionStore {
	sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(&self, session: Session) -> Arc<Session> {
		let session = Arc::new(session);
		self
			.sessions
			.write()
			.insert(session.id.clone(), Arc::clone(&session));
		session
	}

	pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
		self.sessions.read().get(session_id).cloned()
	}

	pub fn len(&self) -> usize {
		self.sessions.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.sessions.read().is_empty()
	}
}

struct ActiveEntry {
	token: CancellationToken,
	generation: u64,
}

/// Cancellation handles for prompts currently running, one per session.
#[derive(Default)]
pub struct ActivePromptTracker {
	active: Mutex<HashMap<String, ActiveEntry>>,
	next_generation: AtomicU64,
}

impl ActivePromptTracker {
	pub fn new() -> Self {
		Self::default()
	}

	/// Record `token` as the session's active prompt until the guard drops.
	pub fn register(
		self: &Arc<Self>,
		session_id: &str,
		token: CancellationToken,
	) -> ActivePromptGuard {
		let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
		let previous = self
			.active
			.lock()
			.insert(session_id.to_string(), ActiveEntry { token, generation });
		if previous.is_some() {
			debug!(session_id, "replaced active prompt entry");
		}
		ActivePromptGuard {
			tracker: Arc::clone(self),
			session_id: session_id.to_string(),
			generation,
		}
	}

	/// Cancel the session's active prompt. Returns false when none is running.
	pub fn cancel(&self, session_id: &str) -> bool {
		let token = self
			.active
			.lock()
			.get(session_id)
			.map(|entry| entry.token.clone());
		match token {
			Some(token) => {
				token.cancel();
				true
			}
			None => false,
		}
	}

	pub fn cancel_all(&self) -> usize {
		let tokens: Vec<CancellationToken> = self
			.active
			.lock()
			.values()
			.map(|entry| entry.token.clone())
			.collect();
		for token in &tokens {
			token.cancel();
		}
		tokens.len()
	}

	pub fn is_active(&self, session_id: &str) -> bool {
		self.active.lock().contains_key(session_id)
	}

	pub fn len(&self) -> usize {
		self.active.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.active.lock().is_empty()
	}

	fn release(&self, session_id: &str, generation: u64) {
		let mut active = self.active.lock();
		if active
			.get(session_id)
			.is_some_and(|entry| entry.generation == generation)
		{
			active.remove(session_id);
		}
	}
}

/// Removes its tracker entry on drop, whichever way the prompt ends.
pub struct ActivePromptGuard {
	tracker: Arc<ActivePromptTracker>,
	session_id: String,
	generation: u64,
}

impl Drop for ActivePromptGuard {
	fn drop(&mut self) {
		self.tracker.release(&self.session_id, self.generation);
	}
}
