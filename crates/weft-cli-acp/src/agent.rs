// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! ACP method routing for weft.

use std::path::PathBuf;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;
use weft_common_core::{
	AgentConfig, ConversationState, ConversationStore, FileProjectContextLoader, ModelManager,
	NoSkills, NullConversationStore, ProjectContext, ProjectContextLoader, SkillLoader, SkillState,
	ToolExecutor,
};

use crate::bridge::{extract_prompt_text, map_stop_reason};
use crate::error::AcpError;
use crate::modes::{ModeCatalog, NoModes};
use crate::prompt_loop::{PromptLoop, TurnContext};
use crate::protocol::{
	methods, AgentCapabilities, CancelNotification, CurrentModeUpdate, EmptyResponse,
	Implementation, InitializeRequest, InitializeResponse, LoadSessionRequest, LoadSessionResponse,
	NewSessionRequest, NewSessionResponse, PromptCapabilities, PromptRequest, PromptResponse,
	SessionModeState, SessionUpdate, SetSessionModeRequest, PROTOCOL_VERSION,
};
use crate::session::{
	ActivePromptTracker, Session, SessionNotificationRequest, SessionNotifier, SessionRuntime,
	SessionStore,
};

/// The services an agent is built from.
///
/// Only the model and tool executor are required. Without a project-context
/// loader the agent reads `AgentConfig::project_context_files` from each
/// session's working directory; the rest default to no-op implementations.
#[derive(Clone)]
pub struct AgentCollaborators {
	pub model: Arc<dyn ModelManager>,
	pub tools: Arc<dyn ToolExecutor>,
	pub store: Arc<dyn ConversationStore>,
	pub skills: Arc<dyn SkillLoader>,
	pub project: Option<Arc<dyn ProjectContextLoader>>,
	pub modes: Arc<dyn ModeCatalog>,
}

impl AgentCollaborators {
	pub fn new(model: Arc<dyn ModelManager>, tools: Arc<dyn ToolExecutor>) -> Self {
		Self {
			model,
			tools,
			store: Arc::new(NullConversationStore),
			skills: Arc::new(NoSkills),
			project: None,
			modes: Arc::new(NoModes),
		}
	}

	pub fn with_store(mut self, store: Arc<dyn ConversationStore>) -> Self {
		self.store = store;
		self
	}

	pub fn with_skills(mut self, skills: Arc<dyn SkillLoader>) -> Self {
		self.skills = skills;
		self
	}

	pub fn with_project_context(mut self, project: Arc<dyn ProjectContextLoader>) -> Self {
		self.project = Some(project);
		self
	}

	pub fn with_modes(mut self, modes: Arc<dyn ModeCatalog>) -> Self {
		self.modes = modes;
		self
	}
}

/// weft's ACP agent.
///
/// Routes decoded JSON-RPC methods to session operations. Shared between
/// the per-request tasks spawned by the server loop.
pub struct AcpAgent {
	config: Arc<AgentConfig>,
	sessions: Arc<SessionStore>,
	active: Arc<ActivePromptTracker>,
	prompt_loop: PromptLoop,
	skills: Arc<dyn SkillLoader>,
	project: Arc<dyn ProjectContextLoader>,
	modes: Arc<dyn ModeCatalog>,
	notifier: SessionNotifier,
	/// Parent of every prompt's cancellation token.
	root: CancellationToken,
}

impl std::fmt::Debug for AcpAgent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("AcpAgent")
			.field("default_model", &self.config.default_model)
			.field("session_count", &self.sessions.len())
			.field("active_prompts", &self.active.len())
			.finish()
	}
}

impl AcpAgent {
	pub fn new(
		collaborators: AgentCollaborators,
		config: AgentConfig,
		session_update_tx: mpsc::UnboundedSender<SessionNotificationRequest>,
		root: CancellationToken,
	) -> Self {
		let config = Arc::new(config);
		let project: Arc<dyn ProjectContextLoader> = match collaborators.project {
			Some(project) => project,
			None => Arc::new(FileProjectContextLoader::new(
				config.project_context_files.clone(),
			)),
		};
		let prompt_loop = PromptLoop::new(
			collaborators.model,
			collaborators.tools,
			collaborators.store,
			Arc::clone(&config),
		);

		Self {
			config,
			sessions: Arc::new(SessionStore::new()),
			active: Arc::new(ActivePromptTracker::new()),
			prompt_loop,
			skills: collaborators.skills,
			project,
			modes: collaborators.modes,
			notifier: SessionNotifier::new(session_update_tx),
			root,
		}
	}

	pub fn sessions(&self) -> &SessionStore {
		&self.sessions
	}

	pub fn active_prompts(&self) -> &ActivePromptTracker {
		&self.active
	}

	/// Dispatch a request and produce its `result` value.
	pub async fn handle_request(&self, method: &str, params: Value) -> Result<Value, AcpError> {
		match method {
			methods::INITIALIZE => to_result(self.initialize(parse_params(params)?)),
			methods::AUTHENTICATE => {
				debug!("ACP authenticate request (no-op)");
				to_result(EmptyResponse::default())
			}
			methods::SESSION_NEW => to_result(self.new_session(parse_params(params)?).await?),
			methods::SESSION_LOAD => to_result(self.load_session(parse_params(params)?)?),
			methods::SESSION_PROMPT => to_result(self.prompt(parse_params(params)?).await?),
			methods::SESSION_SET_MODE => {
				to_result(self.set_session_mode(parse_params(params)?).await?)
			}
			methods::SHUTDOWN => {
				self.shutdown();
				Ok(Value::Null)
			}
			other => Err(AcpError::MethodNotFound(other.to_string())),
		}
	}

	/// Handle a notification. Failures are logged, never answered.
	pub fn handle_notification(&self, method: &str, params: Value) {
		match method {
			methods::SESSION_CANCEL => match parse_params::<CancelNotification>(params) {
				Ok(req) => self.cancel(&req.session_id),
				Err(e) => warn!(error = %e, "ignoring malformed cancel notification"),
			},
			other => debug!(method = %other, "ignoring unknown notification"),
		}
	}

	#[instrument(skip(self, req))]
	fn initialize(&self, req: InitializeRequest) -> InitializeResponse {
		info!(
				client_version = req.protocol_version,
				client_info = ?req.client_info,
				"ACP initialize request"
		);

		InitializeResponse {
			protocol_version: PROTOCOL_VERSION,
			agent_capabilities: AgentCapabilities {
				load_session: true,
				tool_calls: true,
				prompt_capabilities: PromptCapabilities {
					image: false,
					audio: false,
					embedded_context: true,
				},
			},
			agent_info: Implementation {
				name: "weft".to_string(),
				version: env!("CARGO_PKG_VERSION").to_string(),
				title: Some("Weft Coding Agent".to_string()),
			},
			auth_methods: Vec::new(),
		}
	}

	#[instrument(skip(self, req))]
	async fn new_session(&self, req: NewSessionRequest) -> Result<NewSessionResponse, AcpError> {
		info!(cwd = ?req.cwd, "ACP new_session request");

		let cwd = self.resolve_cwd(req.cwd)?;

		let available_modes = self.modes.available_modes().await;
		// First mode wins as the starting mode.
		let modes = available_modes.first().map(|first| SessionModeState {
			current_mode_id: first.id.clone(),
			available_modes: available_modes.clone(),
		});

		let skills: Arc<dyn SkillState> = match self.skills.load(&cwd).await {
			Ok(skills) => skills,
			Err(e) => {
				warn!(
						cwd = %cwd.display(),
						error = %e,
						"failed to load skills; continuing without"
				);
				Arc::new(NoSkills)
			}
		};
		let project = match self.project.load(&cwd).await {
			Ok(project) => project,
			Err(e) => {
				warn!(
						cwd = %cwd.display(),
						error = %e,
						"failed to load project context; continuing without"
				);
				ProjectContext::default()
			}
		};

		let session_id = format!("S-{}", Uuid::new_v4());
		let runtime = SessionRuntime {
			conversation: ConversationState::new(),
			skills,
			project,
		};
		let session = Session::new(session_id.clone(), cwd, runtime)
			.with_env(req.env)
			.with_mcp_servers(req.mcp_servers)
			.with_modes(modes.clone());
		self.sessions.insert(session);

		info!(session_id = %session_id, "created new session");

		Ok(NewSessionResponse { session_id, modes })
	}

	fn resolve_cwd(&self, requested: Option<PathBuf>) -> Result<PathBuf, AcpError> {
		if let Some(cwd) = requested.or_else(|| self.config.workspace_root.clone()) {
			return Ok(cwd);
		}
		std::env::current_dir()
			.map_err(|e| AcpError::Internal(format!("cannot resolve working directory: {e}")))
	}

	#[instrument(skip(self, req))]
	fn load_session(&self, req: LoadSessionRequest) -> Result<LoadSessionResponse, AcpError> {
		info!(session_id = %req.session_id, "ACP load_session request");

		let session = self
			.sessions
			.get(&req.session_id)
			.ok_or_else(|| AcpError::SessionNotFound(req.session_id.clone()))?;

		Ok(LoadSessionResponse {
			modes: session.mode_state(),
		})
	}

	#[instrument(skip(self, req))]
	async fn prompt(&self, req: PromptRequest) -> Result<PromptResponse, AcpError> {
		info!(
				session_id = %req.session_id,
				prompt_blocks = req.prompt.len(),
				"ACP prompt request"
		);

		let session = self
			.sessions
			.get(&req.session_id)
			.ok_or_else(|| AcpError::SessionNotFound(req.session_id.clone()))?;
		let text = extract_prompt_text(&req.prompt)?;

		let mut runtime = session.lock_runtime().await;
		let cancel = self.root.child_token();
		let _active = self.active.register(&session.id, cancel.clone());

		let ctx = TurnContext {
			session: &session,
			runtime: &mut runtime,
			cancel: &cancel,
			notifier: &self.notifier,
		};
		let outcome = match self.prompt_loop.run(ctx, text).await {
			Ok(outcome) => outcome,
			Err(e) => {
				error!(session_id = %session.id, error = %e, "prompt loop failed");
				return Err(e);
			}
		};

		let stop_reason = map_stop_reason(&outcome);
		info!(session_id = %session.id, stop_reason = ?stop_reason, "prompt complete");

		Ok(PromptResponse { stop_reason })
	}

	#[instrument(skip(self, req))]
	async fn set_session_mode(
		&self,
		req: SetSessionModeRequest,
	) -> Result<EmptyResponse, AcpError> {
		info!(session_id = %req.session_id, mode_id = %req.mode_id, "ACP set_session_mode request");

		let session = self
			.sessions
			.get(&req.session_id)
			.ok_or_else(|| AcpError::SessionNotFound(req.session_id.clone()))?;
		session.set_mode(&req.mode_id)?;

		self
			.notifier
			.send(
				&session.id,
				SessionUpdate::CurrentModeUpdate(CurrentModeUpdate {
					current_mode_id: req.mode_id,
				}),
			)
			.await?;

		Ok(EmptyResponse::default())
	}

	fn cancel(&self, session_id: &str) {
		if self.active.cancel(session_id) {
			info!(session_id, "cancelled active prompt");
		} else {
			debug!(session_id, "cancel with no active prompt");
		}
	}

	fn shutdown(&self) {
		let cancelled = self.active.cancel_all();
		info!(cancelled, "ACP shutdown request");
	}

	/// Cancel every in-flight prompt, including ones not yet registered.
	pub fn cancel_all_and_shutdown(&self) {
		self.root.cancel();
		self.active.cancel_all();
	}
}

fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, AcpError> {
	let params = if params.is_null() {
		Value::Object(Default::default())
	} else {
		params
	};
	serde_json::from_value(params).map_err(|e| AcpError::InvalidParams(e.to_string()))
}

fn to_result<T: Serialize>(value: T) -> Result<Value, AcpError> {
	Ok(serde_json::to_value(value)?)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::modes::StaticModes;
	use crate::protocol::{SessionMode, SessionNotification};
	use async_trait::async_trait;
	use parking_lot::Mutex;
	use serde_json::json;
	use weft_common_core::{
		ContextError, ModelError, ModelInfo, ModelRequest, ModelResponse, ToolContext,
		ToolDefinition, ToolError, ToolOutput,
	};

	struct EchoModel;

	#[async_trait]
	impl ModelManager for EchoModel {
		async fn chat_completion(
			&self,
			request: ModelRequest,
		) -> Result<ModelResponse, ModelError> {
			let last = request
				.messages
				.last()
				.map(|m| m.content.clone())
				.unwrap_or_default();
			Ok(ModelResponse::text(format!("echo: {last}")))
		}

		fn model_info(&self, _model: &str) -> Option<ModelInfo> {
			None
		}
	}

	struct NoTools;

	#[async_trait]
	impl ToolExecutor for NoTools {
		fn functions_filtered(&self, _allowed: Option<&[String]>) -> Vec<ToolDefinition> {
			Vec::new()
		}

		async fn execute(
			&self,
			name: &str,
			_params: Value,
			_ctx: &ToolContext,
		) -> Result<ToolOutput, ToolError> {
			Err(ToolError::NotFound(name.to_string()))
		}
	}

	struct BrokenSkills;

	#[async_trait]
	impl SkillLoader for BrokenSkills {
		async fn load(&self, _cwd: &std::path::Path) -> Result<Arc<dyn SkillState>, ContextError> {
			Err(ContextError::InvalidSkill("bad frontmatter".to_string()))
		}
	}

	fn agent_with(
		collaborators: AgentCollaborators,
	) -> (AcpAgent, Arc<Mutex<Vec<SessionNotification>>>) {
		let config = AgentConfig {
			workspace_root: Some(PathBuf::from("/tmp/weft-workspace")),
			..AgentConfig::default()
		};
		agent_with_config(collaborators, config)
	}

	fn agent_with_config(
		collaborators: AgentCollaborators,
		config: AgentConfig,
	) -> (AcpAgent, Arc<Mutex<Vec<SessionNotification>>>) {
		let (tx, mut rx) = mpsc::unbounded_channel::<SessionNotificationRequest>();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		tokio::spawn(async move {
			while let Some(req) = rx.recv().await {
				sink.lock().push(req.notification);
				let _ = req.completion_tx.send(());
			}
		});
		(
			AcpAgent::new(collaborators, config, tx, CancellationToken::new()),
			seen,
		)
	}

	fn agent() -> (AcpAgent, Arc<Mutex<Vec<SessionNotification>>>) {
		agent_with(AgentCollaborators::new(Arc::new(EchoModel), Arc::new(NoTools)))
	}

	async fn new_session(agent: &AcpAgent) -> Value {
		agent
			.handle_request(methods::SESSION_NEW, json!({}))
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn initialize_advertises_capabilities() {
		let (agent, _) = agent();
		let result = agent
			.handle_request(methods::INITIALIZE, json!({"protocolVersion": 1}))
			.await
			.unwrap();
		assert_eq!(result["protocolVersion"], 1);
		assert_eq!(result["agentCapabilities"]["loadSession"], true);
		assert_eq!(result["agentCapabilities"]["promptCapabilities"]["embeddedContext"], true);
		assert_eq!(result["agentCapabilities"]["promptCapabilities"]["image"], false);
		assert_eq!(result["agentInfo"]["name"], "weft");
		assert_eq!(result["authMethods"], json!([]));
	}

	#[tokio::test]
	async fn new_session_uses_configured_workspace() {
		let (agent, _) = agent();
		let result = new_session(&agent).await;
		let id = result["sessionId"].as_str().unwrap();
		assert!(id.starts_with("S-"));
		assert!(result.get("modes").is_none());

		let session = agent.sessions().get(id).unwrap();
		assert_eq!(session.cwd, PathBuf::from("/tmp/weft-workspace"));
	}

	#[tokio::test]
	async fn first_mode_becomes_current() {
		let (agent, _) = agent_with(
			AgentCollaborators::new(Arc::new(EchoModel), Arc::new(NoTools)).with_modes(Arc::new(
				StaticModes::new(vec![
					SessionMode::new("fast", "Fast"),
					SessionMode::new("smart", "Smart"),
				]),
			)),
		);
		let result = new_session(&agent).await;
		assert_eq!(result["modes"]["currentModeId"], "fast");
		assert_eq!(result["modes"]["availableModes"].as_array().unwrap().len(), 2);
	}

	#[tokio::test]
	async fn skill_failures_degrade_to_defaults() {
		let (agent, _) = agent_with(
			AgentCollaborators::new(Arc::new(EchoModel), Arc::new(NoTools))
				.with_skills(Arc::new(BrokenSkills)),
		);
		let result = new_session(&agent).await;
		assert!(result["sessionId"].as_str().is_some());
	}

	#[tokio::test]
	async fn configured_context_files_are_read_from_session_cwd() {
		let dir = tempfile::tempdir().unwrap();
		std::fs::write(dir.path().join("RULES.md"), "always run the linter").unwrap();
		let config = AgentConfig {
			project_context_files: vec!["MISSING.md".to_string(), "RULES.md".to_string()],
			..AgentConfig::default()
		};
		let (agent, _) = agent_with_config(
			AgentCollaborators::new(Arc::new(EchoModel), Arc::new(NoTools)),
			config,
		);

		let result = agent
			.handle_request(methods::SESSION_NEW, json!({"cwd": dir.path()}))
			.await
			.unwrap();
		let session = agent
			.sessions()
			.get(result["sessionId"].as_str().unwrap())
			.unwrap();
		let runtime = session.lock_runtime().await;
		assert_eq!(runtime.project.raw.as_deref(), Some("always run the linter"));
	}

	#[tokio::test]
	async fn load_session_requires_existing_id() {
		let (agent, _) = agent();
		let err = agent
			.handle_request(methods::SESSION_LOAD, json!({"sessionId": "S-missing"}))
			.await
			.unwrap_err();
		assert!(matches!(err, AcpError::SessionNotFound(_)));

		let id = new_session(&agent).await["sessionId"].clone();
		agent
			.handle_request(methods::SESSION_LOAD, json!({"sessionId": id}))
			.await
			.unwrap();
	}

	#[tokio::test]
	async fn prompt_streams_answer_and_ends_turn() {
		let (agent, seen) = agent();
		let id = new_session(&agent).await["sessionId"].clone();

		let result = agent
			.handle_request(
				methods::SESSION_PROMPT,
				json!({"sessionId": id, "prompt": [{"type": "text", "text": "hello"}]}),
			)
			.await
			.unwrap();
		assert_eq!(result, json!({"stopReason": "end_turn"}));

		let seen = seen.lock();
		let answer = seen
			.iter()
			.find_map(|n| match &n.update {
				SessionUpdate::AgentMessageChunk(chunk) => Some(chunk.content.clone()),
				_ => None,
			})
			.unwrap();
		assert_eq!(answer, crate::protocol::ContentBlock::text("echo: hello"));
		assert!(!agent.active_prompts().is_active(id.as_str().unwrap()));
	}

	#[tokio::test]
	async fn whitespace_prompt_is_invalid_params() {
		let (agent, _) = agent();
		let id = new_session(&agent).await["sessionId"].clone();
		let err = agent
			.handle_request(
				methods::SESSION_PROMPT,
				json!({"sessionId": id, "prompt": [{"type": "text", "text": "   "}]}),
			)
			.await
			.unwrap_err();
		assert!(matches!(err, AcpError::EmptyPrompt));
		assert_eq!(err.code(), -32602);
	}

	#[tokio::test]
	async fn cancelled_root_stops_prompt() {
		let (agent, _) = agent();
		let id = new_session(&agent).await["sessionId"].clone();
		agent.cancel_all_and_shutdown();
		let result = agent
			.handle_request(
				methods::SESSION_PROMPT,
				json!({"sessionId": id, "prompt": [{"type": "text", "text": "hi"}]}),
			)
			.await
			.unwrap();
		assert_eq!(result["stopReason"], "cancelled");
	}

	#[tokio::test]
	async fn set_mode_emits_update() {
		let (agent, seen) = agent_with(
			AgentCollaborators::new(Arc::new(EchoModel), Arc::new(NoTools))
				.with_modes(Arc::new(StaticModes::from_models(["fast", "smart"]))),
		);
		let id = new_session(&agent).await["sessionId"].clone();

		let err = agent
			.handle_request(
				methods::SESSION_SET_MODE,
				json!({"sessionId": id, "modeId": "turbo"}),
			)
			.await
			.unwrap_err();
		assert_eq!(err.code(), -32602);
		assert!(seen.lock().is_empty());

		let result = agent
			.handle_request(
				methods::SESSION_SET_MODE,
				json!({"sessionId": id, "modeId": "smart"}),
			)
			.await
			.unwrap();
		assert_eq!(result, json!({}));
		assert_eq!(
			seen.lock()[0].update,
			SessionUpdate::CurrentModeUpdate(CurrentModeUpdate {
				current_mode_id: "smart".to_string()
			})
		);
	}

	#[tokio::test]
	async fn unknown_method_and_bad_params() {
		let (agent, _) = agent();
		let err = agent
			.handle_request("session/delete", json!({}))
			.await
			.unwrap_err();
		assert_eq!(err.code(), -32601);

		let err = agent
			.handle_request(methods::SESSION_PROMPT, json!({"sessionId": 5}))
			.await
			.unwrap_err();
		assert_eq!(err.code(), -32602);
	}

	#[tokio::test]
	async fn cancel_without_prompt_is_noop() {
		let (agent, _) = agent();
		agent.handle_notification(methods::SESSION_CANCEL, json!({"sessionId": "S-none"}));
		agent.handle_notification("session/unknown", json!({}));
		assert!(agent.active_prompts().is_empty());

		let result = agent.handle_request(methods::SHUTDOWN, Value::Null).await.unwrap();
		assert!(result.is_null());
	}
}
