// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! JSON-RPC 2.0 envelope and ACP payload types.
//!
//! Envelopes are parsed from raw frames by [`Incoming::parse`]. Payloads use
//! camelCase field names on the wire, matching the Agent Client Protocol.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";
pub const PROTOCOL_VERSION: u16 = 1;

pub mod methods {
	pub const INITIALIZE: &str = "initialize";
	pub const AUTHENTICATE: &str = "authenticate";
	pub const SESSION_NEW: &str = "session/new";
	pub const SESSION_LOAD: &str = "session/load";
	pub const SESSION_PROMPT: &str = "session/prompt";
	pub const SESSION_SET_MODE: &str = "session/set_mode";
	pub const SESSION_CANCEL: &str = "session/cancel";
	pub const SESSION_UPDATE: &str = "session/update";
	pub const SHUTDOWN: &str = "shutdown";
}

pub mod error_codes {
	pub const PARSE_ERROR: i64 = -32700;
	pub const INVALID_REQUEST: i64 = -32600;
	pub const METHOD_NOT_FOUND: i64 = -32601;
	pub const INVALID_PARAMS: i64 = -32602;
	pub const INTERNAL_ERROR: i64 = -32603;
	pub const SESSION_NOT_FOUND: i64 = -32001;
}

// =============================================================================
// Envelope
// =============================================================================

/// JSON-RPC error object.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
	pub code: i64,
	pub message: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub data: Option<Value>,
}

impl RpcError {
	pub fn new(code: i64, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
			data: None,
		}
	}

	pub fn parse_error(detail: impl Into<String>) -> Self {
		Self::new(error_codes::PARSE_ERROR, format!("Parse error: {}", detail.into()))
	}

	pub fn invalid_request(detail: impl Into<String>) -> Self {
		Self::new(
			error_codes::INVALID_REQUEST,
			format!("Invalid request: {}", detail.into()),
		)
	}
}

/// A parsed inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum Incoming {
	/// Carries an `id` (possibly `null`) and expects a response.
	Request {
		id: Value,
		method: String,
		params: Value,
	},
	/// No `id` key; never answered.
	Notification { method: String, params: Value },
	/// A client reply to something we sent.
	Response {
		id: Value,
		result: Option<Value>,
		error: Option<RpcError>,
	},
}

/// Why a frame could not be turned into an [`Incoming`].
#[derive(Clone, Debug, PartialEq)]
pub enum EnvelopeError {
	/// Not JSON at all; answered with `id: null`.
	Parse(String),
	/// Valid JSON but not a JSON-RPC 2.0 message. Answered with the frame's
	/// `id`, or `null` when it had none.
	InvalidRequest { id: Value, reason: String },
	/// Shaped like a notification (string `method`, no `id`) but otherwise
	/// invalid. Never answered.
	InvalidNotification { method: String, reason: String },
}

fn reject(id: Option<Value>, method: Option<&Value>, reason: impl Into<String>) -> EnvelopeError {
	match (id, method) {
		(None, Some(Value::String(method))) => EnvelopeError::InvalidNotification {
			method: method.clone(),
			reason: reason.into(),
		},
		(id, _) => EnvelopeError::InvalidRequest {
			id: id.unwrap_or(Value::Null),
			reason: reason.into(),
		},
	}
}

impl Incoming {
	pub fn parse(frame: &str) -> Result<Self, EnvelopeError> {
		let value: Value =
			serde_json::from_str(frame).map_err(|e| EnvelopeError::Parse(e.to_string()))?;

		let Value::Object(mut obj) = value else {
			return Err(reject(None, None, "message must be a JSON object"));
		};

		// Presence of the key decides; an explicit null id is still a request.
		let id = obj.remove("id");
		let method = obj.remove("method");

		match obj.get("jsonrpc").and_then(Value::as_str) {
			Some(JSONRPC_VERSION) => {}
			Some(other) => {
				let reason = format!("unsupported jsonrpc version {other:?}");
				return Err(reject(id, method.as_ref(), reason));
			}
			None => return Err(reject(id, method.as_ref(), "missing jsonrpc version")),
		}

		let params = obj.remove("params").unwrap_or(Value::Null);

		match (method, id) {
			(Some(Value::String(method)), Some(id)) => Ok(Incoming::Request { id, method, params }),
			(Some(Value::String(method)), None) => Ok(Incoming::Notification { method, params }),
			(Some(_), id) => Err(reject(id, None, "method must be a string")),
			(None, Some(id)) if obj.contains_key("result") || obj.contains_key("error") => {
				let error = obj
					.remove("error")
					.and_then(|e| serde_json::from_value(e).ok());
				Ok(Incoming::Response {
					id,
					result: obj.remove("result"),
					error,
				})
			}
			(None, id) => Err(reject(id, None, "missing method")),
		}
	}
}

#[derive(Serialize)]
struct ResponseEnvelope<'a> {
	jsonrpc: &'static str,
	id: &'a Value,
	#[serde(skip_serializing_if = "Option::is_none")]
	result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	error: Option<RpcError>,
}

#[derive(Serialize)]
struct NotificationEnvelope<'a, P: Serialize> {
	jsonrpc: &'static str,
	method: &'a str,
	params: &'a P,
}

pub fn response_message(id: &Value, result: Value) -> Value {
	serde_json::to_value(ResponseEnvelope {
		jsonrpc: JSONRPC_VERSION,
		id,
		result: Some(result),
		error: None,
	})
	.unwrap_or(Value::Null)
}

pub fn error_message(id: &Value, error: RpcError) -> Value {
	serde_json::to_value(ResponseEnvelope {
		jsonrpc: JSONRPC_VERSION,
		id,
		result: None,
		error: Some(error),
	})
	.unwrap_or(Value::Null)
}

pub fn notification_message<P: Serialize>(
	method: &str,
	params: &P,
) -> Result<Value, serde_json::Error> {
	serde_json::to_value(NotificationEnvelope {
		jsonrpc: JSONRPC_VERSION,
		method,
		params,
	})
}

// =============================================================================
// initialize / authenticate
// =============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitializeRequest {
	pub protocol_version: u16,
	pub client_capabilities: Value,
	pub client_info: Option<Implementation>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Implementation {
	pub name: String,
	pub version: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResponse {
	pub protocol_version: u16,
	pub agent_capabilities: AgentCapabilities,
	pub agent_info: Implementation,
	pub auth_methods: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
	pub load_session: bool,
	pub tool_calls: bool,
	pub prompt_capabilities: PromptCapabilities,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptCapabilities {
	pub image: bool,
	pub audio: bool,
	pub embedded_context: bool,
}

/// Empty result object, used by `authenticate` and `session/set_mode`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EmptyResponse {}

// =============================================================================
// session/new, session/load, session/set_mode, session/cancel
// =============================================================================

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewSessionRequest {
	pub cwd: Option<PathBuf>,
	pub mcp_servers: Vec<Value>,
	pub env: BTreeMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSessionResponse {
	pub session_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub modes: Option<SessionModeState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionRequest {
	pub session_id: String,
	#[serde(default)]
	pub cwd: Option<PathBuf>,
	#[serde(default)]
	pub mcp_servers: Vec<Value>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadSessionResponse {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub modes: Option<SessionModeState>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetSessionModeRequest {
	pub session_id: String,
	pub mode_id: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelNotification {
	pub session_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionModeState {
	pub current_mode_id: String,
	pub available_modes: Vec<SessionMode>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMode {
	pub id: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

impl SessionMode {
	pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			name: name.into(),
			description: None,
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}
}

// =============================================================================
// session/prompt
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
	pub session_id: String,
	pub prompt: Vec<ContentBlock>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptResponse {
	pub stop_reason: StopReason,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
	EndTurn,
	Cancelled,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
	Text(TextContent),
	Image(MediaContent),
	Audio(MediaContent),
	ResourceLink(ResourceLink),
	Resource(EmbeddedResource),
}

impl ContentBlock {
	pub fn text(text: impl Into<String>) -> Self {
		ContentBlock::Text(TextContent { text: text.into() })
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
	pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaContent {
	pub data: String,
	pub mime_type: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub uri: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceLink {
	pub uri: String,
	pub name: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mime_type: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedResource {
	pub resource: ResourceContents,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceContents {
	Text(TextResourceContents),
	Blob(BlobResourceContents),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextResourceContents {
	#[serde(default)]
	pub uri: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mime_type: Option<String>,
	pub text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobResourceContents {
	#[serde(default)]
	pub uri: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mime_type: Option<String>,
	pub blob: String,
}

// =============================================================================
// session/update
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNotification {
	pub session_id: String,
	pub update: SessionUpdate,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "sessionUpdate", rename_all = "snake_case")]
pub enum SessionUpdate {
	AgentMessageChunk(ContentChunk),
	AgentThoughtChunk(ContentChunk),
	ToolCall(ToolCallStart),
	ToolCallUpdate(ToolCallUpdate),
	CurrentModeUpdate(CurrentModeUpdate),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentChunk {
	pub content: ContentBlock,
}

impl ContentChunk {
	pub fn text(text: impl Into<String>) -> Self {
		Self {
			content: ContentBlock::text(text),
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentModeUpdate {
	pub current_mode_id: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolKind {
	Read,
	Search,
	Edit,
	Execute,
	Fetch,
	Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
	Pending,
	InProgress,
	Completed,
	Failed,
}

/// First report of a tool call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallStart {
	pub tool_call_id: String,
	pub title: String,
	pub kind: ToolKind,
	pub status: ToolCallStatus,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub content: Vec<ToolCallContent>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub raw_input: Option<Value>,
}

/// Change to a reported tool call; unset fields are left as they were.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallUpdate {
	pub tool_call_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub status: Option<ToolCallStatus>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub content: Option<Vec<ToolCallContent>>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub raw_output: Option<Value>,
}

impl ToolCallUpdate {
	pub fn status(tool_call_id: impl Into<String>, status: ToolCallStatus) -> Self {
		Self {
			tool_call_id: tool_call_id.into(),
			status: Some(status),
			content: None,
			raw_output: None,
		}
	}
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ToolCallContent {
	Content(ContentChunk),
	Diff(DiffContent),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffContent {
	pub path: PathBuf,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub old_text: Option<String>,
	pub new_text: String,
}
