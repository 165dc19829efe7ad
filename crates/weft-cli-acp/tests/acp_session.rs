// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end tests driving `serve_connection` over in-memory pipes.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;
use weft_cli_acp::transport::{FrameReader, InboundFrame, MAX_FRAME_BYTES};
use weft_cli_acp::{serve_connection, AcpError, AgentCollaborators, StaticModes};
use weft_cli_tools::{Tool, ToolRegistry};
use weft_common_core::{
	AgentConfig, Message, ModelError, ModelInfo, ModelManager, ModelRequest, ModelResponse, Role,
	StaticSkills, ToolCall, ToolContext, ToolError, ToolOutput, ToolSchema,
};

const TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Collaborators
// =============================================================================

/// Replays canned responses and records every request it receives.
#[derive(Default)]
struct ScriptedModel {
	script: Mutex<VecDeque<Result<ModelResponse, ModelError>>>,
	requests: Mutex<Vec<ModelRequest>>,
	block: bool,
}

impl ScriptedModel {
	fn new(script: Vec<Result<ModelResponse, ModelError>>) -> Arc<Self> {
		Arc::new(Self {
			script: Mutex::new(script.into()),
			..Self::default()
		})
	}

	/// A model that never answers.
	fn blocking() -> Arc<Self> {
		Arc::new(Self {
			block: true,
			..Self::default()
		})
	}

	fn requests(&self) -> Vec<ModelRequest> {
		self.requests.lock().clone()
	}
}

#[async_trait]
impl ModelManager for ScriptedModel {
	async fn chat_completion(&self, request: ModelRequest) -> Result<ModelResponse, ModelError> {
		self.requests.lock().push(request);
		if self.block {
			futures::future::pending::<()>().await;
		}
		let next = self.script.lock().pop_front();
		next.unwrap_or_else(|| Ok(ModelResponse::text("script exhausted")))
	}

	fn model_info(&self, model: &str) -> Option<ModelInfo> {
		Some(ModelInfo {
			id: model.to_string(),
			context_length: Some(32_000),
			pricing: None,
			supports_reasoning: false,
		})
	}
}

struct SearchText;

#[async_trait]
impl Tool for SearchText {
	fn name(&self) -> &str {
		"search_text"
	}

	fn description(&self) -> &str {
		"Search workspace files for a pattern"
	}

	fn parameters(&self) -> ToolSchema {
		ToolSchema::from_json(&json!({
				"type": "object",
				"properties": {"pattern": {"type": "string"}},
				"required": ["pattern"]
		}))
		.unwrap()
	}

	async fn invoke(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput, ToolError> {
		let pattern = args["pattern"]
			.as_str()
			.ok_or_else(|| ToolError::InvalidArguments("pattern is required".to_string()))?;
		Ok(ToolOutput::text(format!(
			"src/main.rs:3: // {pattern}: wire up config\nsrc/lib.rs:9: // {pattern}: docs"
		)))
	}
}

fn registry() -> Arc<ToolRegistry> {
	let mut registry = ToolRegistry::new();
	registry.register(Box::new(SearchText));
	Arc::new(registry)
}

// =============================================================================
// Harness
// =============================================================================

struct Client {
	writer: DuplexStream,
	reader: FrameReader<DuplexStream>,
	server: JoinHandle<Result<(), AcpError>>,
	next_id: u64,
}

impl Client {
	fn start(collaborators: AgentCollaborators) -> Self {
		let (client_out, server_in) = tokio::io::duplex(64 * 1024);
		let (server_out, client_in) = tokio::io::duplex(64 * 1024);
		let config = AgentConfig {
			workspace_root: Some(PathBuf::from("/tmp/weft-acp-test")),
			..AgentConfig::default()
		};
		let server = tokio::spawn(serve_connection(collaborators, config, server_in, server_out));
		Self {
			writer: client_out,
			reader: FrameReader::new(client_in),
			server,
			next_id: 1,
		}
	}

	async fn send_raw(&mut self, line: &str) {
		self.send_bytes(line.as_bytes()).await;
	}

	async fn send_bytes(&mut self, line: &[u8]) {
		self.writer.write_all(line).await.unwrap();
		self.writer.write_all(b"\n").await.unwrap();
	}

	async fn notify(&mut self, method: &str, params: Value) {
		let frame = json!({"jsonrpc": "2.0", "method": method, "params": params});
		self.send_raw(&frame.to_string()).await;
	}

	async fn send_request(&mut self, method: &str, params: Value) -> u64 {
		let id = self.next_id;
		self.next_id += 1;
		let frame = json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params});
		self.send_raw(&frame.to_string()).await;
		id
	}

	async fn next_frame(&mut self) -> Value {
		let frame = tokio::time::timeout(TIMEOUT, self.reader.read_message())
			.await
			.expect("timed out waiting for frame")
			.unwrap();
		match frame {
			Some(InboundFrame::Message(frame)) => serde_json::from_str(&frame).unwrap(),
			Some(InboundFrame::Malformed(reason)) => panic!("server wrote a bad frame: {reason}"),
			None => panic!("server closed the stream"),
		}
	}

	/// Read until the response for `id`, collecting notifications on the way.
	async fn response_for(&mut self, id: Value) -> (Vec<Value>, Value) {
		let mut updates = Vec::new();
		loop {
			let frame = self.next_frame().await;
			if frame.get("method").is_some() {
				updates.push(frame);
			} else if frame["id"] == id {
				return (updates, frame);
			}
		}
	}

	async fn request(&mut self, method: &str, params: Value) -> (Vec<Value>, Value) {
		let id = self.send_request(method, params).await;
		self.response_for(json!(id)).await
	}

	async fn new_session(&mut self) -> String {
		let (_, response) = self.request("session/new", json!({})).await;
		response["result"]["sessionId"].as_str().unwrap().to_string()
	}

	async fn prompt(&mut self, session_id: &str, text: &str) -> (Vec<Value>, Value) {
		self
			.request(
				"session/prompt",
				json!({"sessionId": session_id, "prompt": [{"type": "text", "text": text}]}),
			)
			.await
	}

	async fn close(self) -> Result<(), AcpError> {
		drop(self.writer);
		tokio::time::timeout(TIMEOUT, self.server)
			.await
			.expect("server did not stop")
			.unwrap()
	}
}

fn update_kind(frame: &Value) -> &str {
	frame["params"]["update"]["sessionUpdate"]
		.as_str()
		.unwrap_or_default()
}

fn failed_tool_updates(updates: &[Value]) -> Vec<String> {
	updates
		.iter()
		.filter(|u| {
			update_kind(u) == "tool_call_update" && u["params"]["update"]["status"] == "failed"
		})
		.map(|u| {
			u["params"]["update"]["content"][0]["content"]["text"]
				.as_str()
				.unwrap()
				.to_string()
		})
		.collect()
}

fn position(updates: &[Value], pred: impl Fn(&Value) -> bool) -> usize {
	updates
		.iter()
		.position(pred)
		.expect("expected update not found")
}

fn message_chunks(updates: &[Value]) -> Vec<String> {
	chunks(updates, "agent_message_chunk")
}

fn chunks(updates: &[Value], kind: &str) -> Vec<String> {
	updates
		.iter()
		.filter(|u| update_kind(u) == kind)
		.map(|u| {
			u["params"]["update"]["content"]["text"]
				.as_str()
				.unwrap()
				.to_string()
		})
		.collect()
}

// =============================================================================
// Scenarios
// =============================================================================

/// Scenario A: a tool round trip ends in a plain answer.
#[tokio::test]
async fn search_tool_round_trip_then_answer() {
	let model = ScriptedModel::new(vec![
		Ok(ModelResponse::with_tool_calls(
			"",
			vec![ToolCall::new("", "search_text", r#"{"pattern":"TODO"}"#)],
		)),
		Ok(ModelResponse::text("Found 2 TODO comments.")),
	]);
	let mut client = Client::start(AgentCollaborators::new(model.clone(), registry()));
	let session_id = client.new_session().await;

	let (updates, response) = client.prompt(&session_id, "Find the TODO comments").await;
	assert_eq!(response["result"], json!({"stopReason": "end_turn"}));

	let started = position(&updates, |u| update_kind(u) == "tool_call");
	let start = &updates[started]["params"]["update"];
	assert_eq!(start["toolCallId"], "tool-1");
	assert_eq!(start["title"], "Search text");
	assert_eq!(start["kind"], "search");
	assert_eq!(start["status"], "pending");
	assert_eq!(start["rawInput"], json!({"pattern": "TODO"}));

	let completed = position(&updates, |u| {
		update_kind(u) == "tool_call_update" && u["params"]["update"]["status"] == "completed"
	});
	let done = &updates[completed]["params"]["update"];
	assert!(done["content"][0]["content"]["text"]
		.as_str()
		.unwrap()
		.contains("TODO"));

	let answered = position(&updates, |u| update_kind(u) == "agent_message_chunk");
	assert!(started < completed && completed < answered);
	assert_eq!(message_chunks(&updates), vec!["Found 2 TODO comments."]);

	let requests = model.requests();
	assert_eq!(requests.len(), 2);
	assert!(!requests[0].tools.is_empty());
	let tool_reply = requests[1]
		.messages
		.iter()
		.find(|m| m.role == Role::Tool)
		.unwrap();
	assert_eq!(tool_reply.tool_call_id.as_deref(), Some("tool-1"));
	assert!(tool_reply.content.contains("src/main.rs:3"));

	client.close().await.unwrap();
}

/// Scenario B: announced-but-not-done replies are nudged at most twice.
#[tokio::test]
async fn intent_replies_are_nudged_twice_then_returned() {
	let model = ScriptedModel::new(vec![
		Ok(ModelResponse::text("I'll check the file")),
		Ok(ModelResponse::text("I'll check the file")),
		Ok(ModelResponse::text("I'll check the file")),
		Ok(ModelResponse::text("unexpected fourth call")),
	]);
	let mut client = Client::start(AgentCollaborators::new(model.clone(), registry()));
	let session_id = client.new_session().await;

	let (updates, response) = client.prompt(&session_id, "What is in main.rs?").await;
	assert_eq!(response["result"]["stopReason"], "end_turn");
	assert_eq!(message_chunks(&updates), vec!["I'll check the file"]);

	let requests = model.requests();
	assert_eq!(requests.len(), 3);
	let nudges = |request: &ModelRequest| {
		request
			.messages
			.iter()
			.filter(|m| m.role == Role::User && m.content.starts_with("You have tools available"))
			.count()
	};
	assert_eq!(nudges(&requests[0]), 0);
	assert_eq!(nudges(&requests[1]), 1);
	assert_eq!(nudges(&requests[2]), 2);

	// Three model rounds, but the thinking phase is reported once.
	let thoughts = chunks(&updates, "agent_thought_chunk");
	assert_eq!(thoughts.iter().filter(|t| *t == "Thinking…").count(), 1);
	assert_eq!(thoughts, vec!["Thinking…", "Finalizing…"]);

	client.close().await.unwrap();
}

/// Scenario C: a model that rejects tools is retried without them.
#[tokio::test]
async fn unsupported_tools_retry_without_tools() {
	let model = ScriptedModel::new(vec![
		Err(ModelError::Api(
			"model local-7b does not support tool calling".to_string(),
		)),
		Ok(ModelResponse::text("plain answer")),
	]);
	let mut client = Client::start(AgentCollaborators::new(model.clone(), registry()));
	let session_id = client.new_session().await;

	let (updates, response) = client.prompt(&session_id, "hello").await;
	assert!(response.get("error").is_none());
	assert_eq!(response["result"]["stopReason"], "end_turn");
	assert_eq!(message_chunks(&updates), vec!["plain answer"]);

	let requests = model.requests();
	assert_eq!(requests.len(), 2);
	assert!(requests[0].tools_enabled());
	assert!(!requests[1].tools_enabled());
	assert_eq!(requests[1].tool_choice, None);
	assert_eq!(requests[0].messages, requests[1].messages);

	client.close().await.unwrap();
}

/// Scenario D: an unknown mode is rejected and the current mode kept.
#[tokio::test]
async fn unknown_mode_is_rejected() {
	let model = ScriptedModel::new(Vec::new());
	let mut client = Client::start(
		AgentCollaborators::new(model, registry())
			.with_modes(Arc::new(StaticModes::from_models(["fast", "smart"]))),
	);
	let session_id = client.new_session().await;

	let (updates, response) = client
		.request(
			"session/set_mode",
			json!({"sessionId": session_id, "modeId": "turbo"}),
		)
		.await;
	assert_eq!(response["error"]["code"], -32602);
	assert!(updates.is_empty());

	let (_, loaded) = client
		.request("session/load", json!({"sessionId": session_id}))
		.await;
	assert_eq!(loaded["result"]["modes"]["currentModeId"], "fast");

	let (updates, response) = client
		.request(
			"session/set_mode",
			json!({"sessionId": session_id, "modeId": "smart"}),
		)
		.await;
	assert_eq!(response["result"], json!({}));
	assert_eq!(update_kind(&updates[0]), "current_mode_update");

	client.close().await.unwrap();
}

// =============================================================================
// Envelope and lifecycle
// =============================================================================

#[tokio::test]
async fn mode_selects_the_model() {
	let model = ScriptedModel::new(vec![Ok(ModelResponse::text("ok"))]);
	let mut client = Client::start(
		AgentCollaborators::new(model.clone(), registry())
			.with_modes(Arc::new(StaticModes::from_models(["fast", "smart"]))),
	);
	let session_id = client.new_session().await;
	client
		.request(
			"session/set_mode",
			json!({"sessionId": session_id, "modeId": "smart"}),
		)
		.await;
	client.prompt(&session_id, "hi").await;

	assert_eq!(model.requests()[0].model, "smart");
	client.close().await.unwrap();
}

#[tokio::test]
async fn cancel_interrupts_a_running_prompt() {
	let model = ScriptedModel::blocking();
	let mut client = Client::start(AgentCollaborators::new(model, registry()));
	let session_id = client.new_session().await;

	let id = client
		.send_request(
			"session/prompt",
			json!({"sessionId": session_id, "prompt": [{"type": "text", "text": "long task"}]}),
		)
		.await;

	// The thinking phase is sent before the model is called.
	loop {
		let frame = client.next_frame().await;
		if update_kind(&frame) == "agent_thought_chunk" {
			break;
		}
	}
	client
		.notify("session/cancel", json!({"sessionId": session_id}))
		.await;

	let (_, response) = client.response_for(json!(id)).await;
	assert_eq!(response["result"]["stopReason"], "cancelled");

	client.close().await.unwrap();
}

#[tokio::test]
async fn protocol_errors_are_reported_with_codes() {
	let model = ScriptedModel::new(Vec::new());
	let mut client = Client::start(AgentCollaborators::new(model, registry()));

	client.send_raw("{this is not json").await;
	let frame = client.next_frame().await;
	assert!(frame["id"].is_null());
	assert_eq!(frame["error"]["code"], -32700);

	client
		.send_raw(r#"{"jsonrpc":"1.0","id":"v1","method":"initialize"}"#)
		.await;
	let frame = client.next_frame().await;
	assert_eq!(frame["id"], "v1");
	assert_eq!(frame["error"]["code"], -32600);

	let (_, response) = client.request("session/fork", json!({})).await;
	assert_eq!(response["error"]["code"], -32601);

	let (_, response) = client
		.request(
			"session/prompt",
			json!({"sessionId": "S-missing", "prompt": [{"type": "text", "text": "hi"}]}),
		)
		.await;
	assert_eq!(response["error"]["code"], -32001);

	let session_id = client.new_session().await;
	let (updates, response) = client.prompt(&session_id, "  \n ").await;
	assert_eq!(response["error"]["code"], -32602);
	assert_eq!(response["error"]["message"], "empty prompt");
	assert!(updates.is_empty());

	client.close().await.unwrap();
}

#[tokio::test]
async fn notifications_are_never_answered() {
	let model = ScriptedModel::new(Vec::new());
	let mut client = Client::start(AgentCollaborators::new(model, registry()));

	client
		.notify("session/cancel", json!({"sessionId": "S-nobody"}))
		.await;
	client.notify("session/unknown", json!({})).await;
	client
		.send_raw(r#"{"jsonrpc":"2.0","id":3,"result":{"ok":true}}"#)
		.await;

	// The next frame must be the initialize response, proving nothing else
	// was written for the notifications above.
	let id = client
		.send_request("initialize", json!({"protocolVersion": 1}))
		.await;
	let frame = client.next_frame().await;
	assert_eq!(frame["id"], json!(id));
	assert_eq!(frame["result"]["protocolVersion"], 1);

	let (_, response) = client.request("shutdown", Value::Null).await;
	assert!(response["result"].is_null());
	assert!(response.get("error").is_none());

	client.close().await.unwrap();
}

#[tokio::test]
async fn history_carries_across_prompts() {
	let model = ScriptedModel::new(vec![
		Ok(ModelResponse::text("first answer")),
		Ok(ModelResponse::text("second answer")),
	]);
	let mut client = Client::start(AgentCollaborators::new(model.clone(), registry()));
	let session_id = client.new_session().await;

	client.prompt(&session_id, "first question").await;
	client.prompt(&session_id, "second question").await;

	let requests = model.requests();
	let contents: Vec<&str> = requests[1]
		.messages
		.iter()
		.filter(|m: &&Message| m.role != Role::System)
		.map(|m| m.content.as_str())
		.collect();
	assert_eq!(
		contents,
		vec!["first question", "first answer", "second question"]
	);
	assert!(requests[1].messages[0]
		.content
		.contains("Working directory: /tmp/weft-acp-test"));

	client.close().await.unwrap();
}

#[tokio::test]
async fn bad_frames_are_answered_and_the_connection_survives() {
	let model = ScriptedModel::new(Vec::new());
	let mut client = Client::start(AgentCollaborators::new(model, registry()));

	client
		.send_bytes(b"{\"jsonrpc\":\"2.0\",\"id\":99,\"method\":\"initialize\",\"x\":\"\xff\xfe\"}")
		.await;
	let frame = client.next_frame().await;
	assert!(frame["id"].is_null());
	assert_eq!(frame["error"]["code"], -32700);

	client.send_bytes(&vec![b'a'; MAX_FRAME_BYTES + 1]).await;
	let frame = client.next_frame().await;
	assert!(frame["id"].is_null());
	assert_eq!(frame["error"]["code"], -32700);

	for bad in ["42", "[]", r#"{"jsonrpc":"2.0"}"#] {
		client.send_raw(bad).await;
		let frame = client.next_frame().await;
		assert!(frame["id"].is_null(), "{bad}");
		assert_eq!(frame["error"]["code"], -32600, "{bad}");
	}

	let (_, response) = client
		.request("initialize", json!({"protocolVersion": 1}))
		.await;
	assert_eq!(response["result"]["protocolVersion"], 1);

	client.close().await.unwrap();
}

// =============================================================================
// Recoverable failures
// =============================================================================

#[tokio::test]
async fn malformed_tool_arguments_fail_the_call_not_the_turn() {
	let model = ScriptedModel::new(vec![
		Ok(ModelResponse::with_tool_calls(
			"",
			vec![ToolCall::new("call-a", "search_text", "{\"pattern\": ")],
		)),
		Ok(ModelResponse::text("The search arguments were broken.")),
	]);
	let mut client = Client::start(AgentCollaborators::new(model.clone(), registry()));
	let session_id = client.new_session().await;

	let (updates, response) = client.prompt(&session_id, "search for TODO").await;
	assert_eq!(response["result"]["stopReason"], "end_turn");

	let failures = failed_tool_updates(&updates);
	assert_eq!(failures.len(), 1);
	assert!(failures[0].starts_with("Error: Invalid arguments"), "{}", failures[0]);
	assert_eq!(
		message_chunks(&updates),
		vec!["The search arguments were broken."]
	);

	let requests = model.requests();
	assert_eq!(requests.len(), 2);
	let tool_reply = requests[1]
		.messages
		.iter()
		.find(|m| m.role == Role::Tool)
		.unwrap();
	assert_eq!(tool_reply.tool_call_id.as_deref(), Some("call-a"));
	assert!(tool_reply.content.starts_with("Error: Invalid arguments"));

	client.close().await.unwrap();
}

#[tokio::test]
async fn tools_outside_the_skill_allow_list_are_refused() {
	let model = ScriptedModel::new(vec![
		Ok(ModelResponse::with_tool_calls(
			"",
			vec![ToolCall::new("", "search_text", r#"{"pattern":"TODO"}"#)],
		)),
		Ok(ModelResponse::text("I am not allowed to search.")),
	]);
	let skills = StaticSkills::new(Some(vec!["read_file".to_string()]), Vec::new());
	let mut client = Client::start(
		AgentCollaborators::new(model.clone(), registry()).with_skills(Arc::new(skills)),
	);
	let session_id = client.new_session().await;

	let (updates, response) = client.prompt(&session_id, "search for TODO").await;
	assert_eq!(response["result"]["stopReason"], "end_turn");
	assert_eq!(
		failed_tool_updates(&updates),
		vec!["Error: Tool not allowed: search_text"]
	);

	// The filtered schema is empty, so the model was never offered the tool.
	let requests = model.requests();
	assert!(requests.iter().all(|r| r.tools.is_empty()));

	client.close().await.unwrap();
}

#[tokio::test]
async fn model_failure_aborts_the_prompt_but_not_the_session() {
	let model = ScriptedModel::new(vec![
		Err(ModelError::Api("upstream overloaded".to_string())),
		Ok(ModelResponse::text("back again")),
	]);
	let mut client = Client::start(AgentCollaborators::new(model.clone(), registry()));
	let session_id = client.new_session().await;

	let (_, response) = client.prompt(&session_id, "first try").await;
	assert_eq!(response["error"]["code"], -32603);
	assert!(response["error"]["message"]
		.as_str()
		.unwrap()
		.contains("upstream overloaded"));

	let (updates, response) = client.prompt(&session_id, "second try").await;
	assert_eq!(response["result"]["stopReason"], "end_turn");
	assert_eq!(message_chunks(&updates), vec!["back again"]);
	assert_eq!(model.requests().len(), 2);

	client.close().await.unwrap();
}
