// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The agentic tool loop behind `session/prompt`.
//!
//! Each round builds a budgeted request, asks the model, and either returns
//! the answer or runs the requested tools and goes around again. The loop
//! stops on a final answer, on cancellation, or on a model error it cannot
//! recover from.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use weft_common_core::{
	assign_tool_call_ids, estimate_tokens, message_tokens, tool_schema_text, AgentConfig,
	ConversationStore, Message, ModelError, ModelInfo, ModelManager, ModelRequest, ModelResponse,
	ToolCall, ToolContext, ToolDefinition, ToolError, ToolExecutor, ToolOutput,
};

use crate::bridge::{
	text_content, text_to_content_chunk, tool_kind, tool_output_content, tool_title,
};
use crate::budget::{build_system_prompt, prompt_budget, trim_conversation};
use crate::error::AcpError;
use crate::protocol::{SessionUpdate, ToolCallStart, ToolCallStatus, ToolCallUpdate};
use crate::session::{Session, SessionNotifier, SessionRuntime};

const PHASE_THINKING: &str = "Thinking…";
const PHASE_FINALIZING: &str = "Finalizing…";

const NUDGE_MESSAGE: &str = "You have tools available. Use them now to do what you just \
described instead of describing it.";

const CANCELLED_TOOL_RESPONSE: &str = "Error: cancelled";

const INTENT_PHRASES: &[&str] = &[
	"i'll",
	"i will",
	"let me",
	"i'm going to",
	"i am going to",
];

const ACTION_WORDS: &[&str] = &[
	"search", "run", "check", "look", "read", "open", "inspect", "find", "execute", "edit",
	"create", "fix", "update", "list",
];

/// How a prompt turn ended when it did not fail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
	Completed(String),
	Cancelled,
}

/// Everything one turn needs from its session.
pub struct TurnContext<'a> {
	pub session: &'a Session,
	pub runtime: &'a mut SessionRuntime,
	pub cancel: &'a CancellationToken,
	pub notifier: &'a SessionNotifier,
}

/// Per-turn bookkeeping.
struct TurnState {
	model_id: String,
	model_info: Option<ModelInfo>,
	tools_enabled: bool,
	nudges: u32,
	last_phase: Option<String>,
}

/// Whether a reply announces work it did not do.
///
/// Matches an intent phrase ("let me", "I'll", ...) together with an action
/// word ("search", "run", ...).
pub fn is_intent_without_action(text: &str) -> bool {
	let lower = text.to_lowercase().replace('’', "'");
	if !INTENT_PHRASES.iter().any(|p| lower.contains(p)) {
		return false;
	}
	lower
		.split(|c: char| !c.is_alphanumeric())
		.any(|word| ACTION_WORDS.contains(&word))
}

pub struct PromptLoop {
	model: Arc<dyn ModelManager>,
	tools: Arc<dyn ToolExecutor>,
	store: Arc<dyn ConversationStore>,
	config: Arc<AgentConfig>,
}

impl PromptLoop {
	pub fn new(
		model: Arc<dyn ModelManager>,
		tools: Arc<dyn ToolExecutor>,
		store: Arc<dyn ConversationStore>,
		config: Arc<AgentConfig>,
	) -> Self {
		Self {
			model,
			tools,
			store,
			config,
		}
	}

	/// Run one prompt turn for the user's `text`.
	#[instrument(skip(self, ctx, text), fields(session_id = %ctx.session.id))]
	pub async fn run(
		&self,
		mut ctx: TurnContext<'_>,
		text: String,
	) -> Result<TurnOutcome, AcpError> {
		let model_id = ctx
			.session
			.current_mode_id()
			.unwrap_or_else(|| self.config.default_model.clone());
		let model_info = self.model.model_info(&model_id);
		let mut turn = TurnState {
			model_id,
			model_info,
			tools_enabled: true,
			nudges: 0,
			last_phase: None,
		};

		self.record(&mut ctx, Message::user(text)).await;

		loop {
			if ctx.cancel.is_cancelled() {
				info!(session_id = %ctx.session.id, "prompt cancelled");
				return Ok(TurnOutcome::Cancelled);
			}
			self.phase(&ctx, &mut turn, PHASE_THINKING).await?;

			let (response, tools_offered) = match self.request_round(&ctx, &mut turn).await? {
				Some(result) => result,
				None => {
					info!(session_id = %ctx.session.id, "prompt cancelled while waiting for model");
					return Ok(TurnOutcome::Cancelled);
				}
			};

			if let Some(usage) = &response.usage {
				let cost = turn
					.model_info
					.as_ref()
					.and_then(|info| info.pricing.as_ref())
					.map(|pricing| pricing.cost(usage));
				info!(
						session_id = %ctx.session.id,
						model = %turn.model_id,
						input_tokens = usage.input_tokens,
						output_tokens = usage.output_tokens,
						cost_usd = ?cost,
						"model usage"
				);
			}

			if response.tool_calls.is_empty() {
				if tools_offered
					&& turn.nudges < self.config.max_nudges
					&& is_intent_without_action(&response.content)
				{
					turn.nudges += 1;
					debug!(
							session_id = %ctx.session.id,
							nudges = turn.nudges,
							"reply announced work without tool calls; nudging"
					);
					self.record(&mut ctx, Message::assistant(response.content)).await;
					self.record(&mut ctx, Message::user(NUDGE_MESSAGE)).await;
					continue;
				}

				return self.finalize(&mut ctx, &mut turn, response).await;
			}

			if let Some(outcome) = self.run_tool_calls(&mut ctx, &mut turn, response).await? {
				return Ok(outcome);
			}
		}
	}

	/// Build and send one request, retrying once without tools when the
	/// model rejects them. Returns `None` if cancelled while waiting.
	async fn request_round(
		&self,
		ctx: &TurnContext<'_>,
		turn: &mut TurnState,
	) -> Result<Option<(ModelResponse, bool)>, AcpError> {
		let mut retried = false;
		loop {
			let definitions = if turn.tools_enabled {
				let allowed = ctx.runtime.skills.allowed_tools();
				self.tools.functions_filtered(allowed.as_deref())
			} else {
				Vec::new()
			};
			let tools_offered = !definitions.is_empty();
			let request = self.build_request(ctx, turn, definitions);

			debug!(
					session_id = %ctx.session.id,
					model = %turn.model_id,
					message_count = request.messages.len(),
					tools = request.tools.len(),
					"calling model"
			);

			match self.complete(request, ctx.cancel).await {
				None => return Ok(None),
				Some(Ok(response)) => return Ok(Some((response, tools_offered))),
				Some(Err(e)) if tools_offered && !retried && e.is_tool_calling_unsupported() => {
					warn!(
							session_id = %ctx.session.id,
							model = %turn.model_id,
							error = %e,
							"model rejected tools; retrying without them"
					);
					turn.tools_enabled = false;
					retried = true;
				}
				Some(Err(e)) => return Err(AcpError::Model(e)),
			}
		}
	}

	async fn complete(
		&self,
		request: ModelRequest,
		cancel: &CancellationToken,
	) -> Option<Result<ModelResponse, ModelError>> {
		tokio::select! {
			biased;
			_ = cancel.cancelled() => None,
			result = self.model.chat_completion(request) => Some(result),
		}
	}

	fn build_request(
		&self,
		ctx: &TurnContext<'_>,
		turn: &TurnState,
		definitions: Vec<ToolDefinition>,
	) -> ModelRequest {
		let budget = prompt_budget(
			turn.model_info.as_ref().and_then(|info| info.context_length),
			&self.config,
		);
		let tool_tokens = if definitions.is_empty() {
			0
		} else {
			estimate_tokens(&tool_schema_text(&definitions))
		};
		let remaining = budget.saturating_sub(tool_tokens);

		let system = Message::system(build_system_prompt(
			&self.config.system_preamble,
			&ctx.runtime.project,
			&ctx.session.cwd,
			&ctx.runtime.skills.descriptions(),
			remaining / 2,
		));
		let history_budget = remaining.saturating_sub(message_tokens(&system));
		let history = trim_conversation(
			ctx.runtime.conversation.messages(),
			history_budget,
			&self.config.system_preamble,
		);

		let mut messages = Vec::with_capacity(history.len() + 1);
		messages.push(system);
		messages.extend(history);

		let supports_reasoning = turn
			.model_info
			.as_ref()
			.is_some_and(|info| info.supports_reasoning);
		let effort = self
			.config
			.reasoning_effort
			.clone()
			.filter(|_| supports_reasoning);

		let mut request = ModelRequest::new(&turn.model_id)
			.with_messages(messages)
			.with_tools(definitions)
			.with_reasoning_effort(effort);
		if let Some(max_tokens) = self.config.max_tokens {
			request = request.with_max_tokens(max_tokens);
		}
		if let Some(temperature) = self.config.temperature {
			request = request.with_temperature(temperature);
		}
		request
	}

	async fn finalize(
		&self,
		ctx: &mut TurnContext<'_>,
		turn: &mut TurnState,
		response: ModelResponse,
	) -> Result<TurnOutcome, AcpError> {
		self.phase(ctx, turn, PHASE_FINALIZING).await?;

		let answer = response.content;
		let message = Message::assistant(answer.clone()).with_reasoning(response.reasoning);
		let reasoning = message.reasoning.clone();
		self.record(ctx, message).await;

		if let Some(reasoning) = reasoning {
			ctx
				.notifier
				.send(
					&ctx.session.id,
					SessionUpdate::AgentThoughtChunk(text_to_content_chunk(reasoning)),
				)
				.await?;
		}
		if !answer.is_empty() {
			ctx
				.notifier
				.send(
					&ctx.session.id,
					SessionUpdate::AgentMessageChunk(text_to_content_chunk(answer.clone())),
				)
				.await?;
		}

		info!(session_id = %ctx.session.id, nudges = turn.nudges, "turn complete");
		Ok(TurnOutcome::Completed(answer))
	}

	/// Execute the response's tool calls in order. Returns an outcome only
	/// when the turn must stop.
	async fn run_tool_calls(
		&self,
		ctx: &mut TurnContext<'_>,
		turn: &mut TurnState,
		response: ModelResponse,
	) -> Result<Option<TurnOutcome>, AcpError> {
		let mut calls = response.tool_calls;
		assign_tool_call_ids(&mut calls);

		self
			.record(
				ctx,
				Message::assistant_with_tool_calls(response.content, calls.clone()),
			)
			.await;

		let phase = if calls.len() == 1 {
			"Running 1 tool call…".to_string()
		} else {
			format!("Running {} tool calls…", calls.len())
		};
		self.phase(ctx, turn, &phase).await?;

		let allowed = ctx.runtime.skills.allowed_tools();
		let tool_ctx = ToolContext::new(ctx.session.cwd.clone(), ctx.session.id.clone());
		let (session, cancel, notifier) = (ctx.session, ctx.cancel, ctx.notifier);

		for (idx, call) in calls.iter().enumerate() {
			if cancel.is_cancelled() {
				self.cancel_remaining(ctx, &calls[idx..]).await;
				return Ok(Some(TurnOutcome::Cancelled));
			}

			self.announce_call(ctx, call).await?;

			let result = match call.parse_arguments() {
				Err(e) => Err(ToolError::InvalidArguments(e.to_string())),
				Ok(_) if !self.tools.is_tool_allowed(&call.tool_name, allowed.as_deref()) => {
					Err(ToolError::NotAllowed(call.tool_name.clone()))
				}
				Ok(args) => {
					debug!(
							session_id = %session.id,
							tool_id = %call.id,
							tool_name = %call.tool_name,
							"executing tool"
					);
					tokio::select! {
						biased;
						_ = cancel.cancelled() => {
							info!(
									session_id = %session.id,
									tool_id = %call.id,
									"tool call cancelled"
							);
							let update = failed_update(&call.id, "Cancelled");
							notifier
								.send(&session.id, SessionUpdate::ToolCallUpdate(update))
								.await?;
							self.cancel_remaining(ctx, &calls[idx..]).await;
							return Ok(Some(TurnOutcome::Cancelled));
						}
						result = self.tools.execute(&call.tool_name, args, &tool_ctx) => result,
					}
				}
			};

			self.finish_call(ctx, call, result).await?;
		}

		Ok(None)
	}

	async fn announce_call(&self, ctx: &TurnContext<'_>, call: &ToolCall) -> Result<(), AcpError> {
		let raw_input = call
			.parse_arguments()
			.unwrap_or_else(|_| Value::String(call.arguments.clone()));
		ctx
			.notifier
			.send(
				&ctx.session.id,
				SessionUpdate::ToolCall(ToolCallStart {
					tool_call_id: call.id.clone(),
					title: tool_title(&call.tool_name),
					kind: tool_kind(&call.tool_name),
					status: ToolCallStatus::Pending,
					content: Vec::new(),
					raw_input: Some(raw_input),
				}),
			)
			.await?;
		ctx
			.notifier
			.send(
				&ctx.session.id,
				SessionUpdate::ToolCallUpdate(ToolCallUpdate::status(
					call.id.clone(),
					ToolCallStatus::InProgress,
				)),
			)
			.await
	}

	async fn finish_call(
		&self,
		ctx: &mut TurnContext<'_>,
		call: &ToolCall,
		result: Result<ToolOutput, ToolError>,
	) -> Result<(), AcpError> {
		let (content, update) = match result {
			Ok(output) => {
				debug!(tool_id = %call.id, "tool succeeded");
				let display = output.display();
				let mut blocks = tool_output_content(&output, self.config.tool_output_limit);
				if blocks.is_empty() {
					blocks.push(text_content(&display));
				}
				let update = ToolCallUpdate {
					tool_call_id: call.id.clone(),
					status: Some(ToolCallStatus::Completed),
					content: Some(blocks),
					raw_output: Some(json!({ "display": display })),
				};
				(output.to_model_content(), update)
			}
			Err(e) => {
				warn!(tool_id = %call.id, tool_name = %call.tool_name, error = %e, "tool failed");
				let text = format!("Error: {e}");
				let update = failed_update(&call.id, &text);
				(text, update)
			}
		};

		self
			.record(ctx, Message::tool(call.id.clone(), call.tool_name.clone(), content))
			.await;
		ctx
			.notifier
			.send(&ctx.session.id, SessionUpdate::ToolCallUpdate(update))
			.await
	}

	/// Close out calls that will never run so every call has a response.
	async fn cancel_remaining(&self, ctx: &mut TurnContext<'_>, calls: &[ToolCall]) {
		for call in calls {
			self
				.record(
					ctx,
					Message::tool(call.id.clone(), call.tool_name.clone(), CANCELLED_TOOL_RESPONSE),
				)
				.await;
		}
	}

	/// Emit a progress phase as a thought chunk, once per distinct phase.
	async fn phase(
		&self,
		ctx: &TurnContext<'_>,
		turn: &mut TurnState,
		phase: &str,
	) -> Result<(), AcpError> {
		if turn.last_phase.as_deref() == Some(phase) {
			return Ok(());
		}
		turn.last_phase = Some(phase.to_string());
		ctx
			.notifier
			.send(
				&ctx.session.id,
				SessionUpdate::AgentThoughtChunk(text_to_content_chunk(phase)),
			)
			.await
	}

	/// Append to the conversation and persist best effort.
	async fn record(&self, ctx: &mut TurnContext<'_>, message: Message) {
		let stored = ctx.runtime.conversation.push(message);
		if let Err(e) = self.store.append(&ctx.session.id, stored).await {
			warn!(session_id = %ctx.session.id, error = %e, "failed to persist message");
		}
	}
}

fn failed_update(tool_call_id: &str, text: &str) -> ToolCallUpdate {
	ToolCallUpdate {
		tool_call_id: tool_call_id.to_string(),
		status: Some(ToolCallStatus::Failed),
		content: Some(vec![text_content(text)]),
		raw_output: None,
	}
}
