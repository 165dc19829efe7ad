// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serving loop: reads frames, dispatches them to the agent, and forwards
//! session notifications back to the client.

use std::sync::Arc;

use anyhow::Context;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use weft_cli_config::{init_tracing, load_config_with_cli, CliOverrides};
use weft_common_core::AgentConfig;

use crate::agent::{AcpAgent, AgentCollaborators};
use crate::error::AcpError;
use crate::protocol::{methods, EnvelopeError, Incoming, RpcError};
use crate::session::SessionNotificationRequest;
use crate::transport::{FrameReader, FrameWriter, InboundFrame};

/// Serve one client connection until its inbound stream ends.
///
/// Requests run on their own tasks so a long prompt never blocks
/// `session/cancel`. A failed write anywhere ends the loop with that error.
pub async fn serve_connection<R, W>(
	collaborators: AgentCollaborators,
	config: AgentConfig,
	reader: R,
	writer: W,
) -> Result<(), AcpError>
where
	R: AsyncRead + Unpin,
	W: AsyncWrite + Send + Unpin + 'static,
{
	let (session_update_tx, mut session_update_rx) =
		mpsc::unbounded_channel::<SessionNotificationRequest>();
	let (fatal_tx, mut fatal_rx) = mpsc::unbounded_channel::<AcpError>();

	let agent = Arc::new(AcpAgent::new(
		collaborators,
		config,
		session_update_tx,
		CancellationToken::new(),
	));
	let writer = FrameWriter::new(writer);

	// Background task: forward session notifications to client
	let forwarder = {
		let writer = writer.clone();
		let fatal_tx = fatal_tx.clone();
		tokio::spawn(async move {
			while let Some(req) = session_update_rx.recv().await {
				if let Err(e) = writer
					.send_notification(methods::SESSION_UPDATE, &req.notification)
					.await
				{
					error!(error = %e, "failed to send session notification");
					let _ = fatal_tx.send(e);
					break;
				}
				req.completion_tx.send(()).ok();
			}
		})
	};

	let mut frames = FrameReader::new(reader);
	let mut tasks = JoinSet::new();

	let result = loop {
		while tasks.try_join_next().is_some() {}

		let frame = tokio::select! {
			Some(err) = fatal_rx.recv() => break Err(err),
			frame = frames.read_message() => frame,
		};
		let frame = match frame {
			Ok(Some(InboundFrame::Message(frame))) => frame,
			Ok(Some(InboundFrame::Malformed(reason))) => {
				if let Err(e) = writer
					.send_error(&Value::Null, RpcError::parse_error(reason))
					.await
				{
					break Err(e);
				}
				continue;
			}
			Ok(None) => {
				info!("inbound stream closed");
				break Ok(());
			}
			Err(e) => {
				error!(error = %e, "ACP read error");
				break Err(e);
			}
		};

		let sent = match Incoming::parse(&frame) {
			Err(EnvelopeError::Parse(detail)) => {
				warn!(error = %detail, "malformed frame");
				writer
					.send_error(&Value::Null, RpcError::parse_error(detail))
					.await
			}
			Err(EnvelopeError::InvalidRequest { id, reason }) => {
				warn!(id = %id, reason = %reason, "invalid request");
				writer.send_error(&id, RpcError::invalid_request(reason)).await
			}
			Err(EnvelopeError::InvalidNotification { method, reason }) => {
				warn!(method = %method, reason = %reason, "invalid notification dropped");
				Ok(())
			}
			Ok(Incoming::Notification { method, params }) => {
				agent.handle_notification(&method, params);
				Ok(())
			}
			Ok(Incoming::Response { id, error, .. }) => {
				debug!(id = %id, error = ?error, "ignoring client response");
				Ok(())
			}
			Ok(Incoming::Request { id, method, params }) => {
				let agent = Arc::clone(&agent);
				let writer = writer.clone();
				let fatal_tx = fatal_tx.clone();
				tasks.spawn(async move {
					let sent = match agent.handle_request(&method, params).await {
						Ok(result) => writer.send_response(&id, result).await,
						Err(e) => {
							warn!(method = %method, id = %id, error = %e, "request failed");
							writer.send_error(&id, e.into()).await
						}
					};
					if let Err(e) = sent {
						error!(method = %method, error = %e, "failed to write response");
						let _ = fatal_tx.send(e);
					}
				});
				Ok(())
			}
		};

		if let Err(e) = sent {
			break Err(e);
		}
	};

	agent.cancel_all_and_shutdown();
	while tasks.join_next().await.is_some() {}

	// The forwarder exits once the agent's notification sender is gone.
	drop(agent);
	if let Err(e) = forwarder.await {
		warn!(error = %e, "notification forwarder panicked");
	}

	result
}

/// Serve the process's stdin/stdout.
pub async fn serve_stdio(
	collaborators: AgentCollaborators,
	config: AgentConfig,
) -> Result<(), AcpError> {
	serve_connection(collaborators, config, tokio::io::stdin(), tokio::io::stdout()).await
}

/// Load configuration, initialise logging on stderr, and serve stdio.
pub async fn run_stdio(collaborators: AgentCollaborators, cli: CliOverrides) -> anyhow::Result<()> {
	let config = load_config_with_cli(cli).context("failed to load configuration")?;
	init_tracing(&config.logging).context("failed to initialise logging")?;

	info!(
			model = %config.agent.default_model,
			workspace = ?config.agent.workspace_root,
			"starting ACP agent mode"
	);

	serve_stdio(collaborators, config.agent)
		.await
		.context("ACP connection failed")
}
