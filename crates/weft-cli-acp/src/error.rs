// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for ACP integration.

use thiserror::Error;
use weft_common_core::ModelError;

use crate::protocol::{error_codes, RpcError};

/// Errors that can occur during ACP operations.
#[derive(Debug, Error)]
pub enum AcpError {
	#[error("session not found: {0}")]
	SessionNotFound(String),

	#[error("invalid params: {0}")]
	InvalidParams(String),

	#[error("empty prompt")]
	EmptyPrompt,

	#[error("method not found: {0}")]
	MethodNotFound(String),

	#[error("model error: {0}")]
	Model(#[from] ModelError),

	#[error("transport error: {0}")]
	Transport(String),

	#[error("notification channel closed")]
	NotificationChannelClosed,

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("internal error: {0}")]
	Internal(String),
}

impl AcpError {
	/// JSON-RPC error code reported to the client.
	pub fn code(&self) -> i64 {
		match self {
			AcpError::SessionNotFound(_) => error_codes::SESSION_NOT_FOUND,
			AcpError::InvalidParams(_) | AcpError::EmptyPrompt => error_codes::INVALID_PARAMS,
			AcpError::MethodNotFound(_) => error_codes::METHOD_NOT_FOUND,
			AcpError::Model(_)
			| AcpError::Transport(_)
			| AcpError::NotificationChannelClosed
			| AcpError::Serialization(_)
			| AcpError::Internal(_) => error_codes::INTERNAL_ERROR,
		}
	}
}

impl From<std::io::Error> for AcpError {
	fn from(err: std::io::Error) -> Self {
		AcpError::Transport(err.to_string())
	}
}

impl From<AcpError> for RpcError {
	fn from(err: AcpError) -> Self {
		RpcError::new(err.code(), err.to_string())
	}
}
