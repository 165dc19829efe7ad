// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Agent Client Protocol (ACP) session engine for weft.
//!
//! Editors (Zed and similar) talk to weft over newline-delimited JSON-RPC on
//! stdio. This crate owns the wire format, the session registry and the
//! agentic tool loop that answers each prompt.
//!
//! # Architecture
//!
//! ```text
//! Editor (Client)  <--->  serve_connection  <--->  AcpAgent  <--->  Model/Tools/Store
//!      stdio           frames + dispatch         sessions        collaborator traits
//! ```
//!
//! The [`AcpAgent`]:
//! - Creates sessions and tracks their modes
//! - Runs one prompt per session at a time, cancellable from the client
//! - Streams progress, tool calls and answers as `session/update` notifications
//! - Keeps each request within the model's context window

pub mod agent;
pub mod bridge;
pub mod budget;
pub mod error;
pub mod modes;
pub mod prompt_loop;
pub mod protocol;
pub mod server;
pub mod session;
pub mod transport;

pub use agent::{AcpAgent, AgentCollaborators};
pub use error::AcpError;
pub use modes::{ModeCatalog, NoModes, StaticModes};
pub use prompt_loop::{PromptLoop, TurnOutcome};
pub use server::{run_stdio, serve_connection, serve_stdio};
pub use session::{ActivePromptTracker, Session, SessionNotificationRequest, SessionStore};
