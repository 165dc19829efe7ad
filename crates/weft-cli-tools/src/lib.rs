// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! In-process tool registry for the weft agent.
//!
//! Concrete tools live with the embedding binary; this crate only provides
//! the [`Tool`] trait and a [`ToolRegistry`] that serves them to the agentic
//! loop through [`weft_common_core::ToolExecutor`].

pub mod registry;

pub use registry::{Tool, ToolRegistry};
