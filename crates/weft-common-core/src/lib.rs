// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

pub mod config;
pub mod context;
pub mod conversation;
pub mod error;
pub mod message;
pub mod model;
pub mod skill;
pub mod tokens;
pub mod tool;

pub use config::*;
pub use context::*;
pub use conversation::*;
pub use error::*;
pub use message::*;
pub use model::*;
pub use skill::*;
pub use tokens::*;
pub use tool::*;
