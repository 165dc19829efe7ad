// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Global tracing subscriber setup.
//!
//! Logs go to stderr: stdout carries the ACP wire protocol.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::runtime::{LogFormat, LogLevel, LoggingConfig};
use crate::ConfigError;

pub fn log_level_to_tracing(level: LogLevel) -> tracing::Level {
	match level {
		LogLevel::Trace => tracing::Level::TRACE,
		LogLevel::Debug => tracing::Level::DEBUG,
		LogLevel::Info => tracing::Level::INFO,
		LogLevel::Warn => tracing::Level::WARN,
		LogLevel::Error => tracing::Level::ERROR,
	}
}

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: LogLevel) -> String {
	format!("weft={}", log_level_to_tracing(level))
}

/// Install the global subscriber. `RUST_LOG` takes precedence over the
/// configured level.
pub fn init_tracing(logging: &LoggingConfig) -> Result<(), ConfigError> {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_filter(logging.level)));

	let result = match logging.format {
		LogFormat::Json => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.try_init(),
		LogFormat::Compact => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().compact().with_writer(std::io::stderr))
			.try_init(),
		LogFormat::Pretty => tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().with_writer(std::io::stderr))
			.try_init(),
	};

	result.map_err(|e| ConfigError::Logging(e.to_string()))
}
