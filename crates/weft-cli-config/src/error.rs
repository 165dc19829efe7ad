// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;

/// Errors raised while loading weft's configuration or setting up logging.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("cannot read config: {0}")]
	Io(#[from] std::io::Error),

	#[error("malformed config file {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	/// A setting parsed but is out of range or unrecognised.
	#[error("invalid value for {field}: {message}")]
	InvalidValue { field: String, message: String },

	#[error("could not determine home directory")]
	HomeDirNotFound,

	#[error("logging setup failed: {0}")]
	Logging(String),
}

impl ConfigError {
	pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
		Self::InvalidValue {
			field: field.into(),
			message: message.into(),
		}
	}
}
