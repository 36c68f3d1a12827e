// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Logging configuration section.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfigLayer {
	pub level: Option<String>,
	pub json: Option<bool>,
}

impl LoggingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.level.is_some() {
			self.level = other.level;
		}
		if other.json.is_some() {
			self.json = other.json;
		}
	}

	pub fn finalize(self) -> LoggingConfig {
		LoggingConfig {
			level: self.level.unwrap_or_else(|| "info".to_string()),
			json: self.json.unwrap_or(false),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
	/// Filter directive used when `RUST_LOG` is unset.
	pub level: String,
	pub json: bool,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		LoggingConfigLayer::default().finalize()
	}
}
