// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot refresh configuration section.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_INTERVAL_SECS: u64 = 30;
const DEFAULT_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RefreshConfigLayer {
	pub interval_secs: Option<u64>,
	pub timeout_ms: Option<u64>,
	pub snapshot_path: Option<PathBuf>,
}

impl RefreshConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.interval_secs.is_some() {
			self.interval_secs = other.interval_secs;
		}
		if other.timeout_ms.is_some() {
			self.timeout_ms = other.timeout_ms;
		}
		if other.snapshot_path.is_some() {
			self.snapshot_path = other.snapshot_path;
		}
	}

	pub fn finalize(self) -> RefreshConfig {
		RefreshConfig {
			interval: Duration::from_secs(self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS)),
			timeout: Duration::from_millis(self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS)),
			snapshot_path: self.snapshot_path,
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefreshConfig {
	pub interval: Duration,
	/// Upper bound on a single fetch.
	pub timeout: Duration,
	/// Snapshot file polled by the file source, if any.
	pub snapshot_path: Option<PathBuf>,
}

impl Default for RefreshConfig {
	fn default() -> Self {
		RefreshConfigLayer::default().finalize()
	}
}
