// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation metrics configuration section.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MetricsConfigLayer {
	pub enabled: Option<bool>,
	pub channel_capacity: Option<usize>,
	pub flush_interval_secs: Option<u64>,
	pub bucket_width_secs: Option<u64>,
}

impl MetricsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.enabled.is_some() {
			self.enabled = other.enabled;
		}
		if other.channel_capacity.is_some() {
			self.channel_capacity = other.channel_capacity;
		}
		if other.flush_interval_secs.is_some() {
			self.flush_interval_secs = other.flush_interval_secs;
		}
		if other.bucket_width_secs.is_some() {
			self.bucket_width_secs = other.bucket_width_secs;
		}
	}

	pub fn finalize(self) -> MetricsConfig {
		MetricsConfig {
			enabled: self.enabled.unwrap_or(true),
			channel_capacity: self.channel_capacity.unwrap_or(10_000),
			flush_interval: Duration::from_secs(self.flush_interval_secs.unwrap_or(60)),
			bucket_width: Duration::from_secs(self.bucket_width_secs.unwrap_or(60)),
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsConfig {
	pub enabled: bool,
	/// Events buffered before the recorder starts dropping.
	pub channel_capacity: usize,
	pub flush_interval: Duration,
	pub bucket_width: Duration,
}

impl Default for MetricsConfig {
	fn default() -> Self {
		MetricsConfigLayer::default().finalize()
	}
}
