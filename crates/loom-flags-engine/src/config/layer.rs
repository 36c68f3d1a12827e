// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use super::sections::{LoggingConfigLayer, MetricsConfigLayer, RefreshConfigLayer};

/// Partial engine configuration produced by one source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EngineConfigLayer {
	#[serde(default)]
	pub refresh: Option<RefreshConfigLayer>,
	#[serde(default)]
	pub metrics: Option<MetricsConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl EngineConfigLayer {
	/// Overlays `other` onto `self`; set fields in `other` win.
	pub fn merge(&mut self, other: Self) {
		merge_section(&mut self.refresh, other.refresh, RefreshConfigLayer::merge);
		merge_section(&mut self.metrics, other.metrics, MetricsConfigLayer::merge);
		merge_section(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_section<T: Default>(base: &mut Option<T>, other: Option<T>, merge: fn(&mut T, T)) {
	if let Some(other) = other {
		merge(base.get_or_insert_with(T::default), other);
	}
}
