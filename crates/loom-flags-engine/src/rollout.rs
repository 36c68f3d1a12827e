// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Percentage rollout gate.
//!
//! A stickiness value is admitted when its rollout bucket is below
//! `percentage * 100`. Raising the percentage only ever adds buckets, so a
//! stickiness value admitted at P stays admitted at every P' > P.

use loom_flags_core::{ConfigurationWarning, EvaluationContext, HashVersion, Stickiness, Strategy};

use crate::hashing::rollout_bucket;

/// Stickiness value resolved from a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StickinessKey {
	pub value: String,
	/// Set when the configured field was absent and the anonymous key was used.
	pub fallback: bool,
}

impl StickinessKey {
	/// Warning to surface when the anonymous fallback was used.
	pub fn warning(&self, stickiness: &Stickiness) -> Option<ConfigurationWarning> {
		self.fallback.then(|| ConfigurationWarning::MissingStickiness {
			field: stickiness.field_name(),
		})
	}
}

pub fn resolve_stickiness(stickiness: &Stickiness, context: &EvaluationContext) -> StickinessKey {
	match stickiness.value_from(context) {
		Some(value) => StickinessKey {
			value,
			fallback: false,
		},
		None => StickinessKey {
			value: context.anonymous_key.clone(),
			fallback: true,
		},
	}
}

/// Raw gate on an already-resolved stickiness value.
pub fn is_in_rollout(version: HashVersion, stickiness: &str, flag_key: &str, percentage: u32) -> bool {
	rollout_bucket(version, stickiness, flag_key) < percentage.min(100) * 100
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutDecision {
	pub passed: bool,
	/// Only resolved when the gate actually hashed.
	pub stickiness: Option<StickinessKey>,
}

/// Applies a strategy's percentage gate to a context.
///
/// 0% and 100% are decided without hashing, so they never need a stickiness
/// value.
pub fn passes_rollout(
	version: HashVersion,
	strategy: &Strategy,
	flag_key: &str,
	context: &EvaluationContext,
) -> RolloutDecision {
	let percentage = strategy.effective_rollout();
	match percentage {
		0 => RolloutDecision {
			passed: false,
			stickiness: None,
		},
		100 => RolloutDecision {
			passed: true,
			stickiness: None,
		},
		_ => {
			let key = resolve_stickiness(&strategy.stickiness, context);
			let passed = is_in_rollout(version, &key.value, flag_key, percentage);
			RolloutDecision {
				passed,
				stickiness: Some(key),
			}
		}
	}
}
