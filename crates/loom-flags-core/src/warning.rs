// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Non-fatal configuration problems.
//!
//! Warnings are reported by snapshot lint and attached to evaluation results.
//! Evaluation always continues with the documented fallback.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfigurationWarning {
	#[error("segment '{segment_id}' has no constraints and matches every context")]
	EmptySegment { segment_id: String },

	#[error("strategy references unknown segment '{segment_id}' and will never match")]
	MissingSegment { segment_id: String },

	#[error("inverted IN constraint on '{field_key}' has no values and matches every context")]
	InvertedEmptyIn { field_key: String },

	#[error("constraint on disabled field '{field_key}' never matches")]
	DisabledField { field_key: String },

	#[error("stickiness field '{field}' missing from context, using anonymous key")]
	MissingStickiness { field: String },

	#[error("all variants of {flag_key}/{environment} have zero weight, no variant can be selected")]
	AllZeroWeights { flag_key: String, environment: String },

	#[error("locked weights of {flag_key}/{environment} sum to {total}, scaled down to 1000")]
	LockedWeightsOverflow {
		flag_key: String,
		environment: String,
		total: u64,
	},

	#[error("variant '{variant_id}' of {flag_key}/{environment} has negative weight {weight}, clamped to 0")]
	NegativeWeight {
		flag_key: String,
		environment: String,
		variant_id: String,
		weight: i64,
	},

	#[error("rollout percentage {percentage} on {flag_key}/{environment} clamped to 0..=100")]
	RolloutOutOfRange {
		flag_key: String,
		environment: String,
		percentage: i64,
	},
}
