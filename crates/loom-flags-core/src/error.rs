// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for snapshot loading.
//!
//! Nothing in here is ever produced on the evaluation path. A snapshot that
//! fails with one of these errors never becomes the active snapshot.

use thiserror::Error;

/// Result type for flag definition operations.
pub type Result<T> = std::result::Result<T, FlagsError>;

/// Errors that reject a snapshot document before activation.
#[derive(Debug, Error)]
pub enum FlagsError {
	#[error("snapshot is not valid JSON: {0}")]
	Parse(#[from] serde_json::Error),

	#[error("unsupported hash version: {0}")]
	UnsupportedHashVersion(String),

	#[error("invalid flag key: {0}")]
	InvalidFlagKey(String),

	#[error("duplicate flag key: {0}")]
	DuplicateFlag(String),

	#[error("duplicate segment id: {0}")]
	DuplicateSegment(String),

	#[error("duplicate context field: {0}")]
	DuplicateContextField(String),

	#[error("duplicate variant id '{variant_id}' in {flag_key}/{environment}")]
	DuplicateVariant {
		flag_key: String,
		environment: String,
		variant_id: String,
	},

	#[error("invalid payload for {flag_key}/{environment} variant '{variant_id}': {reason}")]
	InvalidPayload {
		flag_key: String,
		environment: String,
		variant_id: String,
		reason: String,
	},

	#[error("invalid {which} value for flag {flag_key}: {reason}")]
	InvalidBaseline {
		flag_key: String,
		which: &'static str,
		reason: String,
	},
}
