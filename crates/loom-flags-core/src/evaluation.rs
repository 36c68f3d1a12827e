// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation results and their source labels.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::flag::FlagValue;
use crate::warning::ConfigurationWarning;

/// Where an evaluated value came from.
///
/// The label strings are shared with every SDK and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationSource {
	/// A matching strategy selected a variant with a payload.
	StrategyVariant,
	EnvDefaultEnabled,
	FlagDefaultEnabled,
	EnvDefaultDisabled,
	FlagDefaultDisabled,
	/// Nothing in the definitions resolved; the caller's default applies.
	CallerDefault,
	Missing,
	TypeMismatch,
}

impl EvaluationSource {
	pub const ALL: [EvaluationSource; 8] = [
		EvaluationSource::StrategyVariant,
		EvaluationSource::EnvDefaultEnabled,
		EvaluationSource::FlagDefaultEnabled,
		EvaluationSource::EnvDefaultDisabled,
		EvaluationSource::FlagDefaultDisabled,
		EvaluationSource::CallerDefault,
		EvaluationSource::Missing,
		EvaluationSource::TypeMismatch,
	];

	pub fn as_str(&self) -> &'static str {
		match self {
			EvaluationSource::StrategyVariant => "strategy-variant",
			EvaluationSource::EnvDefaultEnabled => "env-default-enabled",
			EvaluationSource::FlagDefaultEnabled => "flag-default-enabled",
			EvaluationSource::EnvDefaultDisabled => "env-default-disabled",
			EvaluationSource::FlagDefaultDisabled => "flag-default-disabled",
			EvaluationSource::CallerDefault => "caller-default",
			EvaluationSource::Missing => "missing",
			EvaluationSource::TypeMismatch => "type-mismatch",
		}
	}
}

impl fmt::Display for EvaluationSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Outcome of evaluating one flag for one context.
///
/// `value` is `None` when the caller's default applies (`missing`,
/// `type-mismatch`, `caller-default`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
	pub flag_key: String,
	pub enabled: bool,
	pub value: Option<FlagValue>,
	pub variant: Option<String>,
	pub source: EvaluationSource,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub warnings: Vec<ConfigurationWarning>,
}

impl EvaluationResult {
	pub fn new(
		flag_key: impl Into<String>,
		enabled: bool,
		value: Option<FlagValue>,
		source: EvaluationSource,
	) -> Self {
		Self {
			flag_key: flag_key.into(),
			enabled,
			value,
			variant: None,
			source,
			warnings: Vec::new(),
		}
	}

	pub fn missing(flag_key: impl Into<String>) -> Self {
		Self::new(flag_key, false, None, EvaluationSource::Missing)
	}

	pub fn type_mismatch(flag_key: impl Into<String>) -> Self {
		Self::new(flag_key, false, None, EvaluationSource::TypeMismatch)
	}

	pub fn with_variant(mut self, variant: Option<String>) -> Self {
		self.variant = variant;
		self
	}

	pub fn with_warnings(mut self, warnings: Vec<ConfigurationWarning>) -> Self {
		self.warnings = warnings;
		self
	}
}
