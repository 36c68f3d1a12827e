// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::context::{ContextValue, EvaluationContext, FIELD_SESSION_ID, FIELD_USER_ID};

/// Context attribute used as the hashing key for rollout and variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Stickiness {
	/// userId, then sessionId, then the context's anonymous key.
	#[default]
	Default,
	UserId,
	SessionId,
	Field(String),
}

impl From<String> for Stickiness {
	fn from(value: String) -> Self {
		match value.as_str() {
			"" | "default" => Stickiness::Default,
			FIELD_USER_ID => Stickiness::UserId,
			FIELD_SESSION_ID => Stickiness::SessionId,
			_ => Stickiness::Field(value),
		}
	}
}

impl From<Stickiness> for String {
	fn from(value: Stickiness) -> Self {
		match value {
			Stickiness::Default => "default".to_string(),
			Stickiness::UserId => FIELD_USER_ID.to_string(),
			Stickiness::SessionId => FIELD_SESSION_ID.to_string(),
			Stickiness::Field(field) => field,
		}
	}
}

impl Stickiness {
	/// Name used in warnings and logs.
	pub fn field_name(&self) -> String {
		String::from(self.clone())
	}

	/// Looks up the stickiness value in the context.
	///
	/// `None` means the configured field is absent; callers fall back to
	/// [`EvaluationContext::anonymous_key`].
	pub fn value_from(&self, context: &EvaluationContext) -> Option<String> {
		let non_empty = |s: &String| !s.is_empty();
		match self {
			Stickiness::Default => context
				.user_id
				.clone()
				.filter(non_empty)
				.or_else(|| context.session_id.clone().filter(non_empty)),
			Stickiness::UserId => context.user_id.clone().filter(non_empty),
			Stickiness::SessionId => context.session_id.clone().filter(non_empty),
			Stickiness::Field(field) => context
				.get(field)
				.map(|v| ContextValue::to_canonical_string(&v))
				.filter(non_empty),
		}
	}
}

/// Targeting rule: constraints, segments and a percentage gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Strategy {
	#[serde(default)]
	pub id: String,
	#[serde(default)]
	pub constraints: Vec<Constraint>,
	#[serde(default)]
	pub segment_ids: Vec<String>,
	/// Stored as given; values outside 0..=100 are clamped at evaluation.
	#[serde(default = "default_rollout")]
	pub rollout_percentage: i64,
	#[serde(default)]
	pub stickiness: Stickiness,
}

fn default_rollout() -> i64 {
	100
}

impl Strategy {
	/// Matches everyone with a 100% rollout.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			constraints: Vec::new(),
			segment_ids: Vec::new(),
			rollout_percentage: 100,
			stickiness: Stickiness::Default,
		}
	}

	pub fn with_constraint(mut self, constraint: Constraint) -> Self {
		self.constraints.push(constraint);
		self
	}

	pub fn with_segment(mut self, segment_id: impl Into<String>) -> Self {
		self.segment_ids.push(segment_id.into());
		self
	}

	pub fn with_rollout(mut self, percentage: i64) -> Self {
		self.rollout_percentage = percentage;
		self
	}

	pub fn with_stickiness(mut self, stickiness: Stickiness) -> Self {
		self.stickiness = stickiness;
		self
	}

	pub fn effective_rollout(&self) -> u32 {
		self.rollout_percentage.clamp(0, 100) as u32
	}
}
