// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::context::EvaluationContext;
use crate::context_field::ContextFieldRegistry;

/// Named, reusable set of constraints combined with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
	pub id: String,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
	#[serde(default)]
	pub constraints: Vec<Constraint>,
}

impl Segment {
	pub fn new(id: impl Into<String>, constraints: Vec<Constraint>) -> Self {
		Self {
			id: id.into(),
			name: None,
			description: None,
			constraints,
		}
	}

	/// A segment without constraints matches every context.
	pub fn is_empty(&self) -> bool {
		self.constraints.is_empty()
	}

	pub fn matches(&self, context: &EvaluationContext, registry: &ContextFieldRegistry) -> bool {
		self
			.constraints
			.iter()
			.all(|c| c.matches(context, registry))
	}
}
