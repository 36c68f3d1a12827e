// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use loom_flags_core::{Constraint, ConfigurationWarning, EvaluationContext, FlagSnapshot};
use tracing::debug;

/// Resolves segment references against one snapshot.
pub struct SegmentResolver<'a> {
	snapshot: &'a FlagSnapshot,
}

impl<'a> SegmentResolver<'a> {
	pub fn new(snapshot: &'a FlagSnapshot) -> Self {
		Self { snapshot }
	}

	/// The constraints a segment stands for, or `None` if it is not defined.
	pub fn expand(&self, segment_id: &str) -> Option<&'a [Constraint]> {
		self.snapshot
			.segment(segment_id)
			.map(|segment| segment.constraints.as_slice())
	}

	/// Missing segments fail closed; empty segments match everyone.
	pub fn matches(
		&self,
		segment_id: &str,
		context: &EvaluationContext,
		warnings: &mut Vec<ConfigurationWarning>,
	) -> bool {
		let Some(constraints) = self.expand(segment_id) else {
			debug!(segment_id, "strategy references unknown segment");
			warnings.push(ConfigurationWarning::MissingSegment {
				segment_id: segment_id.to_string(),
			});
			return false;
		};

		let registry = self.snapshot.registry();
		constraints.iter().all(|constraint| {
			note_constraint(constraint, self.snapshot, warnings);
			constraint.matches(context, registry)
		})
	}
}

/// Records warnings for a constraint that is about to be evaluated.
pub(crate) fn note_constraint(
	constraint: &Constraint,
	snapshot: &FlagSnapshot,
	warnings: &mut Vec<ConfigurationWarning>,
) {
	if constraint.is_inverted_empty_in() {
		warnings.push(ConfigurationWarning::InvertedEmptyIn {
			field_key: constraint.field_key.clone(),
		});
	}
	if !snapshot.registry().is_enabled(&constraint.field_key) {
		warnings.push(ConfigurationWarning::DisabledField {
			field_key: constraint.field_key.clone(),
		});
	}
}
