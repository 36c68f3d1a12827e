// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Constraints and their operators.
//!
//! A constraint compares one context field against a list of values. Every
//! operator is "any of": the constraint holds when at least one configured
//! value satisfies it. `inverted` negates the operator result as the last
//! step.
//!
//! Failure policy:
//! - a constraint on a disabled field never matches, inverted or not;
//! - an empty value list makes `IN` fail closed (and therefore an inverted
//!   `IN` match everything) while `NOT_IN` matches everything;
//! - for numeric, semver and date operators a missing or unparseable context
//!   value never matches, inverted or not.

use serde::{Deserialize, Serialize};

use crate::context::EvaluationContext;
use crate::context_field::{parse_date, parse_number, parse_semver, ContextFieldRegistry, TypedValue};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
	In,
	NotIn,
	StrContains,
	StrStartsWith,
	StrEndsWith,
	NumEq,
	NumGt,
	NumGte,
	NumLt,
	NumLte,
	SemverEq,
	SemverGt,
	SemverLt,
	DateAfter,
	DateBefore,
}

/// Operand domain of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorFamily {
	Set,
	String,
	Number,
	Semver,
	Date,
}

impl Operator {
	pub fn family(self) -> OperatorFamily {
		match self {
			Operator::In | Operator::NotIn => OperatorFamily::Set,
			Operator::StrContains | Operator::StrStartsWith | Operator::StrEndsWith => {
				OperatorFamily::String
			}
			Operator::NumEq | Operator::NumGt | Operator::NumGte | Operator::NumLt | Operator::NumLte => {
				OperatorFamily::Number
			}
			Operator::SemverEq | Operator::SemverGt | Operator::SemverLt => OperatorFamily::Semver,
			Operator::DateAfter | Operator::DateBefore => OperatorFamily::Date,
		}
	}

	/// Operators that hold for every context when given no values.
	pub fn matches_all_when_empty(self) -> bool {
		matches!(self, Operator::NotIn)
	}

	/// Operators that need the context value to parse as a specific type.
	pub fn is_typed(self) -> bool {
		matches!(
			self.family(),
			OperatorFamily::Number | OperatorFamily::Semver | OperatorFamily::Date
		)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
	pub field_key: String,
	pub operator: Operator,
	#[serde(default)]
	pub values: Vec<String>,
	#[serde(default)]
	pub inverted: bool,
	/// Applies to `IN`, `NOT_IN` and the string operators.
	#[serde(default)]
	pub case_insensitive: bool,
}

impl Constraint {
	pub fn new<I, S>(field_key: impl Into<String>, operator: Operator, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			field_key: field_key.into(),
			operator,
			values: values.into_iter().map(Into::into).collect(),
			inverted: false,
			case_insensitive: false,
		}
	}

	pub fn inverted(mut self) -> Self {
		self.inverted = !self.inverted;
		self
	}

	pub fn case_insensitive(mut self) -> Self {
		self.case_insensitive = true;
		self
	}

	/// An inverted `IN` with no values matches every context.
	pub fn is_inverted_empty_in(&self) -> bool {
		self.operator == Operator::In && self.inverted && self.values.is_empty()
	}

	/// Evaluates the constraint. Never panics and never errors.
	pub fn matches(&self, context: &EvaluationContext, registry: &ContextFieldRegistry) -> bool {
		if !registry.is_enabled(&self.field_key) {
			return false;
		}

		if self.values.is_empty() {
			return self.operator.matches_all_when_empty() != self.inverted;
		}

		let Some(raw) = context.get(&self.field_key) else {
			if self.operator.is_typed() {
				return false;
			}
			return (self.operator == Operator::NotIn) != self.inverted;
		};

		let Ok(value) = registry.resolve(&self.field_key, &raw) else {
			return false;
		};

		match self.evaluate(&value) {
			Some(result) => result != self.inverted,
			None => false,
		}
	}

	/// Applies the operator before inversion. `None` means the context value
	/// could not be read in the operator's domain.
	fn evaluate(&self, value: &TypedValue) -> Option<bool> {
		match self.operator.family() {
			OperatorFamily::Set => {
				let found = self.any_string(value, |actual, expected| actual == expected);
				Some(if self.operator == Operator::In { found } else { !found })
			}
			OperatorFamily::String => Some(self.any_string(value, |actual, expected| {
				match self.operator {
					Operator::StrContains => actual.contains(expected),
					Operator::StrStartsWith => actual.starts_with(expected),
					_ => actual.ends_with(expected),
				}
			})),
			OperatorFamily::Number => {
				let actual = value.as_number()?;
				let mut expected = self.values.iter().filter_map(|v| parse_number(v)).peekable();
				expected.peek()?;
				Some(expected.any(|e| match self.operator {
					Operator::NumEq => actual == e,
					Operator::NumGt => actual > e,
					Operator::NumGte => actual >= e,
					Operator::NumLt => actual < e,
					_ => actual <= e,
				}))
			}
			OperatorFamily::Semver => {
				let actual = value.as_semver()?;
				let mut expected = self.values.iter().filter_map(|v| parse_semver(v)).peekable();
				expected.peek()?;
				Some(expected.any(|e| match self.operator {
					Operator::SemverEq => actual == e,
					Operator::SemverGt => actual > e,
					_ => actual < e,
				}))
			}
			OperatorFamily::Date => {
				let actual = value.as_date()?;
				let mut expected = self.values.iter().filter_map(|v| parse_date(v)).peekable();
				expected.peek()?;
				Some(expected.any(|e| match self.operator {
					Operator::DateAfter => actual > e,
					_ => actual < e,
				}))
			}
		}
	}

	fn any_string(&self, value: &TypedValue, op: impl Fn(&str, &str) -> bool) -> bool {
		let fold = |s: &str| {
			if self.case_insensitive {
				s.to_lowercase()
			} else {
				s.to_string()
			}
		};

		let expected: Vec<String> = self.values.iter().map(|v| fold(v)).collect();
		value.as_strings().iter().any(|actual| {
			let actual = fold(actual);
			expected.iter().any(|e| op(&actual, e))
		})
	}
}
