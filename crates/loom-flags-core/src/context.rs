// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Caller-supplied evaluation context.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Built-in field carrying [`EvaluationContext::user_id`].
pub const FIELD_USER_ID: &str = "userId";
/// Built-in field carrying [`EvaluationContext::session_id`].
pub const FIELD_SESSION_ID: &str = "sessionId";
/// Built-in field carrying [`EvaluationContext::environment`].
pub const FIELD_ENVIRONMENT: &str = "environment";
/// Built-in field carrying the evaluation time.
pub const FIELD_CURRENT_TIME: &str = "currentTime";

/// A raw context value as supplied by the caller.
///
/// Raw values are untyped; the context field registry decides how they are
/// interpreted for a given field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ContextValue {
	Boolean(bool),
	Number(f64),
	String(String),
	Array(Vec<String>),
}

impl ContextValue {
	/// Canonical string form, used for hashing and string comparisons.
	///
	/// Arrays are joined with `,`.
	pub fn to_canonical_string(&self) -> String {
		match self {
			ContextValue::Boolean(b) => b.to_string(),
			ContextValue::Number(n) => n.to_string(),
			ContextValue::String(s) => s.clone(),
			ContextValue::Array(items) => items.join(","),
		}
	}
}

impl From<&str> for ContextValue {
	fn from(value: &str) -> Self {
		ContextValue::String(value.to_string())
	}
}

impl From<String> for ContextValue {
	fn from(value: String) -> Self {
		ContextValue::String(value)
	}
}

impl From<bool> for ContextValue {
	fn from(value: bool) -> Self {
		ContextValue::Boolean(value)
	}
}

impl From<f64> for ContextValue {
	fn from(value: f64) -> Self {
		ContextValue::Number(value)
	}
}

impl From<i64> for ContextValue {
	fn from(value: i64) -> Self {
		ContextValue::Number(value as f64)
	}
}

impl From<Vec<String>> for ContextValue {
	fn from(value: Vec<String>) -> Self {
		ContextValue::Array(value)
	}
}

/// Context for a single evaluation call. The engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationContext {
	/// e.g., "dev", "staging", "prod"
	pub environment: String,
	#[serde(default)]
	pub user_id: Option<String>,
	#[serde(default)]
	pub session_id: Option<String>,
	/// Time used by date constraints on `currentTime`. Wall clock when unset.
	#[serde(default)]
	pub current_time: Option<DateTime<Utc>>,
	#[serde(default)]
	pub attributes: HashMap<String, ContextValue>,
	/// Stickiness fallback when the configured stickiness field is absent.
	/// Minted once per context so repeated evaluations stay consistent.
	#[serde(default = "anonymous_key")]
	pub anonymous_key: String,
}

fn anonymous_key() -> String {
	Uuid::new_v4().to_string()
}

impl EvaluationContext {
	pub fn new(environment: impl Into<String>) -> Self {
		Self {
			environment: environment.into(),
			user_id: None,
			session_id: None,
			current_time: None,
			attributes: HashMap::new(),
			anonymous_key: anonymous_key(),
		}
	}

	pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
		self.user_id = Some(user_id.into());
		self
	}

	pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
		self.session_id = Some(session_id.into());
		self
	}

	pub fn with_current_time(mut self, time: DateTime<Utc>) -> Self {
		self.current_time = Some(time);
		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<ContextValue>) -> Self {
		self.attributes.insert(key.into(), value.into());
		self
	}

	/// Pins the stickiness fallback, e.g. to an SDK-managed session identifier.
	pub fn with_anonymous_key(mut self, key: impl Into<String>) -> Self {
		self.anonymous_key = key.into();
		self
	}

	/// Looks up a field, resolving built-in fields before attributes.
	pub fn get(&self, field_key: &str) -> Option<ContextValue> {
		match field_key {
			FIELD_USER_ID => self.user_id.clone().map(ContextValue::String),
			FIELD_SESSION_ID => self.session_id.clone().map(ContextValue::String),
			FIELD_ENVIRONMENT => Some(ContextValue::String(self.environment.clone())),
			FIELD_CURRENT_TIME => {
				let now = self.current_time.unwrap_or_else(Utc::now);
				Some(ContextValue::String(
					now.to_rfc3339_opts(SecondsFormat::Millis, true),
				))
			}
			_ => self.attributes.get(field_key).cloned(),
		}
	}
}
