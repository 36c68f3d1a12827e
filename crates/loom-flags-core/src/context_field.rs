// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Context field registry.
//!
//! Context fields declare how raw caller-supplied values are typed. The
//! registry is built once per snapshot and is read-only afterwards.
//!
//! Unknown field keys are permissive: their values are treated as opaque
//! strings so that callers can send new attributes before the definitions
//! catch up.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::ContextValue;

/// Declared type of a context field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
	String,
	Number,
	Boolean,
	Date,
	Semver,
	Array,
}

impl fmt::Display for FieldType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			FieldType::String => "string",
			FieldType::Number => "number",
			FieldType::Boolean => "boolean",
			FieldType::Date => "date",
			FieldType::Semver => "semver",
			FieldType::Array => "array",
		};
		f.write_str(name)
	}
}

/// Definition of a context field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextField {
	pub key: String,
	#[serde(rename = "type")]
	pub field_type: FieldType,
	/// When non-empty, the only values accepted for this field.
	#[serde(default)]
	pub legal_values: Vec<String>,
	#[serde(default = "default_true")]
	pub is_enabled: bool,
}

fn default_true() -> bool {
	true
}

impl ContextField {
	pub fn new(key: impl Into<String>, field_type: FieldType) -> Self {
		Self {
			key: key.into(),
			field_type,
			legal_values: Vec::new(),
			is_enabled: true,
		}
	}

	pub fn with_legal_values<I, S>(mut self, values: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.legal_values = values.into_iter().map(Into::into).collect();
		self
	}

	pub fn disabled(mut self) -> Self {
		self.is_enabled = false;
		self
	}
}

/// A context value after registry resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
	String(String),
	Number(f64),
	Boolean(bool),
	Date(DateTime<Utc>),
	Semver(Version),
	Array(Vec<String>),
}

impl TypedValue {
	/// String forms of the value; arrays yield one entry per element.
	pub fn as_strings(&self) -> Vec<String> {
		match self {
			TypedValue::String(s) => vec![s.clone()],
			TypedValue::Number(n) => vec![n.to_string()],
			TypedValue::Boolean(b) => vec![b.to_string()],
			TypedValue::Date(d) => vec![d.to_rfc3339_opts(SecondsFormat::Millis, true)],
			TypedValue::Semver(v) => vec![v.to_string()],
			TypedValue::Array(items) => items.clone(),
		}
	}

	pub fn as_number(&self) -> Option<f64> {
		match self {
			TypedValue::Number(n) => Some(*n),
			TypedValue::String(s) => parse_number(s),
			_ => None,
		}
	}

	pub fn as_semver(&self) -> Option<Version> {
		match self {
			TypedValue::Semver(v) => Some(v.clone()),
			TypedValue::String(s) => parse_semver(s),
			_ => None,
		}
	}

	pub fn as_date(&self) -> Option<DateTime<Utc>> {
		match self {
			TypedValue::Date(d) => Some(*d),
			TypedValue::String(s) => parse_date(s),
			_ => None,
		}
	}
}

/// Failure to type a raw context value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TypeError {
	#[error("field '{key}' expects {expected}, got {actual}")]
	Mismatch {
		key: String,
		expected: FieldType,
		actual: &'static str,
	},

	#[error("field '{key}' value '{value}' does not parse as {expected}")]
	Unparseable {
		key: String,
		expected: FieldType,
		value: String,
	},

	#[error("field '{key}' value '{value}' is not one of the legal values")]
	IllegalValue { key: String, value: String },
}

/// Parses a number with locale-independent decimal semantics.
///
/// Non-finite results (`NaN`, `inf`) are rejected.
pub fn parse_number(raw: &str) -> Option<f64> {
	raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parses an ISO-8601 timestamp. Values without an offset are taken as UTC;
/// a bare date is midnight UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
	let raw = raw.trim();
	if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
		return Some(dt.with_timezone(&Utc));
	}
	if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
		return Some(naive.and_utc());
	}
	NaiveDate::parse_from_str(raw, "%Y-%m-%d")
		.ok()
		.and_then(|d| d.and_hms_opt(0, 0, 0))
		.map(|naive| naive.and_utc())
}

/// Parses `major.minor.patch` with optional pre-release and build metadata.
pub fn parse_semver(raw: &str) -> Option<Version> {
	Version::parse(raw.trim()).ok()
}

fn raw_kind(raw: &ContextValue) -> &'static str {
	match raw {
		ContextValue::Boolean(_) => "boolean",
		ContextValue::Number(_) => "number",
		ContextValue::String(_) => "string",
		ContextValue::Array(_) => "array",
	}
}

/// Read-only lookup of context field definitions.
#[derive(Debug, Clone, Default)]
pub struct ContextFieldRegistry {
	fields: HashMap<String, ContextField>,
}

impl ContextFieldRegistry {
	pub fn new(fields: impl IntoIterator<Item = ContextField>) -> Self {
		Self {
			fields: fields.into_iter().map(|f| (f.key.clone(), f)).collect(),
		}
	}

	pub fn get(&self, key: &str) -> Option<&ContextField> {
		self.fields.get(key)
	}

	pub fn len(&self) -> usize {
		self.fields.len()
	}

	pub fn is_empty(&self) -> bool {
		self.fields.is_empty()
	}

	/// Unknown fields count as enabled.
	pub fn is_enabled(&self, key: &str) -> bool {
		self.fields.get(key).map(|f| f.is_enabled).unwrap_or(true)
	}

	/// Types a raw value according to the field's declaration.
	pub fn resolve(&self, key: &str, raw: &ContextValue) -> Result<TypedValue, TypeError> {
		let Some(field) = self.fields.get(key) else {
			return Ok(match raw {
				ContextValue::Array(items) => TypedValue::Array(items.clone()),
				other => TypedValue::String(other.to_canonical_string()),
			});
		};

		let typed = type_value(field, raw)?;

		if !field.legal_values.is_empty() {
			for value in typed.as_strings() {
				if !field.legal_values.contains(&value) {
					return Err(TypeError::IllegalValue {
						key: key.to_string(),
						value,
					});
				}
			}
		}

		Ok(typed)
	}
}

fn type_value(field: &ContextField, raw: &ContextValue) -> Result<TypedValue, TypeError> {
	let mismatch = || TypeError::Mismatch {
		key: field.key.clone(),
		expected: field.field_type,
		actual: raw_kind(raw),
	};
	let unparseable = |value: &str| TypeError::Unparseable {
		key: field.key.clone(),
		expected: field.field_type,
		value: value.to_string(),
	};

	match (field.field_type, raw) {
		(FieldType::String, ContextValue::Array(_)) => Err(mismatch()),
		(FieldType::String, other) => Ok(TypedValue::String(other.to_canonical_string())),

		(FieldType::Number, ContextValue::Number(n)) if n.is_finite() => Ok(TypedValue::Number(*n)),
		(FieldType::Number, ContextValue::String(s)) => parse_number(s)
			.map(TypedValue::Number)
			.ok_or_else(|| unparseable(s)),
		(FieldType::Number, _) => Err(mismatch()),

		(FieldType::Boolean, ContextValue::Boolean(b)) => Ok(TypedValue::Boolean(*b)),
		(FieldType::Boolean, ContextValue::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
			"true" => Ok(TypedValue::Boolean(true)),
			"false" => Ok(TypedValue::Boolean(false)),
			_ => Err(unparseable(s)),
		},
		(FieldType::Boolean, _) => Err(mismatch()),

		(FieldType::Date, ContextValue::String(s)) => {
			parse_date(s).map(TypedValue::Date).ok_or_else(|| unparseable(s))
		}
		(FieldType::Date, _) => Err(mismatch()),

		(FieldType::Semver, ContextValue::String(s)) => parse_semver(s)
			.map(TypedValue::Semver)
			.ok_or_else(|| unparseable(s)),
		(FieldType::Semver, _) => Err(mismatch()),

		(FieldType::Array, ContextValue::Array(items)) => Ok(TypedValue::Array(items.clone())),
		(FieldType::Array, ContextValue::String(s)) => Ok(TypedValue::Array(vec![s.clone()])),
		(FieldType::Array, _) => Err(mismatch()),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use proptest::prelude::*;

	fn registry() -> ContextFieldRegistry {
		ContextFieldRegistry::new([
			ContextField::new("plan", FieldType::String).with_legal_values(["free", "pro"]),
			ContextField::new("seats", FieldType::Number),
			ContextField::new("beta", FieldType::Boolean),
			ContextField::new("signupDate", FieldType::Date),
			ContextField::new("appVersion", FieldType::Semver),
			ContextField::new("tags", FieldType::Array),
			ContextField::new("legacy", FieldType::String).disabled(),
		])
	}

	#[test]
	fn unknown_fields_are_opaque_strings() {
		let reg = registry();
		assert_eq!(
			reg.resolve("region", &ContextValue::Number(3.0)),
			Ok(TypedValue::String("3".to_string()))
		);
		assert!(reg.is_enabled("region"));
	}

	#[test]
	fn numbers_parse_from_strings() {
		let reg = registry();
		assert_eq!(
			reg.resolve("seats", &ContextValue::from(" 12.5 ")),
			Ok(TypedValue::Number(12.5))
		);
		assert!(matches!(
			reg.resolve("seats", &ContextValue::from("12,5")),
			Err(TypeError::Unparseable { .. })
		));
		assert!(matches!(
			reg.resolve("seats", &ContextValue::from("NaN")),
			Err(TypeError::Unparseable { .. })
		));
		assert!(matches!(
			reg.resolve("seats", &ContextValue::Boolean(true)),
			Err(TypeError::Mismatch { .. })
		));
	}

	#[test]
	fn booleans_accept_string_forms() {
		let reg = registry();
		assert_eq!(
			reg.resolve("beta", &ContextValue::from("TRUE")),
			Ok(TypedValue::Boolean(true))
		);
		assert!(reg.resolve("beta", &ContextValue::from("yes")).is_err());
	}

	#[test]
	fn dates_accept_iso8601_forms() {
		let expected = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
		assert_eq!(parse_date("2024-05-01"), Some(expected));
		assert_eq!(parse_date("2024-05-01T00:00:00Z"), Some(expected));
		assert_eq!(parse_date("2024-05-01T02:00:00+02:00"), Some(expected));
		assert_eq!(parse_date("2024-05-01T00:00:00"), Some(expected));
		assert_eq!(parse_date("05/01/2024"), None);
	}

	#[test]
	fn semver_accepts_prerelease() {
		let reg = registry();
		let resolved = reg
			.resolve("appVersion", &ContextValue::from("1.2.3-beta.1"))
			.unwrap();
		assert_eq!(resolved, TypedValue::Semver(Version::parse("1.2.3-beta.1").unwrap()));
		assert!(reg.resolve("appVersion", &ContextValue::from("1.2")).is_err());
	}

	#[test]
	fn legal_values_are_enforced() {
		let reg = registry();
		assert!(reg.resolve("plan", &ContextValue::from("pro")).is_ok());
		assert_eq!(
			reg.resolve("plan", &ContextValue::from("enterprise")),
			Err(TypeError::IllegalValue {
				key: "plan".to_string(),
				value: "enterprise".to_string(),
			})
		);
	}

	#[test]
	fn arrays_wrap_scalar_strings() {
		let reg = registry();
		assert_eq!(
			reg.resolve("tags", &ContextValue::from("a")),
			Ok(TypedValue::Array(vec!["a".to_string()]))
		);
		assert!(reg.resolve("tags", &ContextValue::Number(1.0)).is_err());
	}

	#[test]
	fn disabled_fields_report_disabled() {
		let reg = registry();
		assert!(!reg.is_enabled("legacy"));
		assert!(reg.is_enabled("plan"));
	}

	proptest! {
		#[test]
		fn integers_roundtrip_through_strings(n in -1_000_000i64..1_000_000) {
			let reg = registry();
			let resolved = reg.resolve("seats", &ContextValue::String(n.to_string()));
			prop_assert_eq!(resolved, Ok(TypedValue::Number(n as f64)));
		}

		#[test]
		fn semver_triples_parse(major in 0u64..100, minor in 0u64..100, patch in 0u64..100) {
			let raw = format!("{major}.{minor}.{patch}");
			prop_assert_eq!(parse_semver(&raw), Some(Version::new(major, minor, patch)));
		}
	}
}
