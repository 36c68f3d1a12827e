// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context_field::parse_number;
use crate::strategy::Strategy;

/// Value type a flag resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantType {
	Boolean,
	String,
	Number,
	Json,
}

impl fmt::Display for VariantType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			VariantType::Boolean => "boolean",
			VariantType::String => "string",
			VariantType::Number => "number",
			VariantType::Json => "json",
		};
		f.write_str(name)
	}
}

/// A resolved flag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
	Boolean(bool),
	Number(f64),
	String(String),
	Json(serde_json::Value),
}

impl FlagValue {
	pub fn value_type(&self) -> VariantType {
		match self {
			FlagValue::Boolean(_) => VariantType::Boolean,
			FlagValue::Number(_) => VariantType::Number,
			FlagValue::String(_) => VariantType::String,
			FlagValue::Json(_) => VariantType::Json,
		}
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			FlagValue::Boolean(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			FlagValue::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match self {
			FlagValue::Number(n) => Some(*n),
			_ => None,
		}
	}

	pub fn as_json(&self) -> Option<&serde_json::Value> {
		match self {
			FlagValue::Json(v) => Some(v),
			_ => None,
		}
	}

	/// Converts a stored baseline to the flag's declared type.
	pub fn coerce(self, target: VariantType) -> Result<FlagValue, String> {
		match (target, self) {
			(VariantType::Boolean, FlagValue::Boolean(b)) => Ok(FlagValue::Boolean(b)),
			(VariantType::Boolean, FlagValue::String(s)) => match s.as_str() {
				"true" => Ok(FlagValue::Boolean(true)),
				"false" => Ok(FlagValue::Boolean(false)),
				_ => Err(format!("'{s}' is not a boolean")),
			},
			(VariantType::Number, FlagValue::Number(n)) => Ok(FlagValue::Number(n)),
			(VariantType::Number, FlagValue::String(s)) => parse_number(&s)
				.map(FlagValue::Number)
				.ok_or_else(|| format!("'{s}' is not a number")),
			(VariantType::String, FlagValue::String(s)) => Ok(FlagValue::String(s)),
			(VariantType::Json, FlagValue::Json(v)) => Ok(FlagValue::Json(v)),
			(VariantType::Json, FlagValue::Boolean(b)) => Ok(FlagValue::Json(b.into())),
			(VariantType::Json, FlagValue::String(s)) => Ok(FlagValue::Json(s.into())),
			(VariantType::Json, FlagValue::Number(n)) => serde_json::Number::from_f64(n)
				.map(|n| FlagValue::Json(serde_json::Value::Number(n)))
				.ok_or_else(|| "non-finite number".to_string()),
			(target, other) => Err(format!(
				"expected {target}, got {}",
				other.value_type()
			)),
		}
	}
}

impl fmt::Display for FlagValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			FlagValue::Boolean(b) => write!(f, "{b}"),
			FlagValue::Number(n) => write!(f, "{n}"),
			FlagValue::String(s) => f.write_str(s),
			FlagValue::Json(v) => write!(f, "{v}"),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
	None,
	String,
	Number,
	Json,
}

/// Payload as stored: a type tag and its string encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantPayload {
	#[serde(rename = "type")]
	pub payload_type: PayloadType,
	#[serde(default)]
	pub value: String,
}

/// One weighted payload option of a flag-environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
	pub id: String,
	#[serde(default)]
	pub payload: Option<VariantPayload>,
	/// Permille. Only meaningful when `weight_locked` is set.
	#[serde(default)]
	pub weight: i64,
	#[serde(default)]
	pub weight_locked: bool,
	#[serde(skip)]
	resolved: Option<FlagValue>,
}

impl Variant {
	/// An auto-weighted variant without payload.
	pub fn new(id: impl Into<String>) -> Self {
		Self {
			id: id.into(),
			payload: None,
			weight: 0,
			weight_locked: false,
			resolved: None,
		}
	}

	pub fn locked(mut self, weight: i64) -> Self {
		self.weight = weight;
		self.weight_locked = true;
		self
	}

	/// Sets the stored payload. It is decoded when the owning snapshot loads.
	pub fn with_payload(mut self, payload_type: PayloadType, value: impl Into<String>) -> Self {
		self.payload = Some(VariantPayload {
			payload_type,
			value: value.into(),
		});
		self.resolved = None;
		self
	}

	/// The decoded payload, present once the owning snapshot is loaded.
	pub fn value(&self) -> Option<&FlagValue> {
		self.resolved.as_ref()
	}

	/// Decodes the stored payload against the flag's declared type.
	pub fn resolve_payload(&mut self, variant_type: VariantType) -> Result<(), String> {
		let Some(payload) = &self.payload else {
			self.resolved = None;
			return Ok(());
		};

		let value = match (payload.payload_type, variant_type) {
			(PayloadType::None, _) => None,
			(PayloadType::String, VariantType::String) => Some(FlagValue::String(payload.value.clone())),
			(PayloadType::Number, VariantType::Number) => Some(FlagValue::Number(
				parse_number(&payload.value)
					.ok_or_else(|| format!("'{}' is not a number", payload.value))?,
			)),
			(PayloadType::Json, VariantType::Json) => Some(FlagValue::Json(
				serde_json::from_str(&payload.value).map_err(|e| e.to_string())?,
			)),
			(payload_type, variant_type) => {
				return Err(format!(
					"payload type {payload_type:?} does not fit a {variant_type} flag"
				))
			}
		};

		self.resolved = value;
		Ok(())
	}
}

/// Per-environment flag configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagEnvironment {
	#[serde(default)]
	pub enabled: bool,
	/// OR-combined, evaluated in order.
	#[serde(default)]
	pub strategies: Vec<Strategy>,
	#[serde(default)]
	pub variants: Vec<Variant>,
	#[serde(default)]
	pub enabled_value: Option<FlagValue>,
	#[serde(default)]
	pub disabled_value: Option<FlagValue>,
}

impl FlagEnvironment {
	pub fn enabled() -> Self {
		Self {
			enabled: true,
			..Self::default()
		}
	}

	pub fn with_strategy(mut self, strategy: Strategy) -> Self {
		self.strategies.push(strategy);
		self
	}

	pub fn with_variant(mut self, variant: Variant) -> Self {
		self.variants.push(variant);
		self
	}

	pub fn with_enabled_value(mut self, value: FlagValue) -> Self {
		self.enabled_value = Some(value);
		self
	}

	pub fn with_disabled_value(mut self, value: FlagValue) -> Self {
		self.disabled_value = Some(value);
		self
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureFlag {
	pub key: String,
	#[serde(default)]
	pub description: Option<String>,
	pub variant_type: VariantType,
	/// Flag-level baseline used when the environment sets none.
	#[serde(default)]
	pub enabled_value: Option<FlagValue>,
	#[serde(default)]
	pub disabled_value: Option<FlagValue>,
	#[serde(default)]
	pub environments: HashMap<String, FlagEnvironment>,
}

impl FeatureFlag {
	pub fn new(key: impl Into<String>, variant_type: VariantType) -> Self {
		Self {
			key: key.into(),
			description: None,
			variant_type,
			enabled_value: None,
			disabled_value: None,
			environments: HashMap::new(),
		}
	}

	pub fn with_environment(mut self, name: impl Into<String>, env: FlagEnvironment) -> Self {
		self.environments.insert(name.into(), env);
		self
	}

	pub fn with_enabled_value(mut self, value: FlagValue) -> Self {
		self.enabled_value = Some(value);
		self
	}

	pub fn with_disabled_value(mut self, value: FlagValue) -> Self {
		self.disabled_value = Some(value);
		self
	}

	pub fn environment(&self, name: &str) -> Option<&FlagEnvironment> {
		self.environments.get(name)
	}

	/// Validates the flag key format.
	///
	/// Valid keys:
	/// - 1-200 characters
	/// - Printable ASCII without whitespace
	pub fn validate_key(key: &str) -> bool {
		!key.is_empty() && key.len() <= 200 && key.chars().all(|c| c.is_ascii_graphic())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn payload_decodes_per_type() {
		let mut variant: Variant = serde_json::from_str(
			r#"{"id": "blue", "payload": {"type": "json", "value": "{\"color\": \"blue\"}"}}"#,
		)
		.unwrap();
		variant.resolve_payload(VariantType::Json).unwrap();
		assert_eq!(
			variant.value(),
			Some(&FlagValue::Json(serde_json::json!({"color": "blue"})))
		);
	}

	#[test]
	fn payload_type_must_fit_flag() {
		let mut variant: Variant = serde_json::from_str(
			r#"{"id": "a", "payload": {"type": "string", "value": "x"}}"#,
		)
		.unwrap();
		assert!(variant.resolve_payload(VariantType::Number).is_err());
	}

	#[test]
	fn none_payload_resolves_to_nothing() {
		let mut variant: Variant =
			serde_json::from_str(r#"{"id": "a", "payload": {"type": "none"}}"#).unwrap();
		variant.resolve_payload(VariantType::Boolean).unwrap();
		assert_eq!(variant.value(), None);
	}

	#[test]
	fn number_payload_rejects_garbage() {
		let mut variant: Variant = serde_json::from_str(
			r#"{"id": "a", "payload": {"type": "number", "value": "1,5"}}"#,
		)
		.unwrap();
		assert!(variant.resolve_payload(VariantType::Number).is_err());
	}

	#[test]
	fn baselines_coerce_to_declared_type() {
		assert_eq!(
			FlagValue::String("3.5".into()).coerce(VariantType::Number),
			Ok(FlagValue::Number(3.5))
		);
		assert_eq!(
			FlagValue::String("hi".into()).coerce(VariantType::Json),
			Ok(FlagValue::Json(serde_json::json!("hi")))
		);
		assert!(FlagValue::Number(1.0).coerce(VariantType::String).is_err());
	}

	#[test]
	fn untagged_values_deserialize() {
		let v: FlagValue = serde_json::from_str("true").unwrap();
		assert_eq!(v, FlagValue::Boolean(true));
		let v: FlagValue = serde_json::from_str("12").unwrap();
		assert_eq!(v, FlagValue::Number(12.0));
		let v: FlagValue = serde_json::from_str(r#"{"a": 1}"#).unwrap();
		assert_eq!(v, FlagValue::Json(serde_json::json!({"a": 1})));
	}

	#[test]
	fn validate_key() {
		assert!(FeatureFlag::validate_key("checkout.new_flow"));
		assert!(FeatureFlag::validate_key("a"));
		assert!(!FeatureFlag::validate_key(""));
		assert!(!FeatureFlag::validate_key("has space"));
	}

	proptest! {
		#[test]
		fn flag_key_with_dots_valid(domain in "[a-z][a-z0-9_]{1,10}", feature in "[a-z][a-z0-9_]{1,10}") {
			let key = format!("{}.{}", domain, feature);
			prop_assert!(FeatureFlag::validate_key(&key));
		}
	}
}
