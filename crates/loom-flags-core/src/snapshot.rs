// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Versioned definition snapshot.
//!
//! The administrative side publishes a [`SnapshotDocument`]; it is validated
//! into an immutable [`FlagSnapshot`] before the engine ever sees it. All
//! fatal problems surface here. Anything the engine can tolerate is reported
//! by [`FlagSnapshot::lint`] instead.
//!
//! # Example
//!
//! ```
//! use loom_flags_core::FlagSnapshot;
//!
//! let snapshot = FlagSnapshot::from_json(r#"{
//!     "version": 7,
//!     "hashVersion": "murmur3-v1",
//!     "flags": [{
//!         "key": "checkout.new_flow",
//!         "variantType": "boolean",
//!         "environments": {"prod": {"enabled": true}}
//!     }]
//! }"#).unwrap();
//!
//! assert_eq!(snapshot.version(), 7);
//! assert!(snapshot.flag("checkout.new_flow").is_some());
//! ```

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constraint::Constraint;
use crate::context_field::{ContextField, ContextFieldRegistry};
use crate::error::{FlagsError, Result};
use crate::flag::{FeatureFlag, FlagValue, VariantType};
use crate::segment::Segment;
use crate::warning::ConfigurationWarning;

/// Hashing scheme used for rollout and variant bucketing.
///
/// Changing the algorithm or its input encoding re-buckets every user, so
/// each scheme gets its own version tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashVersion {
	/// MurmurHash3 x86 32-bit, seed 0, over the UTF-8 bytes of the input.
	#[default]
	Murmur3V1,
}

impl HashVersion {
	pub fn as_str(&self) -> &'static str {
		match self {
			HashVersion::Murmur3V1 => "murmur3-v1",
		}
	}
}

impl fmt::Display for HashVersion {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for HashVersion {
	type Err = FlagsError;

	fn from_str(s: &str) -> Result<Self> {
		match s {
			"murmur3-v1" => Ok(HashVersion::Murmur3V1),
			other => Err(FlagsError::UnsupportedHashVersion(other.to_string())),
		}
	}
}

fn default_hash_version() -> String {
	HashVersion::default().as_str().to_string()
}

/// Wire form of a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotDocument {
	pub version: u64,
	#[serde(default = "default_hash_version")]
	pub hash_version: String,
	#[serde(default)]
	pub context_fields: Vec<ContextField>,
	#[serde(default)]
	pub segments: Vec<Segment>,
	#[serde(default)]
	pub flags: Vec<FeatureFlag>,
}

impl SnapshotDocument {
	pub fn new(version: u64) -> Self {
		Self {
			version,
			hash_version: default_hash_version(),
			context_fields: Vec::new(),
			segments: Vec::new(),
			flags: Vec::new(),
		}
	}

	pub fn with_flag(mut self, flag: FeatureFlag) -> Self {
		self.flags.push(flag);
		self
	}

	pub fn with_segment(mut self, segment: Segment) -> Self {
		self.segments.push(segment);
		self
	}

	pub fn with_context_field(mut self, field: ContextField) -> Self {
		self.context_fields.push(field);
		self
	}
}

/// Immutable, validated definitions for one generation.
#[derive(Debug, Clone, Default)]
pub struct FlagSnapshot {
	version: u64,
	hash_version: HashVersion,
	flags: HashMap<String, FeatureFlag>,
	segments: HashMap<String, Segment>,
	registry: ContextFieldRegistry,
}

impl FlagSnapshot {
	/// Snapshot with no definitions; every lookup reports `missing`.
	pub fn empty() -> Self {
		Self::default()
	}

	pub fn from_json(json: &str) -> Result<Self> {
		let document: SnapshotDocument = serde_json::from_str(json)?;
		Self::from_document(document)
	}

	pub fn from_document(document: SnapshotDocument) -> Result<Self> {
		let hash_version = document.hash_version.parse::<HashVersion>()?;

		let mut fields = HashMap::new();
		for field in document.context_fields {
			match fields.entry(field.key.clone()) {
				Entry::Occupied(_) => return Err(FlagsError::DuplicateContextField(field.key)),
				Entry::Vacant(slot) => {
					slot.insert(field);
				}
			}
		}

		let mut segments = HashMap::new();
		for segment in document.segments {
			match segments.entry(segment.id.clone()) {
				Entry::Occupied(_) => return Err(FlagsError::DuplicateSegment(segment.id)),
				Entry::Vacant(slot) => {
					slot.insert(segment);
				}
			}
		}

		let mut flags = HashMap::new();
		for flag in document.flags {
			if !FeatureFlag::validate_key(&flag.key) {
				return Err(FlagsError::InvalidFlagKey(flag.key));
			}
			let flag = normalize_flag(flag)?;
			match flags.entry(flag.key.clone()) {
				Entry::Occupied(_) => return Err(FlagsError::DuplicateFlag(flag.key)),
				Entry::Vacant(slot) => {
					slot.insert(flag);
				}
			}
		}

		Ok(Self {
			version: document.version,
			hash_version,
			flags,
			segments,
			registry: ContextFieldRegistry::new(fields.into_values()),
		})
	}

	pub fn version(&self) -> u64 {
		self.version
	}

	pub fn hash_version(&self) -> HashVersion {
		self.hash_version
	}

	pub fn flag(&self, key: &str) -> Option<&FeatureFlag> {
		self.flags.get(key)
	}

	pub fn segment(&self, id: &str) -> Option<&Segment> {
		self.segments.get(id)
	}

	pub fn registry(&self) -> &ContextFieldRegistry {
		&self.registry
	}

	pub fn flag_count(&self) -> usize {
		self.flags.len()
	}

	/// Flag keys in sorted order.
	pub fn flag_keys(&self) -> Vec<&str> {
		let mut keys: Vec<&str> = self.flags.keys().map(String::as_str).collect();
		keys.sort_unstable();
		keys
	}

	/// Reports every tolerated configuration problem, in a stable order.
	pub fn lint(&self) -> Vec<ConfigurationWarning> {
		let mut warnings = Vec::new();

		let mut segment_ids: Vec<&String> = self.segments.keys().collect();
		segment_ids.sort();
		for id in segment_ids {
			let segment = &self.segments[id];
			if segment.is_empty() {
				warnings.push(ConfigurationWarning::EmptySegment {
					segment_id: id.clone(),
				});
			}
			self.lint_constraints(&segment.constraints, &mut warnings);
		}

		for key in self.flag_keys() {
			let flag = &self.flags[key];
			let mut env_names: Vec<&String> = flag.environments.keys().collect();
			env_names.sort();

			for env_name in env_names {
				let env = &flag.environments[env_name];

				for strategy in &env.strategies {
					if !(0..=100).contains(&strategy.rollout_percentage) {
						warnings.push(ConfigurationWarning::RolloutOutOfRange {
							flag_key: key.to_string(),
							environment: env_name.clone(),
							percentage: strategy.rollout_percentage,
						});
					}
					for segment_id in &strategy.segment_ids {
						if !self.segments.contains_key(segment_id) {
							warnings.push(ConfigurationWarning::MissingSegment {
								segment_id: segment_id.clone(),
							});
						}
					}
					self.lint_constraints(&strategy.constraints, &mut warnings);
				}

				let mut locked_total: u64 = 0;
				let mut has_auto = false;
				for variant in &env.variants {
					if variant.weight_locked {
						if variant.weight < 0 {
							warnings.push(ConfigurationWarning::NegativeWeight {
								flag_key: key.to_string(),
								environment: env_name.clone(),
								variant_id: variant.id.clone(),
								weight: variant.weight,
							});
						} else {
							locked_total = locked_total.saturating_add(variant.weight as u64);
						}
					} else {
						has_auto = true;
					}
				}

				if locked_total > 1000 {
					warnings.push(ConfigurationWarning::LockedWeightsOverflow {
						flag_key: key.to_string(),
						environment: env_name.clone(),
						total: locked_total,
					});
				} else if !env.variants.is_empty() && !has_auto && locked_total == 0 {
					warnings.push(ConfigurationWarning::AllZeroWeights {
						flag_key: key.to_string(),
						environment: env_name.clone(),
					});
				}
			}
		}

		warnings
	}

	fn lint_constraints(&self, constraints: &[Constraint], warnings: &mut Vec<ConfigurationWarning>) {
		for constraint in constraints {
			if constraint.is_inverted_empty_in() {
				warnings.push(ConfigurationWarning::InvertedEmptyIn {
					field_key: constraint.field_key.clone(),
				});
			}
			if !self.registry.is_enabled(&constraint.field_key) {
				warnings.push(ConfigurationWarning::DisabledField {
					field_key: constraint.field_key.clone(),
				});
			}
		}
	}
}

/// Decodes payloads and coerces baselines to the flag's declared type.
fn normalize_flag(mut flag: FeatureFlag) -> Result<FeatureFlag> {
	let variant_type = flag.variant_type;
	let key = flag.key.clone();

	let coerce = |value: Option<FlagValue>, which: &'static str| -> Result<Option<FlagValue>> {
		value
			.map(|v| v.coerce(variant_type))
			.transpose()
			.map_err(|reason| FlagsError::InvalidBaseline {
				flag_key: key.clone(),
				which,
				reason,
			})
	};

	flag.enabled_value = coerce(flag.enabled_value.take(), "enabledValue")?;
	flag.disabled_value = coerce(flag.disabled_value.take(), "disabledValue")?;

	if variant_type == VariantType::Boolean {
		flag.enabled_value.get_or_insert(FlagValue::Boolean(true));
		flag.disabled_value.get_or_insert(FlagValue::Boolean(false));
	}

	for (env_name, env) in flag.environments.iter_mut() {
		env.enabled_value = coerce(env.enabled_value.take(), "enabledValue")?;
		env.disabled_value = coerce(env.disabled_value.take(), "disabledValue")?;

		let mut seen = std::collections::HashSet::new();
		for variant in env.variants.iter_mut() {
			if !seen.insert(variant.id.clone()) {
				return Err(FlagsError::DuplicateVariant {
					flag_key: key.clone(),
					environment: env_name.clone(),
					variant_id: variant.id.clone(),
				});
			}
			variant
				.resolve_payload(variant_type)
				.map_err(|reason| FlagsError::InvalidPayload {
					flag_key: key.clone(),
					environment: env_name.clone(),
					variant_id: variant.id.clone(),
					reason,
				})?;
		}
	}

	Ok(flag)
}
