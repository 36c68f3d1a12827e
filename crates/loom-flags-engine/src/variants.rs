// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Weighted variant selection.
//!
//! Weights are normalized to a permille table before selection:
//!
//! - Locked weights are kept as configured while they fit in 1000.
//! - The remainder is split evenly across auto-weighted variants; leftover
//!   permille go to the earliest auto variants one each.
//! - Locked weights above 1000 are scaled down proportionally and auto
//!   variants receive nothing.
//! - Locked-only lists that sum below 1000 are scaled up to fill the table.
//! - Negative locked weights count as zero.
//!
//! A context's variant bucket (`0..1000`) then picks the first variant whose
//! cumulative weight exceeds it.

use loom_flags_core::{ConfigurationWarning, EvaluationContext, HashVersion, Stickiness, Variant};

use crate::hashing::{variant_bucket, VARIANT_BUCKETS};
use crate::rollout::resolve_stickiness;

const TOTAL: u64 = VARIANT_BUCKETS as u64;

/// Normalized weights, parallel to the variant list they were built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeightTable {
	pub weights: Vec<u32>,
	pub warnings: Vec<ConfigurationWarning>,
}

impl WeightTable {
	pub fn total(&self) -> u32 {
		self.weights.iter().sum()
	}

	/// Index of the only variant with a non-zero weight, if there is exactly one.
	pub fn sole_variant(&self) -> Option<usize> {
		let mut nonzero = self.weights.iter().enumerate().filter(|(_, w)| **w > 0);
		match (nonzero.next(), nonzero.next()) {
			(Some((index, _)), None) => Some(index),
			_ => None,
		}
	}

	/// First index whose cumulative weight exceeds `bucket`.
	pub fn pick(&self, bucket: u32) -> Option<usize> {
		let mut cumulative = 0u32;
		for (index, weight) in self.weights.iter().enumerate() {
			cumulative += weight;
			if bucket < cumulative {
				return Some(index);
			}
		}
		None
	}
}

pub fn distribute_weights(flag_key: &str, environment: &str, variants: &[Variant]) -> WeightTable {
	let mut warnings = Vec::new();
	let mut weights = vec![0u32; variants.len()];
	let mut locked: Vec<(usize, u64)> = Vec::new();
	let mut auto: Vec<usize> = Vec::new();

	for (index, variant) in variants.iter().enumerate() {
		if !variant.weight_locked {
			auto.push(index);
			continue;
		}
		if variant.weight < 0 {
			warnings.push(ConfigurationWarning::NegativeWeight {
				flag_key: flag_key.to_string(),
				environment: environment.to_string(),
				variant_id: variant.id.clone(),
				weight: variant.weight,
			});
			locked.push((index, 0));
		} else {
			locked.push((index, variant.weight as u64));
		}
	}

	// Stored weights are unbounded; widen so the sum cannot overflow.
	let locked_total: u128 = locked.iter().map(|(_, w)| u128::from(*w)).sum();

	if locked_total > u128::from(TOTAL) {
		warnings.push(ConfigurationWarning::LockedWeightsOverflow {
			flag_key: flag_key.to_string(),
			environment: environment.to_string(),
			total: u64::try_from(locked_total).unwrap_or(u64::MAX),
		});
		scale_to_total(&locked, locked_total, &mut weights);
	} else if !auto.is_empty() {
		for &(index, weight) in &locked {
			weights[index] = weight as u32;
		}
		let remaining = (u128::from(TOTAL) - locked_total) as u32;
		let count = auto.len() as u32;
		let share = remaining / count;
		let extra = remaining % count;
		for (position, &index) in auto.iter().enumerate() {
			weights[index] = share + u32::from((position as u32) < extra);
		}
	} else if locked_total > 0 {
		scale_to_total(&locked, locked_total, &mut weights);
	} else if !variants.is_empty() {
		warnings.push(ConfigurationWarning::AllZeroWeights {
			flag_key: flag_key.to_string(),
			environment: environment.to_string(),
		});
	}

	WeightTable { weights, warnings }
}

/// Proportional floor scaling; the shortfall goes one each to the earliest
/// non-zero entries.
fn scale_to_total(entries: &[(usize, u64)], sum: u128, weights: &mut [u32]) {
	let mut assigned = 0u64;
	for &(index, weight) in entries {
		let scaled = (u128::from(weight) * u128::from(TOTAL) / sum) as u64;
		weights[index] = scaled as u32;
		assigned += scaled;
	}

	let mut shortfall = TOTAL.saturating_sub(assigned);
	for &(index, weight) in entries {
		if shortfall == 0 {
			break;
		}
		if weight > 0 {
			weights[index] += 1;
			shortfall -= 1;
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection<'a> {
	pub variant: Option<&'a Variant>,
	pub warnings: Vec<ConfigurationWarning>,
}

/// Picks a variant for `context`, bucketing on the given stickiness.
///
/// Stickiness is only resolved when more than one variant carries weight.
pub fn select_variant<'a>(
	version: HashVersion,
	flag_key: &str,
	environment: &str,
	variants: &'a [Variant],
	context: &EvaluationContext,
	stickiness: &Stickiness,
) -> Selection<'a> {
	let table = distribute_weights(flag_key, environment, variants);
	let mut warnings = table.warnings.clone();

	let index = if table.total() == 0 {
		None
	} else if let Some(index) = table.sole_variant() {
		Some(index)
	} else {
		let key = resolve_stickiness(stickiness, context);
		warnings.extend(key.warning(stickiness));
		table.pick(variant_bucket(version, &key.value, flag_key))
	};

	Selection {
		variant: index.map(|i| &variants[i]),
		warnings,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	const V1: HashVersion = HashVersion::Murmur3V1;

	fn table(variants: &[Variant]) -> WeightTable {
		distribute_weights("flag", "prod", variants)
	}

	#[test]
	fn auto_weights_split_evenly_with_remainder_first() {
		let t = table(&[Variant::new("a"), Variant::new("b"), Variant::new("c")]);
		assert_eq!(t.weights, vec![334, 333, 333]);
		assert!(t.warnings.is_empty());
	}

	#[test]
	fn locked_and_auto_share_the_table() {
		let t = table(&[Variant::new("a").locked(700), Variant::new("b")]);
		assert_eq!(t.weights, vec![700, 300]);
	}

	#[test]
	fn locked_overflow_scales_down_and_zeroes_auto() {
		let t = table(&[
			Variant::new("a").locked(800),
			Variant::new("b").locked(800),
			Variant::new("c"),
		]);
		assert_eq!(t.weights, vec![500, 500, 0]);
		assert_eq!(
			t.warnings,
			vec![ConfigurationWarning::LockedWeightsOverflow {
				flag_key: "flag".into(),
				environment: "prod".into(),
				total: 1600,
			}]
		);
	}

	#[test]
	fn overflow_shortfall_goes_to_earliest() {
		let t = table(&[
			Variant::new("a").locked(1000),
			Variant::new("b").locked(1000),
			Variant::new("c").locked(1000),
		]);
		assert_eq!(t.weights, vec![334, 333, 333]);
	}

	#[test]
	fn huge_locked_weights_scale_without_overflow() {
		let t = table(&[
			Variant::new("a").locked(i64::MAX),
			Variant::new("b").locked(i64::MAX),
			Variant::new("c").locked(i64::MAX),
		]);
		assert_eq!(t.weights, vec![334, 333, 333]);
		assert_eq!(
			t.warnings,
			vec![ConfigurationWarning::LockedWeightsOverflow {
				flag_key: "flag".into(),
				environment: "prod".into(),
				total: u64::MAX,
			}]
		);
	}

	#[test]
	fn locked_only_under_total_scales_up() {
		let t = table(&[Variant::new("a").locked(100), Variant::new("b").locked(300)]);
		assert_eq!(t.weights, vec![250, 750]);
		assert!(t.warnings.is_empty());
	}

	#[test]
	fn all_zero_weights_select_nothing() {
		let variants = [Variant::new("a").locked(0), Variant::new("b").locked(0)];
		let t = table(&variants);
		assert_eq!(t.total(), 0);
		assert_eq!(
			t.warnings,
			vec![ConfigurationWarning::AllZeroWeights {
				flag_key: "flag".into(),
				environment: "prod".into(),
			}]
		);

		let ctx = EvaluationContext::new("prod").with_user_id("u1");
		let selection = select_variant(V1, "flag", "prod", &variants, &ctx, &Stickiness::Default);
		assert!(selection.variant.is_none());
	}

	#[test]
	fn negative_weight_counts_as_zero() {
		let t = table(&[Variant::new("a").locked(-50), Variant::new("b")]);
		assert_eq!(t.weights, vec![0, 1000]);
		assert!(matches!(
			t.warnings[0],
			ConfigurationWarning::NegativeWeight { weight: -50, .. }
		));
	}

	#[test]
	fn empty_list_has_no_warnings() {
		let t = table(&[]);
		assert!(t.weights.is_empty());
		assert!(t.warnings.is_empty());
	}

	#[test]
	fn pick_uses_cumulative_boundaries() {
		let t = WeightTable {
			weights: vec![700, 300],
			warnings: vec![],
		};
		assert_eq!(t.pick(0), Some(0));
		assert_eq!(t.pick(699), Some(0));
		assert_eq!(t.pick(700), Some(1));
		assert_eq!(t.pick(999), Some(1));
	}

	#[test]
	fn sole_variant_skips_stickiness() {
		let variants = [Variant::new("only")];
		let ctx = EvaluationContext::new("prod");
		let selection = select_variant(
			V1,
			"flag",
			"prod",
			&variants,
			&ctx,
			&Stickiness::Field("tenantId".into()),
		);
		assert_eq!(selection.variant.map(|v| v.id.as_str()), Some("only"));
		assert!(selection.warnings.is_empty());
	}

	#[test]
	fn seventy_thirty_split_is_roughly_honored() {
		let variants = [Variant::new("a").locked(700), Variant::new("b")];
		let a_count = (0..2000)
			.filter(|i| {
				let ctx = EvaluationContext::new("prod").with_user_id(format!("user{i}"));
				select_variant(V1, "flag", "prod", &variants, &ctx, &Stickiness::Default)
					.variant
					.map(|v| v.id == "a")
					.unwrap_or(false)
			})
			.count();
		assert!(a_count > 1250 && a_count < 1550, "a_count {a_count}");
	}

	fn variant_strategy() -> impl Strategy<Value = Vec<Variant>> {
		prop::collection::vec((any::<bool>(), -100i64..1500), 0..8).prop_map(|specs| {
			specs
				.into_iter()
				.enumerate()
				.map(|(i, (locked, weight))| {
					let v = Variant::new(format!("v{i}"));
					if locked {
						v.locked(weight)
					} else {
						v
					}
				})
				.collect()
		})
	}

	proptest! {
		#[test]
		fn weights_sum_to_total_or_zero(variants in variant_strategy()) {
			let t = table(&variants);
			prop_assert_eq!(t.weights.len(), variants.len());
			let total = t.total();
			prop_assert!(total == 1000 || total == 0, "total {}", total);
			if total == 0 && !variants.is_empty() {
				prop_assert!(variants.iter().all(|v| v.weight_locked && v.weight <= 0));
			}
		}

		#[test]
		fn selection_is_stable(user_id in "[a-zA-Z0-9]{1,30}", variants in variant_strategy()) {
			let ctx = EvaluationContext::new("prod").with_user_id(user_id);
			let first = select_variant(V1, "flag", "prod", &variants, &ctx, &Stickiness::Default)
				.variant
				.map(|v| v.id.clone());
			let second = select_variant(V1, "flag", "prod", &variants, &ctx, &Stickiness::Default)
				.variant
				.map(|v| v.id.clone());
			prop_assert_eq!(first, second);
		}
	}
}
