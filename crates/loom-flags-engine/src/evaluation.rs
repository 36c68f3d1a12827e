// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::collections::BTreeMap;

use loom_flags_core::{
	ConfigurationWarning, EvaluationContext, EvaluationResult, EvaluationSource, FeatureFlag,
	FlagEnvironment, FlagSnapshot, Stickiness, Strategy, VariantType,
};
use tracing::debug;

use crate::rollout::passes_rollout;
use crate::segments::{note_constraint, SegmentResolver};
use crate::variants::select_variant;

/// Evaluates a flag for a given context against one snapshot.
///
/// The evaluation order is:
/// 1. Look up the flag; unknown keys resolve to `missing`
/// 2. Look up the context's environment; absent config counts as disabled
/// 3. Match strategies in order (constraints, segments, rollout gate); the
///    first match wins and an enabled environment without strategies matches
///    everyone
/// 4. Select a weighted variant when the environment defines any
/// 5. Fall back through the environment and flag baselines
pub fn evaluate_flag(
	snapshot: &FlagSnapshot,
	flag_key: &str,
	context: &EvaluationContext,
) -> EvaluationResult {
	evaluate(snapshot, flag_key, context, None)
}

/// Like [`evaluate_flag`], but resolves to `type-mismatch` when the flag is
/// not of the requested type.
pub fn evaluate_flag_as(
	snapshot: &FlagSnapshot,
	flag_key: &str,
	context: &EvaluationContext,
	requested: VariantType,
) -> EvaluationResult {
	evaluate(snapshot, flag_key, context, Some(requested))
}

/// Evaluates every flag in the snapshot, keyed by flag key.
pub fn evaluate_all(
	snapshot: &FlagSnapshot,
	context: &EvaluationContext,
) -> BTreeMap<String, EvaluationResult> {
	snapshot
		.flag_keys()
		.into_iter()
		.map(|key| (key.to_string(), evaluate(snapshot, key, context, None)))
		.collect()
}

fn evaluate(
	snapshot: &FlagSnapshot,
	flag_key: &str,
	context: &EvaluationContext,
	requested: Option<VariantType>,
) -> EvaluationResult {
	let Some(flag) = snapshot.flag(flag_key) else {
		debug!(flag_key, "flag not found in snapshot");
		return EvaluationResult::missing(flag_key);
	};

	if let Some(requested) = requested {
		if requested != flag.variant_type {
			debug!(
				flag_key,
				requested = %requested,
				actual = %flag.variant_type,
				"flag type mismatch"
			);
			return EvaluationResult::type_mismatch(flag_key);
		}
	}

	let mut warnings = Vec::new();
	let environment = flag.environment(&context.environment);

	let result = match environment {
		Some(env) if env.enabled => {
			match match_strategies(snapshot, flag, env, context, &mut warnings) {
				Some(stickiness) => resolve_enabled(
					snapshot,
					flag,
					env,
					&stickiness,
					context,
					&mut warnings,
				),
				None => resolve_disabled(flag, Some(env)),
			}
		}
		_ => resolve_disabled(flag, environment),
	};

	for warning in &warnings {
		debug!(flag_key, %warning, "configuration warning during evaluation");
	}

	result.with_warnings(dedupe(warnings))
}

/// Returns the stickiness of the first matching strategy.
fn match_strategies(
	snapshot: &FlagSnapshot,
	flag: &FeatureFlag,
	env: &FlagEnvironment,
	context: &EvaluationContext,
	warnings: &mut Vec<ConfigurationWarning>,
) -> Option<Stickiness> {
	if env.strategies.is_empty() {
		return Some(Stickiness::Default);
	}

	let resolver = SegmentResolver::new(snapshot);
	for strategy in &env.strategies {
		if strategy_matches(snapshot, &resolver, flag, strategy, context, warnings) {
			debug!(flag_key = %flag.key, strategy_id = %strategy.id, "strategy matched");
			return Some(strategy.stickiness.clone());
		}
	}

	None
}

fn strategy_matches(
	snapshot: &FlagSnapshot,
	resolver: &SegmentResolver<'_>,
	flag: &FeatureFlag,
	strategy: &Strategy,
	context: &EvaluationContext,
	warnings: &mut Vec<ConfigurationWarning>,
) -> bool {
	for constraint in &strategy.constraints {
		note_constraint(constraint, snapshot, warnings);
		if !constraint.matches(context, snapshot.registry()) {
			return false;
		}
	}

	for segment_id in &strategy.segment_ids {
		if !resolver.matches(segment_id, context, warnings) {
			return false;
		}
	}

	if !(0..=100).contains(&strategy.rollout_percentage) {
		warnings.push(ConfigurationWarning::RolloutOutOfRange {
			flag_key: flag.key.clone(),
			environment: context.environment.clone(),
			percentage: strategy.rollout_percentage,
		});
	}

	let decision = passes_rollout(snapshot.hash_version(), strategy, &flag.key, context);
	if let Some(key) = &decision.stickiness {
		warnings.extend(key.warning(&strategy.stickiness));
	}
	decision.passed
}

fn resolve_enabled(
	snapshot: &FlagSnapshot,
	flag: &FeatureFlag,
	env: &FlagEnvironment,
	stickiness: &Stickiness,
	context: &EvaluationContext,
	warnings: &mut Vec<ConfigurationWarning>,
) -> EvaluationResult {
	let mut variant_id = None;

	if !env.variants.is_empty() {
		let selection = select_variant(
			snapshot.hash_version(),
			&flag.key,
			&context.environment,
			&env.variants,
			context,
			stickiness,
		);
		warnings.extend(selection.warnings);

		if let Some(variant) = selection.variant {
			variant_id = Some(variant.id.clone());
			if let Some(value) = variant.value() {
				return EvaluationResult::new(
					&flag.key,
					true,
					Some(value.clone()),
					EvaluationSource::StrategyVariant,
				)
				.with_variant(variant_id);
			}
		}
	}

	let (value, source) = match (&env.enabled_value, &flag.enabled_value) {
		(Some(value), _) => (Some(value.clone()), EvaluationSource::EnvDefaultEnabled),
		(None, Some(value)) => (Some(value.clone()), EvaluationSource::FlagDefaultEnabled),
		(None, None) => (None, EvaluationSource::CallerDefault),
	};
	EvaluationResult::new(&flag.key, true, value, source).with_variant(variant_id)
}

fn resolve_disabled(flag: &FeatureFlag, env: Option<&FlagEnvironment>) -> EvaluationResult {
	let env_value = env.and_then(|env| env.disabled_value.as_ref());
	let (value, source) = match (env_value, &flag.disabled_value) {
		(Some(value), _) => (Some(value.clone()), EvaluationSource::EnvDefaultDisabled),
		(None, Some(value)) => (Some(value.clone()), EvaluationSource::FlagDefaultDisabled),
		(None, None) => (None, EvaluationSource::CallerDefault),
	};
	EvaluationResult::new(&flag.key, false, value, source)
}

fn dedupe(warnings: Vec<ConfigurationWarning>) -> Vec<ConfigurationWarning> {
	let mut unique = Vec::with_capacity(warnings.len());
	for warning in warnings {
		if !unique.contains(&warning) {
			unique.push(warning);
		}
	}
	unique
}
