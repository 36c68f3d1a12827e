// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Typed evaluation entry points for application code.

use std::collections::BTreeMap;
use std::sync::Arc;

use loom_flags_core::{EvaluationContext, EvaluationResult, EvaluationSource, FlagValue, VariantType};
use tracing::debug;

use crate::evaluation::{evaluate_all, evaluate_flag, evaluate_flag_as};
use crate::metrics::MetricsRecorder;
use crate::store::SnapshotStore;

/// Evaluates flags against whatever snapshot the store holds at call time.
///
/// Each call loads the snapshot pointer once, so a concurrent swap never
/// mixes two generations within a call. Typed calls never fail: anything that
/// cannot produce a value of the requested type yields the caller's default.
#[derive(Clone)]
pub struct FlagEvaluator {
	store: Arc<SnapshotStore>,
	metrics: Option<MetricsRecorder>,
}

impl FlagEvaluator {
	pub fn new(store: Arc<SnapshotStore>) -> Self {
		Self {
			store,
			metrics: None,
		}
	}

	pub fn with_metrics(mut self, recorder: MetricsRecorder) -> Self {
		self.metrics = Some(recorder);
		self
	}

	pub fn store(&self) -> &Arc<SnapshotStore> {
		&self.store
	}

	pub fn metrics(&self) -> Option<&MetricsRecorder> {
		self.metrics.as_ref()
	}

	/// Untyped evaluation with full detail.
	pub fn evaluate(&self, flag_key: &str, context: &EvaluationContext) -> EvaluationResult {
		let snapshot = self.store.current();
		let result = evaluate_flag(&snapshot, flag_key, context);
		self.record(flag_key, result.source);
		result
	}

	pub fn evaluate_boolean(
		&self,
		flag_key: &str,
		context: &EvaluationContext,
		default: bool,
	) -> (bool, EvaluationSource) {
		self.evaluate_typed(flag_key, context, VariantType::Boolean, default, FlagValue::as_bool)
	}

	pub fn evaluate_string(
		&self,
		flag_key: &str,
		context: &EvaluationContext,
		default: &str,
	) -> (String, EvaluationSource) {
		self.evaluate_typed(
			flag_key,
			context,
			VariantType::String,
			default.to_string(),
			|value| value.as_str().map(str::to_string),
		)
	}

	pub fn evaluate_number(
		&self,
		flag_key: &str,
		context: &EvaluationContext,
		default: f64,
	) -> (f64, EvaluationSource) {
		self.evaluate_typed(flag_key, context, VariantType::Number, default, FlagValue::as_f64)
	}

	pub fn evaluate_json(
		&self,
		flag_key: &str,
		context: &EvaluationContext,
		default: serde_json::Value,
	) -> (serde_json::Value, EvaluationSource) {
		self.evaluate_typed(flag_key, context, VariantType::Json, default, |value| {
			value.as_json().cloned()
		})
	}

	/// Evaluates every flag against a single snapshot.
	pub fn get_all_flags(&self, context: &EvaluationContext) -> BTreeMap<String, EvaluationResult> {
		let snapshot = self.store.current();
		let results = evaluate_all(&snapshot, context);
		for (key, result) in &results {
			self.record(key, result.source);
		}
		results
	}

	fn evaluate_typed<T>(
		&self,
		flag_key: &str,
		context: &EvaluationContext,
		requested: VariantType,
		default: T,
		extract: impl FnOnce(&FlagValue) -> Option<T>,
	) -> (T, EvaluationSource) {
		let snapshot = self.store.current();
		let result = evaluate_flag_as(&snapshot, flag_key, context, requested);

		let (value, source) = match result.value.as_ref() {
			None => (default, result.source),
			Some(value) => match extract(value) {
				Some(extracted) => (extracted, result.source),
				None => {
					debug!(flag_key, requested = %requested, "resolved value has the wrong type");
					(default, EvaluationSource::TypeMismatch)
				}
			},
		};

		self.record(flag_key, source);
		(value, source)
	}

	fn record(&self, flag_key: &str, source: EvaluationSource) {
		if let Some(metrics) = &self.metrics {
			metrics.record(flag_key, source);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::MetricsConfig;
	use crate::metrics::InMemoryMetricsSink;
	use loom_flags_core::{
		Constraint, FeatureFlag, FlagEnvironment, FlagSnapshot, Operator, PayloadType,
		SnapshotDocument, Strategy, Variant,
	};
	use serde_json::json;

	fn document(version: u64) -> SnapshotDocument {
		SnapshotDocument::new(version)
			.with_flag(
				FeatureFlag::new("new_checkout", VariantType::Boolean).with_environment(
					"prod",
					FlagEnvironment::enabled().with_strategy(
						Strategy::new("pro")
							.with_constraint(Constraint::new("plan", Operator::In, ["pro"])),
					),
				),
			)
			.with_flag(
				FeatureFlag::new("banner", VariantType::String).with_environment(
					"prod",
					FlagEnvironment::enabled()
						.with_variant(Variant::new("hello").with_payload(PayloadType::String, "hello")),
				),
			)
			.with_flag(
				FeatureFlag::new("max_items", VariantType::Number)
					.with_enabled_value(FlagValue::Number(25.0))
					.with_environment("prod", FlagEnvironment::enabled()),
			)
			.with_flag(
				FeatureFlag::new("theme", VariantType::Json).with_environment(
					"prod",
					FlagEnvironment::enabled().with_variant(
						Variant::new("dark").with_payload(PayloadType::Json, r#"{"mode":"dark"}"#),
					),
				),
			)
	}

	fn evaluator() -> FlagEvaluator {
		let snapshot = FlagSnapshot::from_document(document(1)).unwrap();
		FlagEvaluator::new(Arc::new(SnapshotStore::new(snapshot)))
	}

	fn ctx() -> EvaluationContext {
		EvaluationContext::new("prod").with_user_id("user123")
	}

	#[test]
	fn test_boolean_follows_strategy() {
		let evaluator = evaluator();
		assert_eq!(
			evaluator.evaluate_boolean("new_checkout", &ctx().with_attribute("plan", "pro"), false),
			(true, EvaluationSource::FlagDefaultEnabled)
		);
		assert_eq!(
			evaluator.evaluate_boolean("new_checkout", &ctx().with_attribute("plan", "free"), true),
			(false, EvaluationSource::FlagDefaultDisabled)
		);
	}

	#[test]
	fn test_typed_values() {
		let evaluator = evaluator();
		assert_eq!(
			evaluator.evaluate_string("banner", &ctx(), "fallback"),
			("hello".to_string(), EvaluationSource::StrategyVariant)
		);
		assert_eq!(
			evaluator.evaluate_number("max_items", &ctx(), 10.0),
			(25.0, EvaluationSource::FlagDefaultEnabled)
		);
		assert_eq!(
			evaluator.evaluate_json("theme", &ctx(), json!(null)),
			(json!({"mode": "dark"}), EvaluationSource::StrategyVariant)
		);
	}

	#[test]
	fn test_missing_flag_returns_default() {
		let evaluator = evaluator();
		assert_eq!(
			evaluator.evaluate_boolean("nope", &ctx(), true),
			(true, EvaluationSource::Missing)
		);
	}

	#[test]
	fn test_number_request_on_json_flag_is_type_mismatch() {
		let evaluator = evaluator();
		assert_eq!(
			evaluator.evaluate_number("theme", &ctx(), 7.0),
			(7.0, EvaluationSource::TypeMismatch)
		);
	}

	#[test]
	fn test_caller_default_when_no_baseline() {
		let snapshot = FlagSnapshot::from_document(SnapshotDocument::new(1).with_flag(
			FeatureFlag::new("label", VariantType::String)
				.with_environment("prod", FlagEnvironment::enabled()),
		))
		.unwrap();
		let evaluator = FlagEvaluator::new(Arc::new(SnapshotStore::new(snapshot)));
		assert_eq!(
			evaluator.evaluate_string("label", &ctx(), "fallback"),
			("fallback".to_string(), EvaluationSource::CallerDefault)
		);
	}

	#[test]
	fn test_swap_is_visible_to_next_call() {
		let evaluator = evaluator();
		assert!(evaluator.evaluate("banner", &ctx()).enabled);

		let next = FlagSnapshot::from_document(SnapshotDocument::new(2)).unwrap();
		assert!(evaluator.store().replace(next));
		assert_eq!(evaluator.evaluate("banner", &ctx()).source, EvaluationSource::Missing);
	}

	#[test]
	fn test_get_all_flags() {
		let all = evaluator().get_all_flags(&ctx());
		assert_eq!(all.len(), 4);
		assert_eq!(all["banner"].value, Some(FlagValue::String("hello".into())));
		assert!(!all["new_checkout"].enabled);
	}

	#[tokio::test]
	async fn test_evaluations_are_recorded() {
		let sink = Arc::new(InMemoryMetricsSink::new());
		let (recorder, handle) = MetricsRecorder::spawn(&MetricsConfig::default(), sink.clone());
		let evaluator = evaluator().with_metrics(recorder.clone());

		evaluator.evaluate_string("banner", &ctx(), "x");
		evaluator.evaluate_string("banner", &ctx(), "x");
		evaluator.evaluate_number("theme", &ctx(), 0.0);
		evaluator.evaluate_boolean("ghost", &ctx(), false);

		recorder.flush().await.unwrap();
		assert_eq!(sink.total("banner", EvaluationSource::StrategyVariant).await, 2);
		assert_eq!(sink.total("theme", EvaluationSource::TypeMismatch).await, 1);
		assert_eq!(sink.unknown_total("ghost").await, 1);

		handle.shutdown().await;
	}
}
