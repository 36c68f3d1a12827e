// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Engine assembly from an [`EngineConfig`].
//!
//! Starts the pieces the configuration asks for: a file refresher when
//! `refresh.snapshot_path` is set and a metrics aggregator when
//! `metrics.enabled` is true. Both are optional; evaluation works without
//! either.

use std::sync::Arc;

use tracing::{info, warn};

use crate::client::FlagEvaluator;
use crate::config::EngineConfig;
use crate::metrics::{MetricsHandle, MetricsRecorder, MetricsSink};
use crate::refresh::{FileSource, RefresherHandle, SnapshotRefresher, SnapshotSource};
use crate::store::SnapshotStore;

/// A running engine: the evaluator plus its background tasks.
pub struct FlagEngine {
	evaluator: FlagEvaluator,
	refresher: Option<RefresherHandle>,
	metrics: Option<MetricsHandle>,
}

impl FlagEngine {
	/// Starts an engine over an empty store, polling `refresh.snapshot_path`
	/// if one is configured.
	pub async fn start(config: &EngineConfig, sink: Arc<dyn MetricsSink>) -> Self {
		let source = config
			.refresh
			.snapshot_path
			.as_ref()
			.map(|path| Arc::new(FileSource::new(path)) as Arc<dyn SnapshotSource>);
		Self::start_with_source(config, Arc::new(SnapshotStore::empty()), source, sink).await
	}

	/// Starts an engine over `store` with an explicit snapshot source.
	///
	/// The first fetch completes before this returns. A failed first fetch is
	/// logged and the store keeps whatever it already holds.
	pub async fn start_with_source(
		config: &EngineConfig,
		store: Arc<SnapshotStore>,
		source: Option<Arc<dyn SnapshotSource>>,
		sink: Arc<dyn MetricsSink>,
	) -> Self {
		let refresher = match source {
			Some(source) => {
				let refresher = SnapshotRefresher::new(store.clone(), source, &config.refresh);
				if let Err(e) = refresher.refresh_once().await {
					warn!(error = %e, "Initial flag snapshot fetch failed");
				}
				Some(refresher.spawn())
			}
			None => {
				info!("No snapshot source configured, flag refresh disabled");
				None
			}
		};

		let mut evaluator = FlagEvaluator::new(store);
		let metrics = if config.metrics.enabled {
			let (recorder, handle) = MetricsRecorder::spawn(&config.metrics, sink);
			evaluator = evaluator.with_metrics(recorder);
			Some(handle)
		} else {
			info!("Flag evaluation metrics disabled");
			None
		};

		Self {
			evaluator,
			refresher,
			metrics,
		}
	}

	pub fn evaluator(&self) -> &FlagEvaluator {
		&self.evaluator
	}

	pub fn is_refreshing(&self) -> bool {
		self.refresher.is_some()
	}

	pub fn has_metrics(&self) -> bool {
		self.metrics.is_some()
	}

	/// Stops the refresher, then drains and stops the metrics aggregator.
	pub async fn shutdown(self) {
		if let Some(refresher) = self.refresher {
			refresher.shutdown().await;
		}
		if let Some(metrics) = self.metrics {
			metrics.shutdown().await;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{load_config_from_sources, DefaultsSource, EnvSource};
	use crate::metrics::InMemoryMetricsSink;
	use loom_flags_core::{EvaluationContext, EvaluationSource};

	const DOCUMENT: &str = r#"{
		"version": 4,
		"flags": [{
			"key": "search.v2",
			"variantType": "boolean",
			"environments": { "prod": { "enabled": true } }
		}]
	}"#;

	fn ctx() -> EvaluationContext {
		EvaluationContext::new("prod").with_user_id("user1")
	}

	#[tokio::test]
	async fn snapshot_path_drives_file_refresh() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("flags.json");
		std::fs::write(&path, DOCUMENT).unwrap();

		let path_str = path.to_string_lossy().into_owned();
		let config = load_config_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(EnvSource::with_vars([(
				"LOOM_FLAGS_REFRESH_SNAPSHOT_PATH",
				path_str.as_str(),
			)])),
		])
		.unwrap();

		let engine = FlagEngine::start(&config, Arc::new(InMemoryMetricsSink::new())).await;
		assert!(engine.is_refreshing());
		assert_eq!(engine.evaluator().store().version(), 4);
		assert_eq!(
			engine.evaluator().evaluate_boolean("search.v2", &ctx(), false),
			(true, EvaluationSource::FlagDefaultEnabled)
		);

		engine.shutdown().await;
	}

	#[tokio::test]
	async fn no_snapshot_path_means_no_refresher() {
		let engine = FlagEngine::start(
			&EngineConfig::default(),
			Arc::new(InMemoryMetricsSink::new()),
		)
		.await;
		assert!(!engine.is_refreshing());
		assert_eq!(engine.evaluator().store().version(), 0);
		engine.shutdown().await;
	}

	#[tokio::test]
	async fn metrics_enabled_records_evaluations() {
		let sink = Arc::new(InMemoryMetricsSink::new());
		let store = Arc::new(SnapshotStore::from_json(DOCUMENT).unwrap());
		let engine =
			FlagEngine::start_with_source(&EngineConfig::default(), store, None, sink.clone()).await;
		assert!(engine.has_metrics());

		engine.evaluator().evaluate("search.v2", &ctx());
		engine.shutdown().await;

		assert_eq!(sink.total("search.v2", EvaluationSource::FlagDefaultEnabled).await, 1);
	}

	#[tokio::test]
	async fn metrics_disabled_records_nothing() {
		let config = load_config_from_sources(vec![
			Box::new(DefaultsSource),
			Box::new(EnvSource::with_vars([("LOOM_FLAGS_METRICS_ENABLED", "false")])),
		])
		.unwrap();
		assert!(!config.metrics.enabled);

		let sink = Arc::new(InMemoryMetricsSink::new());
		let store = Arc::new(SnapshotStore::from_json(DOCUMENT).unwrap());
		let engine = FlagEngine::start_with_source(&config, store, None, sink.clone()).await;
		assert!(!engine.has_metrics());
		assert!(engine.evaluator().metrics().is_none());

		engine.evaluator().evaluate("search.v2", &ctx());
		engine.shutdown().await;

		assert!(sink.batches().await.is_empty());
	}
}
