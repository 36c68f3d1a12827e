// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag evaluation engine for Loom.
//!
//! This crate evaluates the definitions from `loom-flags-core` for a caller's
//! context: pinned hashing, rollout gates, weighted variants, segment
//! resolution and the fallback chain, plus the runtime pieces around them.
//!
//! # Architecture
//!
//! - `hashing` - Pinned bucketing hash per hash version
//! - `rollout` - Percentage gate and stickiness resolution
//! - `variants` - Weight normalization and variant selection
//! - `segments` - Segment reference resolution
//! - `evaluation` - Per-flag orchestration
//! - `store` / `refresh` - Atomic snapshot swap and background polling
//! - `metrics` - Non-blocking evaluation counters
//! - `client` - Typed evaluator facade
//! - `engine` - Config-driven assembly of the evaluator and background tasks
//! - `config` / `logging` - Layered configuration and tracing setup
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use loom_flags_engine::{EvaluationContext, EvaluationSource, FlagEvaluator, SnapshotStore};
//!
//! let store = SnapshotStore::from_json(
//!     r#"{
//!         "version": 1,
//!         "flags": [{
//!             "key": "feature.new_flow",
//!             "variantType": "boolean",
//!             "environments": {
//!                 "prod": {
//!                     "enabled": true,
//!                     "strategies": [{ "id": "everyone", "rolloutPercentage": 100 }]
//!                 }
//!             }
//!         }]
//!     }"#,
//! )
//! .unwrap();
//!
//! let evaluator = FlagEvaluator::new(Arc::new(store));
//! let ctx = EvaluationContext::new("prod").with_user_id("user123");
//!
//! let (enabled, source) = evaluator.evaluate_boolean("feature.new_flow", &ctx, false);
//! assert!(enabled);
//! assert_eq!(source, EvaluationSource::FlagDefaultEnabled);
//! ```

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod hashing;
pub mod logging;
pub mod metrics;
pub mod refresh;
pub mod rollout;
pub mod segments;
pub mod store;
pub mod variants;

pub use client::FlagEvaluator;
pub use config::{load_config, load_config_with_file, ConfigError, EngineConfig};
pub use engine::FlagEngine;
pub use error::{EngineError, Result};
pub use evaluation::{evaluate_all, evaluate_flag, evaluate_flag_as};
pub use metrics::{
	InMemoryMetricsSink, MetricsBatch, MetricsEvent, MetricsHandle, MetricsRecorder, MetricsSink,
	NoOpMetricsSink,
};
pub use refresh::{
	FileSource, RefreshOutcome, RefresherHandle, SnapshotRefresher, SnapshotSource, StaticSource,
};
pub use store::{Activation, SnapshotStore};

// Re-export core types for convenience
pub use loom_flags_core::*;
