// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the flag engine.
//!
//! Evaluation itself never fails; these cover snapshot delivery, metrics
//! sinks and start-up.

use std::path::PathBuf;
use std::time::Duration;

use loom_flags_core::FlagsError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
	#[error("snapshot rejected: {0}")]
	Snapshot(#[from] FlagsError),

	#[error("failed to read snapshot file {path}: {source}")]
	Io {
		path: PathBuf,
		source: std::io::Error,
	},

	#[error("snapshot fetch timed out after {0:?}")]
	RefreshTimeout(Duration),

	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	#[error("failed to initialize logging: {0}")]
	Logging(String),

	#[error("metrics sink error: {0}")]
	Sink(String),

	#[error("metrics aggregator has stopped")]
	MetricsStopped,
}
