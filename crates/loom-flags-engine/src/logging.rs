// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::error::{EngineError, Result};

/// Builds the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
	match EnvFilter::try_from_default_env() {
		Ok(filter) => Ok(filter),
		Err(_) => EnvFilter::try_new(&config.level)
			.map_err(|e| EngineError::Logging(format!("invalid log level '{}': {e}", config.level))),
	}
}

/// Installs the global tracing subscriber. Fails if one is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
	let filter = env_filter(config)?;
	let json = config.json;

	tracing_subscriber::registry()
		.with(filter)
		.with(json.then(|| tracing_subscriber::fmt::layer().json()))
		.with((!json).then(tracing_subscriber::fmt::layer))
		.try_init()
		.map_err(|e| EngineError::Logging(e.to_string()))
}
