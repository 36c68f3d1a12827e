// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Layered engine configuration.
//!
//! Precedence (highest to lowest):
//! 1. Environment variables (`LOOM_FLAGS_*`)
//! 2. Config file (`/etc/loom/flags.toml` unless overridden)
//! 3. Built-in defaults

mod error;
mod layer;
mod sections;
mod sources;

pub use error::ConfigError;
pub use layer::EngineConfigLayer;
pub use sections::{
	LoggingConfig, LoggingConfigLayer, MetricsConfig, MetricsConfigLayer, RefreshConfig,
	RefreshConfigLayer,
};
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use tracing::{debug, info};

/// Fully resolved engine configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
	pub refresh: RefreshConfig,
	pub metrics: MetricsConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
pub fn load_config() -> Result<EngineConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::new()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<EngineConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge the given sources in precedence order and resolve the result.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<EngineConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = EngineConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	finalize(merged)
}

fn finalize(layer: EngineConfigLayer) -> Result<EngineConfig, ConfigError> {
	let config = EngineConfig {
		refresh: layer.refresh.unwrap_or_default().finalize(),
		metrics: layer.metrics.unwrap_or_default().finalize(),
		logging: layer.logging.unwrap_or_default().finalize(),
	};

	validate_config(&config)?;

	info!(
		refresh_interval_secs = config.refresh.interval.as_secs(),
		refresh_timeout_ms = config.refresh.timeout.as_millis() as u64,
		snapshot_path = ?config.refresh.snapshot_path,
		metrics_enabled = config.metrics.enabled,
		log_level = %config.logging.level,
		"Flag engine configuration loaded"
	);

	Ok(config)
}

fn validate_config(config: &EngineConfig) -> Result<(), ConfigError> {
	if config.refresh.interval.is_zero() {
		return Err(ConfigError::Validation(
			"refresh interval must be greater than zero".to_string(),
		));
	}
	if config.refresh.timeout.is_zero() {
		return Err(ConfigError::Validation(
			"refresh timeout must be greater than zero".to_string(),
		));
	}
	if config.metrics.channel_capacity == 0 {
		return Err(ConfigError::Validation(
			"metrics channel capacity must be greater than zero".to_string(),
		));
	}
	if config.metrics.flush_interval.is_zero() {
		return Err(ConfigError::Validation(
			"metrics flush interval must be greater than zero".to_string(),
		));
	}
	if config.metrics.bucket_width.is_zero() {
		return Err(ConfigError::Validation(
			"metrics bucket width must be at least one second".to_string(),
		));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;
	use std::time::Duration;

	#[test]
	fn test_defaults_only() {
		let config = load_config_from_sources(vec![Box::new(DefaultsSource)]).unwrap();
		assert_eq!(config, EngineConfig::default());
	}

	#[test]
	fn test_env_overrides_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"[refresh]\ninterval_secs = 15\ntimeout_ms = 900\n\n[metrics]\nbucket_width_secs = 300"
		)
		.unwrap();

		let config = load_config_from_sources(vec![
			Box::new(EnvSource::with_vars([("LOOM_FLAGS_REFRESH_INTERVAL_SECS", "5")])),
			Box::new(TomlSource::new(file.path())),
			Box::new(DefaultsSource),
		])
		.unwrap();

		assert_eq!(config.refresh.interval, Duration::from_secs(5));
		assert_eq!(config.refresh.timeout, Duration::from_millis(900));
		assert_eq!(config.metrics.bucket_width, Duration::from_secs(300));
		assert_eq!(config.metrics.flush_interval, Duration::from_secs(60));
	}

	#[test]
	fn test_zero_interval_rejected() {
		let result = load_config_from_sources(vec![Box::new(EnvSource::with_vars([(
			"LOOM_FLAGS_REFRESH_INTERVAL_SECS",
			"0",
		)]))]);
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_zero_capacity_rejected() {
		let result = load_config_from_sources(vec![Box::new(EnvSource::with_vars([(
			"LOOM_FLAGS_METRICS_CHANNEL_CAPACITY",
			"0",
		)]))]);
		assert!(result.unwrap_err().to_string().contains("capacity"));
	}
}
