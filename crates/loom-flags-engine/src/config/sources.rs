// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files and environment variables.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, trace};

use super::error::ConfigError;
use super::layer::EngineConfigLayer;
use super::sections::{LoggingConfigLayer, MetricsConfigLayer, RefreshConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<EngineConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<EngineConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(EngineConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is an empty layer.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/loom/flags.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<EngineConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(EngineConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: EngineConfigLayer = toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
			path: self.path.clone(),
			source: e,
		})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: LOOM_FLAGS_<SECTION>_<FIELD>
#[derive(Debug, Default)]
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads the process environment.
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn with_vars<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: Into<String>,
		V: Into<String>,
	{
		Self {
			vars: Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect()),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self
			.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}

	fn parse<T: FromStr>(&self, name: &str, kind: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {kind} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn load_refresh(&self) -> Result<RefreshConfigLayer, ConfigError> {
		Ok(RefreshConfigLayer {
			interval_secs: self.parse("LOOM_FLAGS_REFRESH_INTERVAL_SECS", "u64")?,
			timeout_ms: self.parse("LOOM_FLAGS_REFRESH_TIMEOUT_MS", "u64")?,
			snapshot_path: self.var("LOOM_FLAGS_REFRESH_SNAPSHOT_PATH").map(PathBuf::from),
		})
	}

	fn load_metrics(&self) -> Result<MetricsConfigLayer, ConfigError> {
		Ok(MetricsConfigLayer {
			enabled: self.bool("LOOM_FLAGS_METRICS_ENABLED"),
			channel_capacity: self.parse("LOOM_FLAGS_METRICS_CHANNEL_CAPACITY", "usize")?,
			flush_interval_secs: self.parse("LOOM_FLAGS_METRICS_FLUSH_INTERVAL_SECS", "u64")?,
			bucket_width_secs: self.parse("LOOM_FLAGS_METRICS_BUCKET_WIDTH_SECS", "u64")?,
		})
	}

	fn load_logging(&self) -> LoggingConfigLayer {
		LoggingConfigLayer {
			level: self.var("LOOM_FLAGS_LOG_LEVEL"),
			json: self.bool("LOOM_FLAGS_LOG_JSON"),
		}
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<EngineConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(EngineConfigLayer {
			refresh: Some(self.load_refresh()?),
			metrics: Some(self.load_metrics()?),
			logging: Some(self.load_logging()),
		})
	}
}
