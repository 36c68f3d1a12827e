// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot delivery: sources and the background refresher.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_flags_core::FlagSnapshot;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::RefreshConfig;
use crate::error::{EngineError, Result};
use crate::store::{Activation, SnapshotStore};

/// Floor for the polling period; `tokio::time::interval` rejects zero.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Somewhere a validated snapshot can be fetched from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
	fn name(&self) -> &'static str;

	async fn fetch(&self) -> Result<FlagSnapshot>;
}

/// Source serving a fixed JSON document.
pub struct StaticSource {
	json: String,
}

impl StaticSource {
	pub fn new(json: impl Into<String>) -> Self {
		Self { json: json.into() }
	}
}

#[async_trait]
impl SnapshotSource for StaticSource {
	fn name(&self) -> &'static str {
		"static"
	}

	async fn fetch(&self) -> Result<FlagSnapshot> {
		Ok(FlagSnapshot::from_json(&self.json)?)
	}
}

/// Source reading a JSON document from disk on every fetch.
pub struct FileSource {
	path: PathBuf,
}

impl FileSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

#[async_trait]
impl SnapshotSource for FileSource {
	fn name(&self) -> &'static str {
		"file"
	}

	async fn fetch(&self) -> Result<FlagSnapshot> {
		debug!(path = %self.path.display(), "reading flag snapshot");
		let content = tokio::fs::read_to_string(&self.path)
			.await
			.map_err(|e| EngineError::Io {
				path: self.path.clone(),
				source: e,
			})?;
		Ok(FlagSnapshot::from_json(&content)?)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
	Activated { version: u64, generation: u64 },
	/// The source served the version that is already active.
	Unchanged { version: u64 },
	Stale { active: u64, offered: u64 },
}

/// Polls a [`SnapshotSource`] and activates what it serves.
pub struct SnapshotRefresher {
	store: Arc<SnapshotStore>,
	source: Arc<dyn SnapshotSource>,
	interval: Duration,
	timeout: Duration,
}

impl SnapshotRefresher {
	pub fn new(store: Arc<SnapshotStore>, source: Arc<dyn SnapshotSource>, config: &RefreshConfig) -> Self {
		Self {
			store,
			source,
			interval: config.interval.max(MIN_INTERVAL),
			timeout: config.timeout,
		}
	}

	/// Fetches once, bounded by the configured timeout, and offers the result
	/// to the store. Failures leave the active snapshot in place.
	pub async fn refresh_once(&self) -> Result<RefreshOutcome> {
		let snapshot = tokio::time::timeout(self.timeout, self.source.fetch())
			.await
			.map_err(|_| EngineError::RefreshTimeout(self.timeout))??;

		let active = self.store.version();
		if snapshot.version() == active {
			return Ok(RefreshOutcome::Unchanged { version: active });
		}

		Ok(match self.store.activate(snapshot) {
			Activation::Activated {
				version,
				generation,
			} => RefreshOutcome::Activated {
				version,
				generation,
			},
			Activation::Stale { active, offered } => RefreshOutcome::Stale { active, offered },
		})
	}

	/// Spawns the polling loop. The first fetch happens immediately.
	pub fn spawn(self) -> RefresherHandle {
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let task = tokio::spawn(self.run(shutdown_rx));
		RefresherHandle {
			shutdown: Some(shutdown_tx),
			task,
		}
	}

	async fn run(self, mut shutdown: oneshot::Receiver<()>) {
		info!(
			source = self.source.name(),
			interval_ms = self.interval.as_millis() as u64,
			timeout_ms = self.timeout.as_millis() as u64,
			"Starting flag snapshot refresher"
		);

		let mut ticker = tokio::time::interval(self.interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = &mut shutdown => break,
				_ = ticker.tick() => {
					match self.refresh_once().await {
						Ok(RefreshOutcome::Activated { version, generation }) => {
							debug!(version, generation, "refresh activated snapshot");
						}
						Ok(RefreshOutcome::Unchanged { version }) => {
							debug!(version, "snapshot unchanged");
						}
						Ok(RefreshOutcome::Stale { active, offered }) => {
							warn!(active, offered, "source served an older snapshot");
						}
						Err(e) => {
							error!(source = self.source.name(), error = %e, "Failed to refresh flag snapshot");
						}
					}
				}
			}
		}

		info!("Flag snapshot refresher stopped");
	}
}

/// Handle to a running refresher task.
pub struct RefresherHandle {
	shutdown: Option<oneshot::Sender<()>>,
	task: JoinHandle<()>,
}

impl RefresherHandle {
	/// Signals the loop to stop and waits for it.
	pub async fn shutdown(mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
		if let Err(e) = (&mut self.task).await {
			error!(error = %e, "flag snapshot refresher panicked");
		}
	}
}
