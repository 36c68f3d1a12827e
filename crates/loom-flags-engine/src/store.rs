// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Atomically swappable snapshot holder.
//!
//! Readers take one `Arc` per evaluation call and keep using it even if a
//! newer snapshot is activated mid-call. Writers are serialized so the
//! version check and the swap happen together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use loom_flags_core::FlagSnapshot;
use tracing::{info, warn};

use crate::error::Result;

/// Outcome of offering a snapshot to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
	Activated { version: u64, generation: u64 },
	/// The offered version is older than the active one.
	Stale { active: u64, offered: u64 },
}

impl Activation {
	pub fn is_activated(&self) -> bool {
		matches!(self, Activation::Activated { .. })
	}
}

pub struct SnapshotStore {
	current: ArcSwap<FlagSnapshot>,
	generation: AtomicU64,
	writer: Mutex<()>,
}

impl SnapshotStore {
	pub fn new(snapshot: FlagSnapshot) -> Self {
		log_lint(&snapshot);
		Self {
			current: ArcSwap::from_pointee(snapshot),
			generation: AtomicU64::new(1),
			writer: Mutex::new(()),
		}
	}

	/// Store holding an empty snapshot at version 0.
	pub fn empty() -> Self {
		Self::new(FlagSnapshot::empty())
	}

	/// Parses and activates a JSON snapshot document.
	pub fn from_json(json: &str) -> Result<Self> {
		Ok(Self::new(FlagSnapshot::from_json(json)?))
	}

	/// The active snapshot. Lock-free.
	pub fn current(&self) -> Arc<FlagSnapshot> {
		self.current.load_full()
	}

	pub fn version(&self) -> u64 {
		self.current.load().version()
	}

	/// Number of snapshots activated over the store's lifetime.
	pub fn generation(&self) -> u64 {
		self.generation.load(Ordering::Acquire)
	}

	/// Activates `snapshot` unless it is older than the active one. Returns
	/// whether the swap happened.
	pub fn replace(&self, snapshot: FlagSnapshot) -> bool {
		self.activate(snapshot).is_activated()
	}

	pub fn activate(&self, snapshot: FlagSnapshot) -> Activation {
		let _guard = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

		let active = self.current.load().version();
		let offered = snapshot.version();
		if offered < active {
			warn!(active, offered, "refusing stale flag snapshot");
			return Activation::Stale { active, offered };
		}

		log_lint(&snapshot);
		self.current.store(Arc::new(snapshot));
		let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
		info!(
			version = offered,
			generation,
			previous_version = active,
			"activated flag snapshot"
		);
		Activation::Activated {
			version: offered,
			generation,
		}
	}

	/// Parses `json` and activates it. Rejected documents leave the active
	/// snapshot untouched.
	pub fn replace_json(&self, json: &str) -> Result<bool> {
		let snapshot = FlagSnapshot::from_json(json)?;
		Ok(self.replace(snapshot))
	}
}

impl Default for SnapshotStore {
	fn default() -> Self {
		Self::empty()
	}
}

fn log_lint(snapshot: &FlagSnapshot) {
	for warning in snapshot.lint() {
		warn!(version = snapshot.version(), %warning, "flag configuration warning");
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use loom_flags_core::{FeatureFlag, SnapshotDocument, VariantType};

	fn snapshot(version: u64) -> FlagSnapshot {
		FlagSnapshot::from_document(
			SnapshotDocument::new(version)
				.with_flag(FeatureFlag::new(format!("flag.v{version}"), VariantType::Boolean)),
		)
		.unwrap()
	}

	#[test]
	fn newer_snapshot_replaces_active() {
		let store = SnapshotStore::new(snapshot(1));
		assert_eq!(store.generation(), 1);

		assert!(store.replace(snapshot(2)));
		assert_eq!(store.version(), 2);
		assert_eq!(store.generation(), 2);
		assert!(store.current().flag("flag.v2").is_some());
	}

	#[test]
	fn stale_snapshot_is_refused() {
		let store = SnapshotStore::new(snapshot(5));
		assert_eq!(
			store.activate(snapshot(3)),
			Activation::Stale {
				active: 5,
				offered: 3
			}
		);
		assert_eq!(store.version(), 5);
		assert_eq!(store.generation(), 1);
	}

	#[test]
	fn equal_version_is_reactivated() {
		let store = SnapshotStore::new(snapshot(2));
		assert!(store.replace(snapshot(2)));
		assert_eq!(store.generation(), 2);
	}

	#[test]
	fn held_snapshot_survives_swap() {
		let store = SnapshotStore::new(snapshot(1));
		let held = store.current();
		store.replace(snapshot(2));
		assert_eq!(held.version(), 1);
		assert!(held.flag("flag.v1").is_some());
		assert_eq!(store.current().version(), 2);
	}

	#[test]
	fn rejected_json_keeps_active_snapshot() {
		let store = SnapshotStore::new(snapshot(1));
		assert!(store.replace_json("{not json").is_err());
		assert!(store.replace_json(r#"{"version": 9, "hashVersion": "sha1"}"#).is_err());
		assert_eq!(store.version(), 1);
	}

	#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
	async fn concurrent_readers_see_whole_snapshots() {
		let store = Arc::new(SnapshotStore::new(snapshot(1)));

		let mut readers = Vec::new();
		for _ in 0..4 {
			let store = Arc::clone(&store);
			readers.push(tokio::spawn(async move {
				for _ in 0..1000 {
					let current = store.current();
					let key = format!("flag.v{}", current.version());
					assert!(current.flag(&key).is_some());
					tokio::task::yield_now().await;
				}
			}));
		}

		for version in 2..50 {
			store.replace(snapshot(version));
			tokio::task::yield_now().await;
		}

		for reader in readers {
			reader.await.unwrap();
		}
		assert_eq!(store.version(), 49);
	}
}
