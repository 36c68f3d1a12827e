// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation metrics: a non-blocking recorder and a background aggregator.
//!
//! Recording never waits. Events go through a bounded channel and are dropped
//! (and counted) when it is full. The aggregator folds events into counters
//! keyed by flag, source and time bucket, and periodically hands a
//! [`MetricsBatch`] to a [`MetricsSink`]. Delivery is best-effort: a batch the
//! sink rejects is logged and discarded.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loom_flags_core::EvaluationSource;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::config::MetricsConfig;
use crate::error::{EngineError, Result};

/// Floor for the flush period; `tokio::time::interval` rejects zero.
const MIN_FLUSH_INTERVAL: Duration = Duration::from_millis(1);

/// One evaluation, already bucketed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsEvent {
	pub flag_key: String,
	pub source: EvaluationSource,
	/// Unix seconds at the start of the bucket.
	pub timestamp_bucket: i64,
}

impl MetricsEvent {
	pub fn new(
		flag_key: impl Into<String>,
		source: EvaluationSource,
		at: DateTime<Utc>,
		bucket_width: Duration,
	) -> Self {
		Self {
			flag_key: flag_key.into(),
			source,
			timestamp_bucket: bucket_start(at, bucket_width),
		}
	}
}

fn bucket_start(at: DateTime<Utc>, width: Duration) -> i64 {
	let width = width.as_secs().max(1) as i64;
	let seconds = at.timestamp();
	seconds - seconds.rem_euclid(width)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricCount {
	pub flag_key: String,
	pub source: EvaluationSource,
	pub timestamp_bucket: i64,
	pub count: u64,
}

/// Counters accumulated since the previous flush.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsBatch {
	/// Sorted by bucket, then flag key, then source.
	pub counts: Vec<MetricCount>,
	/// Evaluations of keys absent from the snapshot.
	pub unknown_flags: BTreeMap<String, u64>,
	/// Events dropped because the channel was full.
	pub dropped: u64,
}

impl MetricsBatch {
	pub fn is_empty(&self) -> bool {
		self.counts.is_empty() && self.unknown_flags.is_empty() && self.dropped == 0
	}

	pub fn total(&self, flag_key: &str, source: EvaluationSource) -> u64 {
		self.counts
			.iter()
			.filter(|c| c.flag_key == flag_key && c.source == source)
			.map(|c| c.count)
			.sum()
	}
}

/// Destination for flushed batches.
#[async_trait]
pub trait MetricsSink: Send + Sync {
	async fn publish(&self, batch: MetricsBatch) -> Result<()>;
}

pub struct NoOpMetricsSink;

#[async_trait]
impl MetricsSink for NoOpMetricsSink {
	async fn publish(&self, _batch: MetricsBatch) -> Result<()> {
		Ok(())
	}
}

/// Keeps every published batch in memory.
#[derive(Default)]
pub struct InMemoryMetricsSink {
	batches: Mutex<Vec<MetricsBatch>>,
}

impl InMemoryMetricsSink {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn batches(&self) -> Vec<MetricsBatch> {
		self.batches.lock().await.clone()
	}

	/// Count for one flag and source summed over every batch.
	pub async fn total(&self, flag_key: &str, source: EvaluationSource) -> u64 {
		self
			.batches
			.lock()
			.await
			.iter()
			.map(|batch| batch.total(flag_key, source))
			.sum()
	}

	pub async fn unknown_total(&self, flag_key: &str) -> u64 {
		self
			.batches
			.lock()
			.await
			.iter()
			.filter_map(|batch| batch.unknown_flags.get(flag_key))
			.sum()
	}
}

#[async_trait]
impl MetricsSink for InMemoryMetricsSink {
	async fn publish(&self, batch: MetricsBatch) -> Result<()> {
		self.batches.lock().await.push(batch);
		Ok(())
	}
}

#[derive(Debug)]
enum MetricsCommand {
	Record(MetricsEvent),
	Flush(oneshot::Sender<()>),
}

/// Cheap to clone; every clone feeds the same aggregator.
#[derive(Clone)]
pub struct MetricsRecorder {
	tx: mpsc::Sender<MetricsCommand>,
	dropped: Arc<AtomicU64>,
	bucket_width: Duration,
}

impl MetricsRecorder {
	/// Creates a recorder and the aggregator it feeds, without starting it.
	pub fn channel(config: &MetricsConfig) -> (MetricsRecorder, MetricsAggregator) {
		let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
		let dropped = Arc::new(AtomicU64::new(0));
		let recorder = MetricsRecorder {
			tx,
			dropped: dropped.clone(),
			bucket_width: config.bucket_width,
		};
		let aggregator = MetricsAggregator {
			rx,
			dropped,
			reported_dropped: 0,
			flush_interval: config.flush_interval.max(MIN_FLUSH_INTERVAL),
			counts: HashMap::new(),
			unknown: HashMap::new(),
		};
		(recorder, aggregator)
	}

	/// Creates a recorder and spawns its aggregator.
	pub fn spawn(config: &MetricsConfig, sink: Arc<dyn MetricsSink>) -> (MetricsRecorder, MetricsHandle) {
		let (recorder, aggregator) = Self::channel(config);
		(recorder, aggregator.spawn(sink))
	}

	pub fn record(&self, flag_key: &str, source: EvaluationSource) {
		self.record_at(flag_key, source, Utc::now());
	}

	pub fn record_at(&self, flag_key: &str, source: EvaluationSource, at: DateTime<Utc>) {
		let event = MetricsEvent::new(flag_key, source, at, self.bucket_width);
		match self.tx.try_send(MetricsCommand::Record(event)) {
			Ok(()) => {}
			Err(TrySendError::Full(_)) => {
				self.dropped.fetch_add(1, Ordering::Relaxed);
				debug!(flag_key, "metrics channel full, dropping event");
			}
			Err(TrySendError::Closed(_)) => {
				self.dropped.fetch_add(1, Ordering::Relaxed);
			}
		}
	}

	/// Total events dropped over the recorder's lifetime.
	pub fn dropped(&self) -> u64 {
		self.dropped.load(Ordering::Relaxed)
	}

	/// Asks the aggregator to flush now and waits until it has.
	pub async fn flush(&self) -> Result<()> {
		let (ack_tx, ack_rx) = oneshot::channel();
		self
			.tx
			.send(MetricsCommand::Flush(ack_tx))
			.await
			.map_err(|_| EngineError::MetricsStopped)?;
		ack_rx.await.map_err(|_| EngineError::MetricsStopped)
	}
}

/// Receiving half of the metrics channel.
pub struct MetricsAggregator {
	rx: mpsc::Receiver<MetricsCommand>,
	dropped: Arc<AtomicU64>,
	reported_dropped: u64,
	flush_interval: Duration,
	counts: HashMap<MetricsEvent, u64>,
	unknown: HashMap<String, u64>,
}

impl MetricsAggregator {
	pub fn spawn(self, sink: Arc<dyn MetricsSink>) -> MetricsHandle {
		let (shutdown_tx, shutdown_rx) = oneshot::channel();
		let task = tokio::spawn(self.run(sink, shutdown_rx));
		MetricsHandle {
			shutdown: Some(shutdown_tx),
			task,
		}
	}

	fn add(&mut self, event: MetricsEvent) {
		if event.source == EvaluationSource::Missing {
			*self.unknown.entry(event.flag_key).or_default() += 1;
		} else {
			*self.counts.entry(event).or_default() += 1;
		}
	}

	fn take_batch(&mut self) -> MetricsBatch {
		let dropped_total = self.dropped.load(Ordering::Relaxed);
		let dropped = dropped_total - self.reported_dropped;
		self.reported_dropped = dropped_total;

		let mut counts: Vec<MetricCount> = self
			.counts
			.drain()
			.map(|(event, count)| MetricCount {
				flag_key: event.flag_key,
				source: event.source,
				timestamp_bucket: event.timestamp_bucket,
				count,
			})
			.collect();
		counts.sort_by(|a, b| {
			(a.timestamp_bucket, &a.flag_key, a.source).cmp(&(b.timestamp_bucket, &b.flag_key, b.source))
		});

		MetricsBatch {
			counts,
			unknown_flags: self.unknown.drain().collect(),
			dropped,
		}
	}

	async fn flush(&mut self, sink: &dyn MetricsSink) {
		let batch = self.take_batch();
		if batch.is_empty() {
			return;
		}

		debug!(
			counters = batch.counts.len(),
			unknown_flags = batch.unknown_flags.len(),
			dropped = batch.dropped,
			"Flushing flag metrics"
		);
		if let Err(e) = sink.publish(batch).await {
			error!(error = %e, "Failed to publish flag metrics, discarding batch");
		}
	}

	async fn run(mut self, sink: Arc<dyn MetricsSink>, mut shutdown: oneshot::Receiver<()>) {
		info!(
			flush_interval_ms = self.flush_interval.as_millis() as u64,
			"Starting flag metrics aggregator"
		);

		let mut ticker = tokio::time::interval(self.flush_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				command = self.rx.recv() => match command {
					Some(MetricsCommand::Record(event)) => self.add(event),
					Some(MetricsCommand::Flush(ack)) => {
						self.flush(sink.as_ref()).await;
						let _ = ack.send(());
					}
					None => {
						self.flush(sink.as_ref()).await;
						break;
					}
				},
				_ = ticker.tick() => self.flush(sink.as_ref()).await,
				_ = &mut shutdown => {
					while let Ok(command) = self.rx.try_recv() {
						match command {
							MetricsCommand::Record(event) => self.add(event),
							MetricsCommand::Flush(ack) => {
								let _ = ack.send(());
							}
						}
					}
					self.flush(sink.as_ref()).await;
					break;
				}
			}
		}

		info!("Flag metrics aggregator stopped");
	}
}

/// Handle to a running aggregator.
pub struct MetricsHandle {
	shutdown: Option<oneshot::Sender<()>>,
	task: JoinHandle<()>,
}

impl MetricsHandle {
	/// Drains queued events, flushes once more and stops the aggregator.
	pub async fn shutdown(mut self) {
		if let Some(tx) = self.shutdown.take() {
			let _ = tx.send(());
		}
		if let Err(e) = (&mut self.task).await {
			error!(error = %e, "flag metrics aggregator panicked");
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn config(capacity: usize) -> MetricsConfig {
		MetricsConfig {
			enabled: true,
			channel_capacity: capacity,
			flush_interval: Duration::from_secs(3600),
			bucket_width: Duration::from_secs(60),
		}
	}

	struct FailingSink;

	#[async_trait]
	impl MetricsSink for FailingSink {
		async fn publish(&self, _batch: MetricsBatch) -> Result<()> {
			Err(EngineError::Sink("mock failure".to_string()))
		}
	}

	#[test]
	fn events_are_truncated_to_bucket() {
		let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 34, 56).unwrap();
		let event = MetricsEvent::new("f", EvaluationSource::CallerDefault, at, Duration::from_secs(60));
		let expected = Utc.with_ymd_and_hms(2025, 3, 1, 12, 34, 0).unwrap().timestamp();
		assert_eq!(event.timestamp_bucket, expected);
	}

	#[test]
	fn zero_width_bucket_is_one_second() {
		let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 34, 56).unwrap();
		let event = MetricsEvent::new("f", EvaluationSource::CallerDefault, at, Duration::ZERO);
		assert_eq!(event.timestamp_bucket, at.timestamp());
	}

	#[tokio::test]
	async fn full_channel_drops_and_counts() {
		let (recorder, _aggregator) = MetricsRecorder::channel(&config(2));
		for _ in 0..5 {
			recorder.record("f", EvaluationSource::StrategyVariant);
		}
		assert_eq!(recorder.dropped(), 3);
	}

	#[tokio::test]
	async fn flush_publishes_aggregated_counts() {
		let sink = Arc::new(InMemoryMetricsSink::new());
		let (recorder, handle) = MetricsRecorder::spawn(&config(100), sink.clone());

		let at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 5).unwrap();
		for _ in 0..3 {
			recorder.record_at("checkout", EvaluationSource::StrategyVariant, at);
		}
		recorder.record_at("checkout", EvaluationSource::FlagDefaultDisabled, at);
		recorder.record_at("ghost", EvaluationSource::Missing, at);
		recorder.record_at("ghost", EvaluationSource::Missing, at);

		recorder.flush().await.unwrap();

		assert_eq!(sink.total("checkout", EvaluationSource::StrategyVariant).await, 3);
		assert_eq!(sink.total("checkout", EvaluationSource::FlagDefaultDisabled).await, 1);
		assert_eq!(sink.unknown_total("ghost").await, 2);
		assert_eq!(sink.total("ghost", EvaluationSource::Missing).await, 0);

		handle.shutdown().await;
	}

	#[tokio::test]
	async fn separate_buckets_are_separate_counters() {
		let sink = Arc::new(InMemoryMetricsSink::new());
		let (recorder, handle) = MetricsRecorder::spawn(&config(100), sink.clone());

		let first = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 5).unwrap();
		let second = Utc.with_ymd_and_hms(2025, 3, 1, 12, 1, 5).unwrap();
		recorder.record_at("f", EvaluationSource::CallerDefault, first);
		recorder.record_at("f", EvaluationSource::CallerDefault, second);
		recorder.flush().await.unwrap();

		let batches = sink.batches().await;
		assert_eq!(batches.len(), 1);
		assert_eq!(batches[0].counts.len(), 2);
		assert!(batches[0].counts[0].timestamp_bucket < batches[0].counts[1].timestamp_bucket);

		handle.shutdown().await;
	}

	#[tokio::test]
	async fn empty_flush_publishes_nothing() {
		let sink = Arc::new(InMemoryMetricsSink::new());
		let (recorder, handle) = MetricsRecorder::spawn(&config(100), sink.clone());
		recorder.flush().await.unwrap();
		assert!(sink.batches().await.is_empty());
		handle.shutdown().await;
	}

	#[tokio::test]
	async fn shutdown_flushes_pending_events() {
		let sink = Arc::new(InMemoryMetricsSink::new());
		let (recorder, handle) = MetricsRecorder::spawn(&config(100), sink.clone());

		recorder.record("f", EvaluationSource::EnvDefaultEnabled);
		handle.shutdown().await;

		assert_eq!(sink.total("f", EvaluationSource::EnvDefaultEnabled).await, 1);
		assert!(matches!(recorder.flush().await, Err(EngineError::MetricsStopped)));
	}

	#[tokio::test]
	async fn failed_batch_is_discarded() {
		let (recorder, handle) = MetricsRecorder::spawn(&config(100), Arc::new(FailingSink));
		recorder.record("f", EvaluationSource::CallerDefault);
		recorder.flush().await.unwrap();
		handle.shutdown().await;
	}

	#[tokio::test]
	async fn zero_flush_interval_is_floored() {
		let sink = Arc::new(InMemoryMetricsSink::new());
		let zero = MetricsConfig {
			flush_interval: Duration::ZERO,
			..config(100)
		};
		let (recorder, aggregator) = MetricsRecorder::channel(&zero);
		assert_eq!(aggregator.flush_interval, MIN_FLUSH_INTERVAL);

		let handle = aggregator.spawn(sink.clone());
		recorder.record("f", EvaluationSource::CallerDefault);
		handle.shutdown().await;
		assert_eq!(sink.total("f", EvaluationSource::CallerDefault).await, 1);
	}

	#[tokio::test]
	async fn dropped_events_are_reported_once() {
		let (recorder, mut aggregator) = MetricsRecorder::channel(&config(1));
		recorder.record("f", EvaluationSource::CallerDefault);
		recorder.record("f", EvaluationSource::CallerDefault);

		while let Ok(MetricsCommand::Record(event)) = aggregator.rx.try_recv() {
			aggregator.add(event);
		}
		let batch = aggregator.take_batch();
		assert_eq!(batch.dropped, 1);
		assert_eq!(batch.total("f", EvaluationSource::CallerDefault), 1);
		assert_eq!(aggregator.take_batch().dropped, 0);
	}
}
