// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporting driver: reads the previous run's crash once and turns it
//! into monitoring events.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use loom_crash_pipeline::CrashPipeline;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::config::CrashReportingConfig;
use crate::error::{CrashSdkError, Result};
use crate::receiver::{CrashReportMessage, CrashReportReceiver};
use crate::reconcile::{Outcome, Reconciler};
use crate::scope::FeatureScope;
use crate::source::CrashReportSource;

/// Builder for constructing a [`CrashReporting`].
pub struct CrashReportingBuilder {
	config: CrashReportingConfig,
	source: Option<Box<dyn CrashReportSource>>,
	scope: Option<Arc<FeatureScope>>,
	reconciler: Option<Reconciler>,
}

impl CrashReportingBuilder {
	pub fn new() -> Self {
		Self {
			config: CrashReportingConfig::default(),
			source: None,
			scope: None,
			reconciler: None,
		}
	}

	pub fn config(mut self, config: CrashReportingConfig) -> Self {
		self.config = config;
		self
	}

	/// Where the persisted crash report is read from.
	pub fn source(mut self, source: impl CrashReportSource + 'static) -> Self {
		self.source = Some(Box::new(source));
		self
	}

	pub fn scope(mut self, scope: Arc<FeatureScope>) -> Self {
		self.scope = Some(scope);
		self
	}

	/// Replaces the reconciler derived from the config.
	pub fn reconciler(mut self, reconciler: Reconciler) -> Self {
		self.reconciler = Some(reconciler);
		self
	}

	/// Builds the reporter.
	///
	/// The scope's context is left as is. Use [`Self::build_async`] to also
	/// apply `background_events_tracking` from the config to it.
	pub fn build(self) -> Result<CrashReporting> {
		let source = self.source.ok_or(CrashSdkError::MissingSource)?;
		let scope = self.scope.ok_or(CrashSdkError::MissingScope)?;
		let pipeline = CrashPipeline::new(self.config.stack_frames_limit)?;
		let reconciler = self
			.reconciler
			.unwrap_or_else(|| Reconciler::from_config(&self.config));

		info!(
			stack_frames_limit = self.config.stack_frames_limit,
			session_sample_rate = %self.config.session_sample_rate,
			sampler = %self.config.sampler,
			"crash reporting initialized"
		);

		Ok(CrashReporting {
			inner: Arc::new(CrashReportingInner {
				config: self.config,
				pipeline,
				receiver: CrashReportReceiver::new(reconciler, scope),
				source,
				closed: AtomicBool::new(false),
			}),
		})
	}

	/// Builds the reporter and seeds the scope's background tracking flag.
	pub async fn build_async(self) -> Result<CrashReporting> {
		let reporting = self.build()?;
		let enabled = reporting.inner.config.background_events_tracking;
		reporting
			.scope()
			.update_context(|context| context.background_events_tracking = enabled)
			.await;
		Ok(reporting)
	}
}

impl Default for CrashReportingBuilder {
	fn default() -> Self {
		Self::new()
	}
}

struct CrashReportingInner {
	config: CrashReportingConfig,
	pipeline: CrashPipeline,
	receiver: CrashReportReceiver,
	source: Box<dyn CrashReportSource>,
	closed: AtomicBool,
}

/// Crash reporting for one application process.
///
/// # Example
///
/// ```ignore
/// use loom_crash::{CrashReporting, FileCrashReportSource};
///
/// let reporting = CrashReporting::builder()
///     .config(load_config_from_env()?)
///     .source(FileCrashReportSource::new(crash_dir.join("report.json")))
///     .scope(Arc::clone(&scope))
///     .build_async()
///     .await?;
///
/// // Processes the previous run's crash in the background.
/// reporting.start();
/// ```
#[derive(Clone)]
pub struct CrashReporting {
	inner: Arc<CrashReportingInner>,
}

impl CrashReporting {
	pub fn builder() -> CrashReportingBuilder {
		CrashReportingBuilder::new()
	}

	pub fn config(&self) -> &CrashReportingConfig {
		&self.inner.config
	}

	pub fn scope(&self) -> &Arc<FeatureScope> {
		self.inner.receiver.scope()
	}

	/// Spawns ingestion of the pending crash report. Failures are logged and
	/// the report is dropped.
	pub fn start(&self) -> JoinHandle<()> {
		let reporting = self.clone();
		tokio::spawn(async move {
			match reporting.ingest_pending().await {
				Ok(Some(outcome)) => {
					debug!(dropped = outcome.is_dropped(), "pending crash report processed");
				}
				Ok(None) => debug!("no pending crash report"),
				Err(e) => error!(error = %e, "failed to process pending crash report"),
			}
		})
	}

	/// Reads, normalizes and reconciles the pending crash report.
	///
	/// The report is deleted before it is processed, so a report that fails
	/// processing is not retried on the next launch.
	#[instrument(skip_all)]
	pub async fn ingest_pending(&self) -> Result<Option<Outcome>> {
		self.check_closed()?;

		let Some(bytes) = self.inner.source.read_pending().await? else {
			return Ok(None);
		};
		self.inner.source.delete_pending().await?;

		let raw: serde_json::Value = serde_json::from_slice(&bytes)?;
		let report = self.inner.pipeline.process(raw)?;
		let message = CrashReportMessage::new(report);
		let outcome = self.inner.receiver.receive(message, Utc::now()).await?;
		Ok(Some(outcome))
	}

	/// Stops further ingestion. Calling it twice is fine.
	pub fn shutdown(&self) {
		if !self.inner.closed.swap(true, Ordering::SeqCst) {
			info!("crash reporting shut down");
		}
	}

	pub fn is_closed(&self) -> bool {
		self.inner.closed.load(Ordering::SeqCst)
	}

	fn check_closed(&self) -> Result<()> {
		if self.is_closed() {
			return Err(CrashSdkError::Shutdown);
		}
		Ok(())
	}
}

impl std::fmt::Debug for CrashReporting {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CrashReporting")
			.field("config", &self.inner.config)
			.field("pipeline", &self.inner.pipeline)
			.field("closed", &self.is_closed())
			.finish_non_exhaustive()
	}
}
