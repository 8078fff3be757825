// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Turns a normalized crash into monitoring events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use loom_crash_core::CrashReport;
use tracing::{error, warn};

use crate::context::CrashContext;
use crate::error::Result;
use crate::reconcile::{Outcome, Reconciler};
use crate::scope::{EventWriter, FeatureScope};

/// A normalized crash and the context stored with it at crash time.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashReportMessage {
	pub report: CrashReport,
	/// `None` when the report carries no decodable context; the scope's
	/// current context is used instead.
	pub context: Option<CrashContext>,
}

impl CrashReportMessage {
	/// Decodes the crash-time context from the report's opaque payload.
	pub fn new(report: CrashReport) -> Self {
		let context = report
			.context
			.as_deref()
			.and_then(|bytes| match CrashContext::from_bytes(bytes) {
				Ok(context) => Some(context),
				Err(e) => {
					warn!(error = %e, "crash context is not decodable, using current context");
					None
				}
			});
		Self { report, context }
	}

	pub fn with_context(report: CrashReport, context: CrashContext) -> Self {
		Self {
			report,
			context: Some(context),
		}
	}
}

/// Reconciles crashes and writes the result through the feature scope.
pub struct CrashReportReceiver {
	reconciler: Reconciler,
	scope: Arc<FeatureScope>,
}

impl CrashReportReceiver {
	pub fn new(reconciler: Reconciler, scope: Arc<FeatureScope>) -> Self {
		Self { reconciler, scope }
	}

	pub fn scope(&self) -> &Arc<FeatureScope> {
		&self.scope
	}

	/// Decides and writes under a single scope lock. The error and view of an
	/// outcome go to the writer as one batch. A failed write is returned, not
	/// retried.
	pub async fn receive(&self, message: CrashReportMessage, now: DateTime<Utc>) -> Result<Outcome> {
		let mut guard = self.scope.lock().await;

		let outcome = {
			let context = message.context.as_ref().unwrap_or(guard.context());
			self.reconciler.reconcile(&message.report, context, now)
		};

		let events = outcome.clone().into_events();
		if events.is_empty() {
			return Ok(outcome);
		}

		let (_, mut writer) = guard.write_context(outcome.bypasses_consent());
		if let Err(e) = writer.write(&events) {
			error!(error = %e, session_id = %events[0].session_id(), "failed to write crash events");
			return Err(e);
		}
		Ok(outcome)
	}
}
