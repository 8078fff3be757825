// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Monitoring events emitted for a crash.

use chrono::{DateTime, Utc};
use loom_crash_core::{compute_fingerprint, BinaryImage, CrashMeta, CrashReport, Thread};
use loom_sessions_core::{SessionId, ViewId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::LastView;

/// Reference from an error to the view it happened on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewRef {
	pub id: ViewId,
	pub name: String,
	pub url: String,
}

/// The crash, as an error event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
	pub id: Uuid,
	/// Crash time, corrected to server time.
	pub date: DateTime<Utc>,
	pub application_id: String,
	pub session_id: SessionId,
	pub view: ViewRef,
	pub is_crash: bool,
	pub kind: String,
	pub message: String,
	pub stack: String,
	/// Groups crashes with the same cause.
	pub fingerprint: String,
	pub threads: Vec<Thread>,
	pub binary_images: Vec<BinaryImage>,
	pub meta: CrashMeta,
	pub was_truncated: bool,
}

impl ErrorEvent {
	pub fn from_report(
		report: &CrashReport,
		date: DateTime<Utc>,
		application_id: &str,
		session_id: SessionId,
		view: ViewRef,
	) -> Self {
		Self {
			id: Uuid::now_v7(),
			date,
			application_id: application_id.to_string(),
			session_id,
			view,
			is_crash: true,
			kind: report.kind.clone(),
			message: report.message.clone(),
			stack: report.stack.clone(),
			fingerprint: compute_fingerprint(report),
			threads: report.threads.clone(),
			binary_images: report.binary_images.clone(),
			meta: report.meta.clone(),
			was_truncated: report.was_truncated,
		}
	}
}

/// A view update, either of the last real view or of a synthetic one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewEvent {
	pub view_id: ViewId,
	pub session_id: SessionId,
	pub application_id: String,
	pub name: String,
	pub url: String,
	pub date: DateTime<Utc>,
	pub time_spent_ns: i64,
	pub is_active: bool,
	pub crash_count: u64,
	pub error_count: u64,
	pub document_version: u64,
	pub has_replay: bool,
}

impl ViewEvent {
	/// The reference an error on this view carries.
	pub fn view_ref(&self) -> ViewRef {
		ViewRef {
			id: self.view_id,
			name: self.name.clone(),
			url: self.url.clone(),
		}
	}

	pub fn from_last_view(view: &LastView, application_id: &str) -> Self {
		Self {
			view_id: view.view_id,
			session_id: view.session_id,
			application_id: application_id.to_string(),
			name: view.name.clone(),
			url: view.url.clone(),
			date: view.date,
			time_spent_ns: view.time_spent_ns,
			is_active: view.is_active,
			crash_count: view.crash_count,
			error_count: view.error_count,
			document_version: view.document_version,
			has_replay: view.has_replay,
		}
	}
}

impl LastView {
	pub fn view_ref(&self) -> ViewRef {
		ViewRef {
			id: self.view_id,
			name: self.name.clone(),
			url: self.url.clone(),
		}
	}
}

/// Everything the crash feature writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitoringEvent {
	Error(ErrorEvent),
	View(ViewEvent),
}

impl MonitoringEvent {
	pub fn session_id(&self) -> SessionId {
		match self {
			MonitoringEvent::Error(e) => e.session_id,
			MonitoringEvent::View(v) => v.session_id,
		}
	}
}
