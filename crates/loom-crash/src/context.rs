// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Snapshot of what the host SDK knew about the application when it crashed.

use chrono::{DateTime, TimeDelta, Utc};
use loom_sessions_core::{SessionId, SessionState, ViewId};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Whether the user allowed collection of monitoring data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingConsent {
	Granted,
	NotGranted,
	#[default]
	Pending,
}

impl std::fmt::Display for TrackingConsent {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			TrackingConsent::Granted => write!(f, "granted"),
			TrackingConsent::NotGranted => write!(f, "not_granted"),
			TrackingConsent::Pending => write!(f, "pending"),
		}
	}
}

impl std::str::FromStr for TrackingConsent {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"granted" => Ok(TrackingConsent::Granted),
			"not_granted" => Ok(TrackingConsent::NotGranted),
			"pending" => Ok(TrackingConsent::Pending),
			_ => Err(format!("unknown tracking consent: {s}")),
		}
	}
}

/// The last view event written before the process ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastView {
	pub view_id: ViewId,
	pub session_id: SessionId,
	pub name: String,
	pub url: String,
	/// View start, already corrected to server time.
	pub date: DateTime<Utc>,
	pub time_spent_ns: i64,
	pub is_active: bool,
	pub crash_count: u64,
	pub error_count: u64,
	pub document_version: u64,
	#[serde(default)]
	pub has_replay: bool,
}

/// Application state consumed by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashContext {
	pub application_id: String,
	#[serde(default)]
	pub tracking_consent: TrackingConsent,
	pub last_view: Option<LastView>,
	pub last_session_state: Option<SessionState>,
	pub is_app_in_foreground: bool,
	pub app_launch_date: Option<DateTime<Utc>>,
	/// Server clock minus device clock, in milliseconds.
	#[serde(default)]
	pub server_time_offset_ms: i64,
	#[serde(default)]
	pub background_events_tracking: bool,
}

impl CrashContext {
	/// Context with no prior session or view.
	pub fn new(application_id: impl Into<String>) -> Self {
		Self {
			application_id: application_id.into(),
			tracking_consent: TrackingConsent::Pending,
			last_view: None,
			last_session_state: None,
			is_app_in_foreground: false,
			app_launch_date: None,
			server_time_offset_ms: 0,
			background_events_tracking: false,
		}
	}

	/// Decodes the context the host stored next to the crash report.
	pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
		Ok(serde_json::from_slice(bytes)?)
	}

	pub fn to_bytes(&self) -> Result<Vec<u8>> {
		Ok(serde_json::to_vec(self)?)
	}

	pub fn server_time_offset(&self) -> TimeDelta {
		TimeDelta::milliseconds(self.server_time_offset_ms)
	}

	/// Shifts a device timestamp to server time.
	pub fn to_server_time(&self, device_date: DateTime<Utc>) -> DateTime<Utc> {
		device_date + self.server_time_offset()
	}
}
