// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session identity and the last known state of a monitored session.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SessionsError;

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
	#[must_use]
	pub fn new() -> Self {
		Self(Uuid::now_v7())
	}

	/// The null session, used when a crash cannot be attributed to any session.
	#[must_use]
	pub fn nil() -> Self {
		Self(Uuid::nil())
	}

	#[must_use]
	pub fn as_uuid(&self) -> &Uuid {
		&self.0
	}

	/// Seed for deterministic sampling decisions tied to this session.
	///
	/// Uses the low 64 bits, which carry the random part of a v7 UUID.
	#[must_use]
	pub fn sampling_seed(&self) -> u64 {
		self.0.as_u128() as u64
	}
}

impl Default for SessionId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for SessionId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for SessionId {
	type Err = SessionsError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Uuid::parse_str(s)
			.map(Self)
			.map_err(|_| SessionsError::InvalidSessionId(s.to_string()))
	}
}

/// State of the session that was active when the previous process ended.
///
/// Persisted by the host SDK while the session runs and read back on the
/// next launch, so a crash can be attributed to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
	pub session_id: SessionId,
	/// Whether this was the first session after application launch.
	pub is_initial_session: bool,
	/// Whether any view was started in this session.
	pub has_tracked_any_view: bool,
	/// Whether session replay was recording when the session started.
	pub did_start_with_replay: Option<bool>,
}

impl SessionState {
	#[must_use]
	pub fn new(session_id: SessionId) -> Self {
		Self {
			session_id,
			is_initial_session: true,
			has_tracked_any_view: false,
			did_start_with_replay: None,
		}
	}
}
