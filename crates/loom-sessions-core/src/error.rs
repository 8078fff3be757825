// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the sessions system.

use thiserror::Error;

/// Errors that can occur in the sessions system.
#[derive(Debug, Error)]
pub enum SessionsError {
	/// Invalid session ID
	#[error("invalid session ID: {0}")]
	InvalidSessionId(String),

	/// Invalid view ID
	#[error("invalid view ID: {0}")]
	InvalidViewId(String),

	/// Sample rate outside 0-100 or not a number
	#[error("invalid sample rate: {0} (expected a percentage between 0 and 100)")]
	InvalidSampleRate(f64),

	/// Unknown sampler name
	#[error("invalid sampler kind: {0}")]
	InvalidSamplerKind(String),
}

/// Result type for sessions operations.
pub type Result<T> = std::result::Result<T, SessionsError>;
