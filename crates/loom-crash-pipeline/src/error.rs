// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the crash pipeline.

use loom_crash_core::DocumentError;
use thiserror::Error;

/// Errors that can occur while turning a raw crash report into a [`CrashReport`](loom_crash_core::CrashReport).
#[derive(Debug, Error)]
pub enum PipelineError {
	#[error(transparent)]
	Document(#[from] DocumentError),

	#[error("stack frames limit must be at least 1, got {0}")]
	InvalidStackFramesLimit(usize),

	#[error("invalid crash timestamp: {0}")]
	InvalidTimestamp(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
