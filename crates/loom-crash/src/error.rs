// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the crash SDK.

use std::path::PathBuf;

use loom_crash_pipeline::PipelineError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for crash operations.
pub type Result<T> = std::result::Result<T, CrashSdkError>;

/// Errors that can occur in the crash SDK.
///
/// None of these are fatal to the host: the ingestion driver logs them and
/// discards the crash that caused them.
#[derive(Debug, Error)]
pub enum CrashSdkError {
	/// A pipeline stage rejected the crash report.
	#[error("crash pipeline failed: {0}")]
	Pipeline(#[from] PipelineError),

	/// Invalid configuration.
	#[error("configuration error: {0}")]
	Config(#[from] ConfigError),

	/// Reading or deleting the persisted crash report failed.
	#[error("crash report source error at {path}: {source}")]
	Source {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	/// Failed to parse or serialize JSON.
	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// The event writer refused an event.
	#[error("failed to write monitoring event: {0}")]
	Write(String),

	/// No crash report source was configured.
	#[error("crash report source is required")]
	MissingSource,

	/// No feature scope was configured.
	#[error("feature scope is required")]
	MissingScope,

	/// The reporter has been shut down.
	#[error("crash reporting has been shut down")]
	Shutdown,
}
