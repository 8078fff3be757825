// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Where the previous process's crash report is read from.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{CrashSdkError, Result};

/// Persisted crash report written by the native crash handler.
#[async_trait]
pub trait CrashReportSource: Send + Sync {
	/// Raw JSON of the pending report, if there is one.
	async fn read_pending(&self) -> Result<Option<Vec<u8>>>;

	/// Removes the pending report. A missing report is not an error.
	async fn delete_pending(&self) -> Result<()>;
}

/// A crash report stored as a single JSON file.
#[derive(Debug, Clone)]
pub struct FileCrashReportSource {
	path: PathBuf,
}

impl FileCrashReportSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	fn source_error(&self, source: std::io::Error) -> CrashSdkError {
		CrashSdkError::Source {
			path: self.path.clone(),
			source,
		}
	}
}

#[async_trait]
impl CrashReportSource for FileCrashReportSource {
	async fn read_pending(&self) -> Result<Option<Vec<u8>>> {
		match tokio::fs::read(&self.path).await {
			Ok(bytes) => {
				debug!(path = %self.path.display(), bytes = bytes.len(), "pending crash report found");
				Ok(Some(bytes))
			}
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
			Err(e) => Err(self.source_error(e)),
		}
	}

	async fn delete_pending(&self) -> Result<()> {
		match tokio::fs::remove_file(&self.path).await {
			Ok(()) => {
				debug!(path = %self.path.display(), "pending crash report deleted");
				Ok(())
			}
			Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
			Err(e) => Err(self.source_error(e)),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_missing_file_has_nothing_pending() {
		let dir = tempfile::tempdir().unwrap();
		let source = FileCrashReportSource::new(dir.path().join("crash.json"));
		assert!(source.read_pending().await.unwrap().is_none());
		source.delete_pending().await.unwrap();
	}

	#[tokio::test]
	async fn test_read_then_delete() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("crash.json");
		tokio::fs::write(&path, br#"{"report":{}}"#).await.unwrap();

		let source = FileCrashReportSource::new(&path);
		assert_eq!(
			source.read_pending().await.unwrap().as_deref(),
			Some(&br#"{"report":{}}"#[..])
		);
		source.delete_pending().await.unwrap();
		assert!(!path.exists());
		assert!(source.read_pending().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_directory_is_a_source_error() {
		let dir = tempfile::tempdir().unwrap();
		let source = FileCrashReportSource::new(dir.path());
		let err = source.read_pending().await.unwrap_err();
		assert!(matches!(err, CrashSdkError::Source { .. }));
	}
}
