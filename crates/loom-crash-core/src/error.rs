// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for typed crash document access.

use thiserror::Error;

use crate::document::ValueKind;

/// Errors raised while reading or writing a [`CrashDocument`](crate::CrashDocument).
///
/// Every variant carries the full dotted path of the lookup so a discarded
/// crash can be diagnosed from the log line alone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DocumentError {
	#[error("value not found at `{path}`")]
	NotFound { path: String },

	#[error("type mismatch at `{path}`: expected {expected}, found {actual}")]
	TypeMismatch {
		path: String,
		expected: ValueKind,
		actual: ValueKind,
	},

	#[error("unsupported crash document shape: expected map at top level, found {actual}")]
	UnsupportedInputShape { actual: ValueKind },
}

impl DocumentError {
	/// Returns true for the `NotFound` variant.
	pub fn is_not_found(&self) -> bool {
		matches!(self, Self::NotFound { .. })
	}

	/// The dotted path this error refers to, if any.
	pub fn path(&self) -> Option<&str> {
		match self {
			Self::NotFound { path } | Self::TypeMismatch { path, .. } => Some(path),
			Self::UnsupportedInputShape { .. } => None,
		}
	}
}

/// Result type for crash document operations.
pub type Result<T> = std::result::Result<T, DocumentError>;
