// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The filter seam every pipeline stage implements, and the type-safe intake
//! that turns the raw JSON tree into a [`CrashDocument`].

use loom_crash_core::CrashDocument;
use serde_json::Value;
use tracing::debug;

use crate::error::Result;

/// A pure transformation over a crash document.
pub trait CrashReportFilter: Send + Sync {
	fn name(&self) -> &'static str;
	fn apply(&self, document: CrashDocument) -> Result<CrashDocument>;
}

/// Checks that the raw report is a map and wraps it.
///
/// Anything else (array, scalar, null) is an `UnsupportedInputShape` error.
pub fn type_safe(raw: Value) -> Result<CrashDocument> {
	let document = CrashDocument::try_from(raw)?;
	debug!(keys = document.as_map().len(), "crash report accepted");
	Ok(document)
}
