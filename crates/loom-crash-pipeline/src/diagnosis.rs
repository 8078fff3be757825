// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! One-line human diagnosis of why the process died.

use loom_crash_core::keys::{
	CPP_EXCEPTION, CRASH, DIAGNOSIS, ERROR, NAME, NSEXCEPTION, REASON, RECRASH_REPORT, SIGNAL,
};
use loom_crash_core::{CrashDocument, UNKNOWN};
use tracing::{debug, warn};

use crate::error::Result;
use crate::filter::CrashReportFilter;
use crate::signal;

/// Reads an optional string, treating a malformed value as absent.
fn string_at(document: &CrashDocument, path: &[&str]) -> Option<String> {
	document.value_if_present(path).ok().flatten()
}

/// Name of the uncaught language-level exception, if the crash was one.
///
/// Returns `Some(None)` when an exception record exists without a name.
fn exception_name(crash: &CrashDocument) -> Option<Option<String>> {
	[NSEXCEPTION, CPP_EXCEPTION]
		.into_iter()
		.find(|kind| crash.contains(&[ERROR, *kind]))
		.map(|kind| string_at(crash, &[ERROR, kind, NAME]))
}

/// Signal name, falling back to the signal number when the name is missing.
pub(crate) fn signal_name(crash: &CrashDocument) -> Option<String> {
	string_at(crash, &[ERROR, SIGNAL, NAME]).or_else(|| {
		crash
			.value_if_present::<i64>(&[ERROR, SIGNAL, SIGNAL])
			.ok()
			.flatten()
			.and_then(signal::name_for_number)
			.map(str::to_owned)
	})
}

/// Produces the diagnosis for a `crash` node.
///
/// Never fails: missing detail degrades to `<unknown>`.
pub fn diagnose(crash: &CrashDocument) -> String {
	if let Some(name) = exception_name(crash) {
		let reason = string_at(crash, &[ERROR, REASON]);
		return format!(
			"Terminating app due to uncaught exception '{}', reason: '{}'.",
			name.as_deref().unwrap_or(UNKNOWN),
			reason.as_deref().unwrap_or(UNKNOWN)
		);
	}

	if crash.contains(&[ERROR, SIGNAL]) {
		let name = signal_name(crash);
		let description = name.as_deref().and_then(signal::description);
		return format!(
			"Application crash: {} ({})",
			name.as_deref().unwrap_or(UNKNOWN),
			description.unwrap_or(UNKNOWN)
		);
	}

	format!("Application crash: {UNKNOWN}")
}

/// Writes `crash.diagnosis` (and `recrash_report.crash.diagnosis` when a
/// re-crash report is embedded).
#[derive(Debug, Clone, Copy, Default)]
pub struct DiagnosisFilter;

impl DiagnosisFilter {
	/// A crash node that is not a map gets no diagnosis written back; the
	/// builder reports it if it is the main crash.
	fn diagnose_at(document: &mut CrashDocument, crash_path: &[&str]) -> Result<()> {
		let crash = match document.value_if_present::<CrashDocument>(crash_path) {
			Ok(crash) => crash.unwrap_or_default(),
			Err(err) => {
				warn!(error = %err, "crash node is malformed, skipping diagnosis");
				return Ok(());
			}
		};
		let diagnosis = diagnose(&crash);
		debug!(path = %crash_path.join("."), diagnosis = %diagnosis, "crash diagnosed");

		let mut path = crash_path.to_vec();
		path.push(DIAGNOSIS);
		document.set_value(&path, diagnosis)?;
		Ok(())
	}
}

impl CrashReportFilter for DiagnosisFilter {
	fn name(&self) -> &'static str {
		"diagnosis"
	}

	fn apply(&self, mut document: CrashDocument) -> Result<CrashDocument> {
		Self::diagnose_at(&mut document, &[CRASH])?;
		if document.contains(&[RECRASH_REPORT]) {
			Self::diagnose_at(&mut document, &[RECRASH_REPORT, CRASH])?;
		}
		Ok(document)
	}
}
