// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The ordered stage chain: type-safe intake, filters, then normalization.

use loom_crash_core::{CrashDocument, CrashReport};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::builder;
use crate::diagnosis::DiagnosisFilter;
use crate::error::Result;
use crate::filter::{type_safe, CrashReportFilter};
use crate::minify::{MinifyFilter, DEFAULT_STACK_FRAMES_LIMIT};

/// Runs a raw crash report through every stage, stopping at the first error.
pub struct CrashPipeline {
	filters: Vec<Box<dyn CrashReportFilter>>,
}

impl CrashPipeline {
	/// Diagnosis followed by minification with the given frame limit.
	pub fn new(stack_frames_limit: usize) -> Result<Self> {
		Ok(Self::with_filters(vec![
			Box::new(DiagnosisFilter),
			Box::new(MinifyFilter::new(stack_frames_limit)?),
		]))
	}

	pub fn with_filters(filters: Vec<Box<dyn CrashReportFilter>>) -> Self {
		Self { filters }
	}

	pub fn filter_names(&self) -> Vec<&'static str> {
		self.filters.iter().map(|f| f.name()).collect()
	}

	#[instrument(skip_all)]
	pub fn process(&self, raw: Value) -> Result<CrashReport> {
		self.process_document(type_safe(raw)?)
	}

	pub fn process_document(&self, document: CrashDocument) -> Result<CrashReport> {
		let document = self.filters.iter().try_fold(document, |document, filter| {
			debug!(filter = filter.name(), "applying crash report filter");
			filter.apply(document)
		})?;
		builder::build(&document)
	}
}

impl Default for CrashPipeline {
	fn default() -> Self {
		Self::with_filters(vec![
			Box::new(DiagnosisFilter),
			Box::new(MinifyFilter::default()),
		])
	}
}

impl std::fmt::Debug for CrashPipeline {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CrashPipeline")
			.field("filters", &self.filter_names())
			.finish()
	}
}

/// Convenience for a one-off run with the default frame limit.
pub fn process(raw: Value) -> Result<CrashReport> {
	CrashPipeline::new(DEFAULT_STACK_FRAMES_LIMIT)?.process(raw)
}
