// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash report pipeline for Loom.
//!
//! Turns the raw report persisted by the native crash handler into a
//! normalized [`CrashReport`](loom_crash_core::CrashReport):
//!
//! 1. [`type_safe`]: the raw JSON must be a map
//! 2. [`DiagnosisFilter`]: one-line diagnosis written to `crash.diagnosis`
//! 3. [`MinifyFilter`]: truncates long backtraces, prunes unused binary images
//! 4. [`build`]: resolves frames against binary images and formats stacks
//!
//! Every stage is a pure function over an owned [`CrashDocument`](loom_crash_core::CrashDocument).
//!
//! ```ignore
//! let pipeline = CrashPipeline::new(100)?;
//! let report = pipeline.process(serde_json::from_slice(&bytes)?)?;
//! ```

pub mod builder;
pub mod diagnosis;
pub mod error;
pub mod filter;
pub mod frame;
pub mod minify;
pub mod pipeline;
pub mod signal;

#[cfg(test)]
mod fixtures;

pub use builder::{build, NO_CRASH_REASON};
pub use diagnosis::{diagnose, DiagnosisFilter};
pub use error::{PipelineError, Result};
pub use filter::{type_safe, CrashReportFilter};
pub use minify::{minify, MinifyFilter, DEFAULT_STACK_FRAMES_LIMIT};
pub use pipeline::{process, CrashPipeline};
