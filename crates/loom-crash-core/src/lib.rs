// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Loom crash ingestion pipeline.
//!
//! This crate provides the shared vocabulary between the crash pipeline
//! (`loom-crash-pipeline`) and the SDK that attaches crashes to sessions
//! (`loom-crash`).
//!
//! # Overview
//!
//! - [`CrashDocument`]: typed, path-addressed view over the raw crash report
//!   persisted by the native crash handler
//! - [`DocumentError`]: `NotFound` / `TypeMismatch` / `UnsupportedInputShape`,
//!   each naming the dotted path that failed
//! - [`CrashReport`]: the normalized record (kind, message, per-thread stacks,
//!   referenced binary images, metadata, opaque context)
//! - [`compute_fingerprint`]: stable grouping key for a crash report

pub mod document;
pub mod error;
pub mod fingerprint;
pub mod keys;
pub mod report;

pub use document::{CrashDocument, FromValue, ValueKind};
pub use error::{DocumentError, Result};
pub use fingerprint::{compute_fingerprint, parse_stack_line, StackLine};
pub use report::{format_address, BinaryImage, CrashMeta, CrashReport, Thread, EMPTY_STACK, UNKNOWN};
