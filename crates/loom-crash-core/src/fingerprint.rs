// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fingerprinting for grouping crashes with the same cause.

use sha2::{Digest, Sha256};

use crate::report::CrashReport;

/// Number of frames that contribute to a fingerprint.
const FINGERPRINT_FRAMES: usize = 5;

/// A frame parsed back out of a formatted stack line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackLine<'a> {
	pub library: &'a str,
	pub offset: &'a str,
}

/// Splits `"<index> <library> 0x<instr> 0x<load> + <offset>"` into parts.
///
/// Library names may contain spaces, so the line is split from the right.
pub fn parse_stack_line(line: &str) -> Option<StackLine<'_>> {
	let (_, rest) = line.split_once(' ')?;
	let mut parts = rest.rsplitn(5, ' ');
	let offset = parts.next()?;
	let plus = parts.next()?;
	let _load = parts.next()?;
	let _instr = parts.next()?;
	let library = parts.next()?;
	if plus != "+" {
		return None;
	}
	Some(StackLine { library, offset })
}

/// Compute a fingerprint for a crash report.
///
/// The fingerprint is a SHA256 hash based on:
/// 1. Crash kind (most significant)
/// 2. Top N crashed-thread frames from application libraries
/// 3. If no application frames, the top N frames of any library
pub fn compute_fingerprint(report: &CrashReport) -> String {
	let mut hasher = Sha256::new();

	hasher.update(report.kind.as_bytes());
	hasher.update(b"|");

	let frames: Vec<StackLine<'_>> = report.stack.lines().filter_map(parse_stack_line).collect();
	let is_system = |library: &str| {
		report
			.binary_image(library)
			.map(|image| image.is_system_library)
			.unwrap_or(false)
	};

	let in_app: Vec<_> = frames
		.iter()
		.filter(|f| !is_system(f.library))
		.take(FINGERPRINT_FRAMES)
		.collect();
	let selected: Vec<_> = if in_app.is_empty() {
		frames.iter().take(FINGERPRINT_FRAMES).collect()
	} else {
		in_app
	};

	for frame in selected {
		hasher.update(frame.library.as_bytes());
		hasher.update(b"+");
		hasher.update(frame.offset.as_bytes());
		hasher.update(b"|");
	}

	hex::encode(hasher.finalize())
}
