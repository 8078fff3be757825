// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Normalized crash report produced at the end of the crash pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used wherever a value could not be read from the raw report.
pub const UNKNOWN: &str = "<unknown>";

/// Stack text used for threads without frames.
pub const EMPTY_STACK: &str = "???";

/// A normalized crash, ready to be attached to monitoring data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrashReport {
	/// Crash time as recorded on the device (not corrected for clock skew).
	pub date: DateTime<Utc>,
	/// e.g. "SIGSEGV (SEGV_MAPERR)" or "NSInvalidArgumentException"
	pub kind: String,
	pub message: String,
	/// Stack of the crashed thread, or [`EMPTY_STACK`].
	pub stack: String,
	pub threads: Vec<Thread>,
	pub binary_images: Vec<BinaryImage>,
	pub meta: CrashMeta,
	pub was_truncated: bool,
	/// Opaque bytes the host application stored alongside the crash.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub context: Option<Vec<u8>>,
}

impl CrashReport {
	/// Returns the thread marked as crashed, if any.
	pub fn crashed_thread(&self) -> Option<&Thread> {
		self.threads.iter().find(|t| t.crashed)
	}

	/// Looks up a binary image by library name.
	pub fn binary_image(&self, library_name: &str) -> Option<&BinaryImage> {
		self.binary_images
			.iter()
			.find(|image| image.library_name == library_name)
	}
}

/// A single thread's formatted stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thread {
	pub index: u64,
	pub name: String,
	pub crashed: bool,
	pub stack: String,
}

/// A loaded code module referenced by at least one stack frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryImage {
	pub library_name: String,
	pub uuid: String,
	pub architecture: String,
	#[serde(with = "hex_address")]
	pub load_address: u64,
	#[serde(with = "hex_address")]
	pub max_address: u64,
	pub is_system_library: bool,
}

/// Process-level metadata extracted from the raw report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashMeta {
	pub incident_identifier: Option<String>,
	/// "name [pid]"
	pub process: Option<String>,
	pub parent_process: Option<String>,
	pub path: Option<String>,
	pub code_type: Option<String>,
	pub exception_type: Option<String>,
	pub exception_codes: Option<String>,
}

/// Formats an address the way stack lines print it: `0x` + 16 hex digits.
pub fn format_address(address: u64) -> String {
	format!("0x{address:016x}")
}

mod hex_address {
	use serde::{de, Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(address: &u64, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(&super::format_address(*address))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
		let s = String::deserialize(deserializer)?;
		let digits = s.strip_prefix("0x").unwrap_or(&s);
		u64::from_str_radix(digits, 16).map_err(de::Error::custom)
	}
}
