// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Binary image lookup and stack frame formatting.
//!
//! No symbolication happens here: a frame is printed as the library it falls
//! into, the instruction address, the library load address and the offset.

use loom_crash_core::format_address;

/// Address range of a loaded binary image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRange {
	pub library_name: String,
	pub load_address: u64,
	pub size: u64,
}

impl ImageRange {
	/// Exclusive upper bound of the image.
	pub fn max_address(&self) -> u64 {
		self.load_address.saturating_add(self.size)
	}

	pub fn contains(&self, address: u64) -> bool {
		address >= self.load_address && address < self.max_address()
	}
}

/// Finds the first image whose `[load, load + size)` range contains `address`.
pub fn find_image(images: &[ImageRange], address: u64) -> Option<&ImageRange> {
	images.iter().find(|image| image.contains(address))
}

/// Last path component of an image path, e.g. `UIKitCore` for
/// `/System/Library/PrivateFrameworks/UIKitCore.framework/UIKitCore`.
pub fn library_name(path: &str) -> &str {
	path.rsplit('/').next().unwrap_or(path)
}

/// Whether an image path belongs to the OS rather than the application bundle.
pub fn is_system_library(path: &str) -> bool {
	const APP_MARKERS: &[&str] = &["/Bundle/Application/", ".app/"];
	const SYSTEM_PREFIXES: &[&str] = &[
		"/System/",
		"/usr/lib/",
		"/usr/libexec/",
		"/Developer/",
		"/Library/Apple/",
	];
	const SYSTEM_MARKERS: &[&str] = &["/Profiles/Runtimes/", ".simruntime/"];

	if APP_MARKERS.iter().any(|marker| path.contains(marker)) {
		return false;
	}
	SYSTEM_PREFIXES.iter().any(|prefix| path.starts_with(prefix))
		|| SYSTEM_MARKERS.iter().any(|marker| path.contains(marker))
}

const CPU_ARCH_ABI64: i64 = 0x0100_0000;
const CPU_TYPE_X86: i64 = 7;
const CPU_TYPE_ARM: i64 = 12;
const CPU_TYPE_X86_64: i64 = CPU_TYPE_X86 | CPU_ARCH_ABI64;
const CPU_TYPE_ARM64: i64 = CPU_TYPE_ARM | CPU_ARCH_ABI64;
const CPU_SUBTYPE_MASK: i64 = 0x00FF_FFFF;

/// Architecture name for a Mach-O `cpu_type` / `cpu_subtype` pair.
pub fn architecture(cpu_type: i64, cpu_subtype: i64) -> Option<&'static str> {
	let subtype = cpu_subtype & CPU_SUBTYPE_MASK;
	match (cpu_type, subtype) {
		(CPU_TYPE_ARM64, 2) => Some("arm64e"),
		(CPU_TYPE_ARM64, _) => Some("arm64"),
		(CPU_TYPE_ARM, 11) => Some("armv7s"),
		(CPU_TYPE_ARM, 12) => Some("armv7k"),
		(CPU_TYPE_ARM, _) => Some("armv7"),
		(CPU_TYPE_X86_64, _) => Some("x86_64"),
		(CPU_TYPE_X86, _) => Some("i386"),
		_ => None,
	}
}

/// Formats one stack line:
/// `<index> <library> 0x<instruction> 0x<load> + <instruction - object>`.
pub fn format_frame(
	index: usize,
	library: &str,
	instruction_address: u64,
	load_address: u64,
	object_address: u64,
) -> String {
	let offset = i128::from(instruction_address) - i128::from(object_address);
	format!(
		"{index} {library} {} {} + {offset}",
		format_address(instruction_address),
		format_address(load_address)
	)
}
