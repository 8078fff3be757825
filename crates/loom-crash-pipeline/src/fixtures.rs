// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Raw crash reports shared by the stage tests.

use serde_json::{json, Value};

pub const RUNNER_PATH: &str = "/private/var/containers/Bundle/Application/0000/Runner.app/Runner";
pub const UIKIT_PATH: &str = "/System/Library/PrivateFrameworks/UIKitCore.framework/UIKitCore";
pub const KERNEL_PATH: &str = "/usr/lib/system/libsystem_kernel.dylib";
pub const FOUNDATION_PATH: &str = "/System/Library/Frameworks/Foundation.framework/Foundation";

/// Stack of the crashed thread in [`segfault_report`] once normalized.
pub const SEGFAULT_STACK: &str = "0 Runner 0x0000000100004000 0x0000000100000000 + 16384\n\
	1 UIKitCore 0x0000000190001234 0x0000000190000000 + 4660\n\
	2 Runner 0x0000000100005000 0x0000000100000000 + 20480";

/// A SIGSEGV on thread 1 of an arm64 app, with one image no frame uses.
pub fn segfault_report() -> Value {
	json!({
		"report": {
			"id": "5B2F0C7E-1D4A-4B8E-9C61-2A7E3F0D9B11",
			"timestamp": "2026-03-01T12:00:00Z"
		},
		"system": {
			"cpu_arch": "arm64",
			"process_id": 4242,
			"process_name": "Runner",
			"parent_process_id": 1,
			"parent_process_name": "launchd",
			"CFBundleExecutablePath": RUNNER_PATH
		},
		"crash": {
			"error": {
				"signal": { "signal": 11, "name": "SIGSEGV", "code": 1, "code_name": "SEGV_MAPERR" },
				"mach": { "exception_name": "EXC_BAD_ACCESS", "code_name": "KERN_INVALID_ADDRESS" }
			},
			"threads": [
				{
					"index": 0,
					"crashed": false,
					"backtrace": { "contents": [
						{ "instruction_addr": 0x1_8a01_0010u64, "object_addr": 0x1_8a00_0000u64, "object_name": "libsystem_kernel.dylib" }
					] }
				},
				{
					"index": 1,
					"name": "com.apple.main-thread",
					"crashed": true,
					"backtrace": { "contents": [
						{ "instruction_addr": 0x1_0000_4000u64, "object_addr": 0x1_0000_0000u64, "object_name": "Runner" },
						{ "instruction_addr": 0x1_9000_1234u64, "object_addr": 0x1_9000_0000u64, "object_name": "UIKitCore" },
						{ "instruction_addr": 0x1_0000_5000u64, "object_addr": 0x1_0000_0000u64, "object_name": "Runner" }
					] }
				},
				{
					"index": 2,
					"crashed": false,
					"backtrace": { "contents": [] }
				}
			]
		},
		"binary_images": [
			{ "name": RUNNER_PATH, "uuid": "A1B2C3D4-0000-1111-2222-333344445555", "image_addr": 0x1_0000_0000u64, "image_size": 0x1_0000u64, "cpu_type": 0x0100_000C, "cpu_subtype": 0 },
			{ "name": FOUNDATION_PATH, "uuid": "F0F0F0F0-0000-1111-2222-333344445555", "image_addr": 0x1_8000_0000u64, "image_size": 0x1000u64, "cpu_type": 0x0100_000C, "cpu_subtype": 2 },
			{ "name": KERNEL_PATH, "uuid": "B0B0B0B0-0000-1111-2222-333344445555", "image_addr": 0x1_8a00_0000u64, "image_size": 0x10_0000u64, "cpu_type": 0x0100_000C, "cpu_subtype": 2 },
			{ "name": UIKIT_PATH, "uuid": "C0C0C0C0-0000-1111-2222-333344445555", "image_addr": 0x1_9000_0000u64, "image_size": 0x100_0000u64, "cpu_type": 0x0100_000C, "cpu_subtype": 2 }
		],
		"user": { "dd": "aGVsbG8gY29udGV4dA==" }
	})
}

/// An uncaught `NSInvalidArgumentException` with no thread or image lists.
pub fn exception_report() -> Value {
	json!({
		"report": { "timestamp": 1_772_366_400_000_000i64 },
		"crash": {
			"error": {
				"reason": "-[NSNull count]: unrecognized selector sent to instance",
				"nsexception": { "name": "NSInvalidArgumentException" }
			}
		}
	})
}
