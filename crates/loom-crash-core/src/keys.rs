// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Key names used by the native crash handler's report format.

pub const REPORT: &str = "report";
pub const TIMESTAMP: &str = "timestamp";
pub const ID: &str = "id";

pub const SYSTEM: &str = "system";
pub const CPU_ARCH: &str = "cpu_arch";
pub const PROCESS_ID: &str = "process_id";
pub const PROCESS_NAME: &str = "process_name";
pub const PARENT_PROCESS_ID: &str = "parent_process_id";
pub const PARENT_PROCESS_NAME: &str = "parent_process_name";
pub const EXECUTABLE_PATH: &str = "CFBundleExecutablePath";

pub const CRASH: &str = "crash";
pub const RECRASH_REPORT: &str = "recrash_report";
pub const DIAGNOSIS: &str = "diagnosis";
pub const ERROR: &str = "error";
pub const REASON: &str = "reason";
pub const SIGNAL: &str = "signal";
pub const NSEXCEPTION: &str = "nsexception";
pub const CPP_EXCEPTION: &str = "cpp_exception";
pub const MACH: &str = "mach";
pub const EXCEPTION_NAME: &str = "exception_name";
pub const NAME: &str = "name";
pub const CODE: &str = "code";
pub const CODE_NAME: &str = "code_name";

pub const THREADS: &str = "threads";
pub const INDEX: &str = "index";
pub const CRASHED: &str = "crashed";
pub const BACKTRACE: &str = "backtrace";
pub const CONTENTS: &str = "contents";
pub const TRUNCATED: &str = "truncated";
pub const INSTRUCTION_ADDR: &str = "instruction_addr";
pub const OBJECT_ADDR: &str = "object_addr";
pub const OBJECT_NAME: &str = "object_name";

pub const BINARY_IMAGES: &str = "binary_images";
pub const UUID: &str = "uuid";
pub const IMAGE_ADDR: &str = "image_addr";
pub const IMAGE_SIZE: &str = "image_size";
pub const CPU_TYPE: &str = "cpu_type";
pub const CPU_SUBTYPE: &str = "cpu_subtype";

pub const USER: &str = "user";
pub const CONTEXT: &str = "dd";
