// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Normalization: turns a diagnosed, minified crash document into a
//! [`CrashReport`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use loom_crash_core::keys::{
	BACKTRACE, BINARY_IMAGES, CODE, CODE_NAME, CONTENTS, CONTEXT, CPP_EXCEPTION, CPU_ARCH,
	CPU_SUBTYPE, CPU_TYPE, CRASH, CRASHED, DIAGNOSIS, ERROR, EXCEPTION_NAME, EXECUTABLE_PATH, ID,
	IMAGE_ADDR, IMAGE_SIZE, INDEX, INSTRUCTION_ADDR, MACH, NAME, NSEXCEPTION, OBJECT_ADDR,
	OBJECT_NAME, PARENT_PROCESS_ID, PARENT_PROCESS_NAME, PROCESS_ID, PROCESS_NAME, REPORT, SIGNAL,
	SYSTEM, THREADS, TIMESTAMP, TRUNCATED, USER, UUID,
};
use loom_crash_core::{
	BinaryImage, CrashDocument, CrashMeta, CrashReport, DocumentError, FromValue, Thread, EMPTY_STACK,
	UNKNOWN,
};
use tracing::{debug, warn};

use crate::diagnosis::signal_name;
use crate::error::{PipelineError, Result};
use crate::frame::{self, ImageRange};

/// Message used when the diagnosis stage did not run.
pub const NO_CRASH_REASON: &str = "No crash reason provided";

/// Builds the normalized report.
///
/// Mandatory fields (`report.timestamp`, thread `index`/`crashed`, frame
/// `instruction_addr`, image `name`/`image_addr`/`image_size`) propagate
/// `NotFound` / `TypeMismatch`. Everything else degrades to placeholders.
pub fn build(document: &CrashDocument) -> Result<CrashReport> {
	let crash = document
		.value_if_present::<CrashDocument>(&[CRASH])?
		.unwrap_or_default();

	let binary_images = binary_images(document)?;
	let ranges: Vec<ImageRange> = binary_images
		.iter()
		.map(|(range, _)| range.clone())
		.collect();

	let raw_threads = crash
		.value_if_present::<Vec<CrashDocument>>(&[THREADS])?
		.unwrap_or_default();
	let mut threads = Vec::with_capacity(raw_threads.len());
	let mut was_truncated = false;
	for raw in &raw_threads {
		was_truncated |= raw
			.value_if_present::<bool>(&[BACKTRACE, TRUNCATED])?
			.unwrap_or(false);
		threads.push(thread(raw, &ranges)?);
	}

	let stack = threads
		.iter()
		.find(|t| t.crashed)
		.map(|t| t.stack.clone())
		.unwrap_or_else(|| EMPTY_STACK.to_string());

	let report = CrashReport {
		date: timestamp(document)?,
		kind: kind(&crash),
		message: crash
			.value_if_present::<String>(&[DIAGNOSIS])?
			.unwrap_or_else(|| NO_CRASH_REASON.to_string()),
		stack,
		threads,
		binary_images: binary_images.into_iter().map(|(_, image)| image).collect(),
		meta: meta(document, &crash),
		was_truncated,
		context: context(document)?,
	};

	debug!(
		kind = %report.kind,
		threads = report.threads.len(),
		binary_images = report.binary_images.len(),
		was_truncated = report.was_truncated,
		"crash report normalized"
	);
	Ok(report)
}

fn timestamp(document: &CrashDocument) -> Result<DateTime<Utc>> {
	let path = [REPORT, TIMESTAMP];
	match document.value::<i64>(&path) {
		Ok(micros) => DateTime::from_timestamp_micros(micros)
			.ok_or_else(|| PipelineError::InvalidTimestamp(micros.to_string())),
		Err(DocumentError::TypeMismatch { .. }) => {
			let raw = document.value::<String>(&path)?;
			DateTime::parse_from_rfc3339(&raw)
				.map(|date| date.with_timezone(&Utc))
				.map_err(|_| PipelineError::InvalidTimestamp(raw))
		}
		Err(err) => Err(err.into()),
	}
}

/// `"SIGSEGV (SEGV_MAPERR)"` for signals, the exception name for exceptions.
fn kind(crash: &CrashDocument) -> String {
	if crash.contains(&[ERROR, SIGNAL]) {
		let name = signal_name(crash).unwrap_or_else(|| UNKNOWN.to_string());
		let code = optional::<String>(crash, &[ERROR, SIGNAL, CODE_NAME])
			.or_else(|| optional::<i64>(crash, &[ERROR, SIGNAL, CODE]).map(|code| format!("#{code}")))
			.unwrap_or_else(|| "#0".to_string());
		return format!("{name} ({code})");
	}

	[NSEXCEPTION, CPP_EXCEPTION]
		.into_iter()
		.find_map(|exception| optional::<String>(crash, &[ERROR, exception, NAME]))
		.unwrap_or_else(|| format!("{UNKNOWN} (#0)"))
}

/// Reads an optional field, logging and ignoring a malformed value.
fn optional<T: FromValue>(document: &CrashDocument, path: &[&str]) -> Option<T> {
	match document.value_if_present(path) {
		Ok(value) => value,
		Err(err) => {
			warn!(error = %err, "ignoring malformed crash report field");
			None
		}
	}
}

fn binary_images(document: &CrashDocument) -> Result<Vec<(ImageRange, BinaryImage)>> {
	let fallback_arch = optional::<String>(document, &[SYSTEM, CPU_ARCH]);
	document
		.value_if_present::<Vec<CrashDocument>>(&[BINARY_IMAGES])?
		.unwrap_or_default()
		.iter()
		.map(|image| binary_image(image, fallback_arch.as_deref()))
		.collect()
}

fn binary_image(image: &CrashDocument, fallback_arch: Option<&str>) -> Result<(ImageRange, BinaryImage)> {
	let path = image.value::<String>(&[NAME])?;
	let load_address = image.value::<u64>(&[IMAGE_ADDR])?;
	let size = image.value::<u64>(&[IMAGE_SIZE])?;

	let architecture = match (
		image.value_if_present::<i64>(&[CPU_TYPE])?,
		image.value_if_present::<i64>(&[CPU_SUBTYPE])?,
	) {
		(Some(cpu_type), subtype) => frame::architecture(cpu_type, subtype.unwrap_or(0)),
		(None, _) => None,
	}
	.or(fallback_arch)
	.unwrap_or("unknown");

	let range = ImageRange {
		library_name: frame::library_name(&path).to_string(),
		load_address,
		size,
	};
	let image = BinaryImage {
		library_name: range.library_name.clone(),
		uuid: image
			.value_if_present::<String>(&[UUID])?
			.unwrap_or_else(|| UNKNOWN.to_string()),
		architecture: architecture.to_string(),
		load_address,
		max_address: range.max_address(),
		is_system_library: frame::is_system_library(&path),
	};
	Ok((range, image))
}

fn thread(raw: &CrashDocument, images: &[ImageRange]) -> Result<Thread> {
	let index = raw.value::<u64>(&[INDEX])?;
	let crashed = raw.value::<bool>(&[CRASHED])?;
	let name = raw
		.value_if_present::<String>(&[NAME])?
		.unwrap_or_else(|| format!("Thread {index}"));

	let frames = raw
		.value_if_present::<Vec<CrashDocument>>(&[BACKTRACE, CONTENTS])?
		.unwrap_or_default();
	let lines = frames
		.iter()
		.enumerate()
		.map(|(position, frame)| stack_line(position, frame, images))
		.collect::<Result<Vec<_>>>()?;

	let stack = if lines.is_empty() {
		EMPTY_STACK.to_string()
	} else {
		lines.join("\n")
	};

	Ok(Thread {
		index,
		name,
		crashed,
		stack,
	})
}

fn stack_line(position: usize, raw: &CrashDocument, images: &[ImageRange]) -> Result<String> {
	let instruction = raw.value::<u64>(&[INSTRUCTION_ADDR])?;
	let object = raw.value_if_present::<u64>(&[OBJECT_ADDR])?;

	let line = match frame::find_image(images, object.unwrap_or(instruction)) {
		Some(image) => frame::format_frame(
			position,
			&image.library_name,
			instruction,
			image.load_address,
			object.unwrap_or(image.load_address),
		),
		None => {
			let object_name = raw.value_if_present::<String>(&[OBJECT_NAME])?;
			let library = object_name
				.as_deref()
				.map(frame::library_name)
				.unwrap_or(EMPTY_STACK);
			let base = object.unwrap_or(instruction);
			frame::format_frame(position, library, instruction, base, base)
		}
	};
	Ok(line)
}

fn process(document: &CrashDocument, name: &str, id: &str) -> Option<String> {
	let name = optional::<String>(document, &[SYSTEM, name])?;
	match optional::<i64>(document, &[SYSTEM, id]) {
		Some(pid) => Some(format!("{name} [{pid}]")),
		None => Some(name),
	}
}

fn meta(document: &CrashDocument, crash: &CrashDocument) -> CrashMeta {
	CrashMeta {
		incident_identifier: optional(document, &[REPORT, ID]),
		process: process(document, PROCESS_NAME, PROCESS_ID),
		parent_process: process(document, PARENT_PROCESS_NAME, PARENT_PROCESS_ID),
		path: optional(document, &[SYSTEM, EXECUTABLE_PATH]),
		code_type: optional(document, &[SYSTEM, CPU_ARCH]),
		exception_type: optional(crash, &[ERROR, MACH, EXCEPTION_NAME]),
		exception_codes: optional(crash, &[ERROR, MACH, CODE_NAME]),
	}
}

/// Decodes the host-provided context, stored base64-encoded under `user.dd`.
fn context(document: &CrashDocument) -> Result<Option<Vec<u8>>> {
	let Some(encoded) = document.value_if_present::<String>(&[USER, CONTEXT])? else {
		return Ok(None);
	};
	Ok(Some(
		STANDARD
			.decode(encoded.as_bytes())
			.unwrap_or_else(|_| encoded.into_bytes()),
	))
}
