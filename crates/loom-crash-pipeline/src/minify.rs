// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shrinks a crash report before normalization: long backtraces keep only
//! their top and bottom frames, and binary images that no frame points into
//! are dropped.

use std::collections::BTreeSet;

use loom_crash_core::keys::{
	BACKTRACE, BINARY_IMAGES, CONTENTS, CRASH, IMAGE_ADDR, IMAGE_SIZE, INSTRUCTION_ADDR, OBJECT_ADDR,
	RECRASH_REPORT, THREADS, TRUNCATED,
};
use loom_crash_core::CrashDocument;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::filter::CrashReportFilter;

/// Default maximum number of frames kept per thread.
pub const DEFAULT_STACK_FRAMES_LIMIT: usize = 100;

/// Roots holding a `crash.threads` / `binary_images` pair.
const REPORT_ROOTS: &[&[&str]] = &[&[], &[RECRASH_REPORT]];

fn join<'a>(root: &[&'a str], tail: &[&'a str]) -> Vec<&'a str> {
	root.iter().chain(tail).copied().collect()
}

/// Splits a frame count into the frames kept from the top and from the bottom.
///
/// `top` is `limit / 2` rounded down, so an odd limit keeps one more frame at
/// the bottom.
pub fn split_limit(limit: usize) -> (usize, usize) {
	let top = limit / 2;
	(top, limit - top)
}

/// Drops the middle of a backtrace longer than `limit` and marks it truncated.
///
/// Threads at or under the limit are returned unchanged.
pub fn truncate_thread(mut thread: CrashDocument, limit: usize) -> Result<CrashDocument> {
	let path = [BACKTRACE, CONTENTS];
	let Some(mut frames) = thread.value_if_present::<Vec<CrashDocument>>(&path)? else {
		return Ok(thread);
	};
	if frames.len() <= limit {
		return Ok(thread);
	}

	let (top, _) = split_limit(limit);
	let removed = frames.len() - limit;
	frames.drain(top..top + removed);

	thread.set_value(&path, frames)?;
	thread.set_value(&[BACKTRACE, TRUNCATED], true)?;
	Ok(thread)
}

/// Address a frame is attributed to: its `object_addr`, or the instruction
/// address when the unwinder could not tell which image it belongs to.
pub(crate) fn frame_address(frame: &CrashDocument) -> Result<Option<u64>> {
	match frame.value_if_present::<u64>(&[OBJECT_ADDR])? {
		Some(address) => Ok(Some(address)),
		None => Ok(frame.value_if_present::<u64>(&[INSTRUCTION_ADDR])?),
	}
}

fn collect_addresses(thread: &CrashDocument, addresses: &mut BTreeSet<u64>) -> Result<()> {
	let frames = thread
		.value_if_present::<Vec<CrashDocument>>(&[BACKTRACE, CONTENTS])?
		.unwrap_or_default();
	for frame in &frames {
		if let Some(address) = frame_address(frame)? {
			addresses.insert(address);
		}
	}
	Ok(())
}

/// The re-crash report is optional: when it, or its crash node, is not a map
/// it is left alone instead of failing the whole report.
fn skip_malformed(document: &CrashDocument, root: &[&str], tail: &[&str]) -> bool {
	if root.is_empty() {
		return false;
	}
	let path = join(root, tail);
	for depth in root.len()..=path.len() {
		if let Err(err) = document.value_if_present::<CrashDocument>(&path[..depth]) {
			warn!(error = %err, "embedded crash report is malformed, not minifying it");
			return true;
		}
	}
	false
}

fn image_is_referenced(image: &CrashDocument, addresses: &BTreeSet<u64>) -> Result<bool> {
	let start = image.value::<u64>(&[IMAGE_ADDR])?;
	let end = start.saturating_add(image.value::<u64>(&[IMAGE_SIZE])?);
	Ok(addresses.range(start..end).next().is_some())
}

/// Truncates every thread's backtrace to `limit` frames, then keeps only the
/// binary images some remaining frame points into. Applies to the embedded
/// re-crash report as well. Relative order of frames and images is preserved.
pub fn minify(mut document: CrashDocument, limit: usize) -> Result<CrashDocument> {
	let mut addresses = BTreeSet::new();
	let mut truncated_threads = 0usize;

	for root in REPORT_ROOTS {
		if skip_malformed(&document, root, &[CRASH]) {
			continue;
		}
		let threads_path = join(root, &[CRASH, THREADS]);
		let Some(threads) = document.value_if_present::<Vec<CrashDocument>>(&threads_path)? else {
			continue;
		};

		let mut minified = Vec::with_capacity(threads.len());
		for thread in threads {
			let was_truncated = thread.contains(&[BACKTRACE, TRUNCATED]);
			let thread = truncate_thread(thread, limit)?;
			if !was_truncated && thread.contains(&[BACKTRACE, TRUNCATED]) {
				truncated_threads += 1;
			}
			collect_addresses(&thread, &mut addresses)?;
			minified.push(thread);
		}
		document.set_value(&threads_path, minified)?;
	}

	let mut removed_images = 0usize;
	for root in REPORT_ROOTS {
		if skip_malformed(&document, root, &[]) {
			continue;
		}
		let images_path = join(root, &[BINARY_IMAGES]);
		let Some(images) = document.value_if_present::<Vec<CrashDocument>>(&images_path)? else {
			continue;
		};

		let total = images.len();
		let mut kept = Vec::with_capacity(total);
		for image in images {
			if image_is_referenced(&image, &addresses)? {
				kept.push(image);
			}
		}
		removed_images += total - kept.len();
		document.set_value(&images_path, kept)?;
	}

	debug!(
		limit,
		truncated_threads,
		removed_images,
		referenced_addresses = addresses.len(),
		"crash report minified"
	);
	Ok(document)
}

/// Pipeline stage wrapping [`minify`].
#[derive(Debug, Clone, Copy)]
pub struct MinifyFilter {
	stack_frames_limit: usize,
}

impl MinifyFilter {
	pub fn new(stack_frames_limit: usize) -> Result<Self> {
		if stack_frames_limit == 0 {
			return Err(PipelineError::InvalidStackFramesLimit(stack_frames_limit));
		}
		Ok(Self { stack_frames_limit })
	}

	pub fn stack_frames_limit(&self) -> usize {
		self.stack_frames_limit
	}
}

impl Default for MinifyFilter {
	fn default() -> Self {
		Self {
			stack_frames_limit: DEFAULT_STACK_FRAMES_LIMIT,
		}
	}
}

impl CrashReportFilter for MinifyFilter {
	fn name(&self) -> &'static str {
		"minify"
	}

	fn apply(&self, document: CrashDocument) -> Result<CrashDocument> {
		minify(document, self.stack_frames_limit)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;
	use serde_json::{json, Value};

	fn frames(count: usize) -> Vec<Value> {
		(0..count)
			.map(|i| json!({ "instruction_addr": 0x1000 + i as u64, "object_addr": 0x1000 }))
			.collect()
	}

	fn thread(frames: Vec<Value>) -> CrashDocument {
		CrashDocument::try_from(json!({ "index": 0, "crashed": true, "backtrace": { "contents": frames } }))
			.unwrap()
	}

	fn instruction_addrs(thread: &CrashDocument) -> Vec<u64> {
		thread
			.value::<Vec<CrashDocument>>(&["backtrace", "contents"])
			.unwrap()
			.iter()
			.map(|f| f.value::<u64>(&["instruction_addr"]).unwrap())
			.collect()
	}

	#[test]
	fn test_ten_frames_limit_six() {
		let result = truncate_thread(thread(frames(10)), 6).unwrap();
		let kept: Vec<u64> = instruction_addrs(&result).iter().map(|a| a - 0x1000).collect();
		assert_eq!(kept, vec![0, 1, 2, 7, 8, 9]);
		assert_eq!(result.value::<bool>(&["backtrace", "truncated"]), Ok(true));
	}

	#[test]
	fn test_odd_limit_keeps_extra_bottom_frame() {
		assert_eq!(split_limit(5), (2, 3));
		let result = truncate_thread(thread(frames(10)), 5).unwrap();
		let kept: Vec<u64> = instruction_addrs(&result).iter().map(|a| a - 0x1000).collect();
		assert_eq!(kept, vec![0, 1, 7, 8, 9]);
	}

	#[test]
	fn test_limit_one_keeps_last_frame() {
		let result = truncate_thread(thread(frames(4)), 1).unwrap();
		assert_eq!(instruction_addrs(&result), vec![0x1003]);
	}

	#[test]
	fn test_thread_at_limit_is_untouched() {
		let original = thread(frames(6));
		let result = truncate_thread(original.clone(), 6).unwrap();
		assert_eq!(result, original);
		assert!(!result.contains(&["backtrace", "truncated"]));
	}

	#[test]
	fn test_thread_without_backtrace_is_untouched() {
		let original = CrashDocument::try_from(json!({ "index": 3, "crashed": false })).unwrap();
		assert_eq!(truncate_thread(original.clone(), 2).unwrap(), original);
	}

	#[test]
	fn test_unreferenced_images_are_removed_in_order() {
		let document = CrashDocument::try_from(json!({
			"crash": { "threads": [
				{ "index": 0, "crashed": true, "backtrace": { "contents": [
					{ "instruction_addr": 0x3010, "object_addr": 0x3000 },
					{ "instruction_addr": 0x1010, "object_addr": 0x1000 }
				] } }
			] },
			"binary_images": [
				{ "name": "/a", "image_addr": 0x1000, "image_size": 0x100 },
				{ "name": "/b", "image_addr": 0x2000, "image_size": 0x100 },
				{ "name": "/c", "image_addr": 0x3000, "image_size": 0x100 }
			]
		}))
		.unwrap();

		let result = minify(document, 100).unwrap();
		let names: Vec<String> = result
			.value::<Vec<CrashDocument>>(&["binary_images"])
			.unwrap()
			.iter()
			.map(|i| i.value::<String>(&["name"]).unwrap())
			.collect();
		assert_eq!(names, vec!["/a", "/c"]);
	}

	#[test]
	fn test_recrash_frames_keep_images_alive() {
		let document = CrashDocument::try_from(json!({
			"crash": { "threads": [] },
			"recrash_report": { "crash": { "threads": [
				{ "index": 0, "crashed": true, "backtrace": { "contents": [
					{ "instruction_addr": 0x2004, "object_addr": 0x2000 }
				] } }
			] } },
			"binary_images": [
				{ "name": "/a", "image_addr": 0x1000, "image_size": 0x100 },
				{ "name": "/b", "image_addr": 0x2000, "image_size": 0x100 }
			]
		}))
		.unwrap();

		let result = minify(document, 100).unwrap();
		let images = result.value::<Vec<CrashDocument>>(&["binary_images"]).unwrap();
		assert_eq!(images.len(), 1);
		assert_eq!(images[0].value::<String>(&["name"]).unwrap(), "/b");
	}

	#[test]
	fn test_images_referenced_only_by_dropped_frames_are_removed() {
		let mut contents = frames(10);
		contents[5] = json!({ "instruction_addr": 0x9004, "object_addr": 0x9000 });
		let document = CrashDocument::try_from(json!({
			"crash": { "threads": [{ "index": 0, "crashed": true, "backtrace": { "contents": contents } }] },
			"binary_images": [
				{ "name": "/main", "image_addr": 0x1000, "image_size": 0x1000 },
				{ "name": "/middle", "image_addr": 0x9000, "image_size": 0x100 }
			]
		}))
		.unwrap();

		let result = minify(document, 6).unwrap();
		let images = result.value::<Vec<CrashDocument>>(&["binary_images"]).unwrap();
		assert_eq!(images.len(), 1);
	}

	#[test]
	fn test_missing_threads_and_images() {
		let document = CrashDocument::try_from(json!({ "crash": {} })).unwrap();
		let result = minify(document.clone(), 10).unwrap();
		assert_eq!(result, document);
	}

	#[test]
	fn test_malformed_recrash_report_is_left_alone() {
		for recrash in [json!("garbage"), json!({ "crash": 7 })] {
			let document = CrashDocument::try_from(json!({
				"crash": { "threads": [
					{ "index": 0, "crashed": true, "backtrace": { "contents": frames(10) } }
				] },
				"recrash_report": recrash.clone(),
				"binary_images": [
					{ "name": "/a", "image_addr": 0x1000, "image_size": 0x100 },
					{ "name": "/b", "image_addr": 0x2000, "image_size": 0x100 }
				]
			}))
			.unwrap();

			let result = minify(document, 6).unwrap();
			assert_eq!(result.value::<Vec<CrashDocument>>(&["binary_images"]).unwrap().len(), 1);
			let threads = result.value::<Vec<CrashDocument>>(&["crash", "threads"]).unwrap();
			assert_eq!(threads[0].value::<bool>(&["backtrace", "truncated"]), Ok(true));
			assert_eq!(result.as_map()["recrash_report"], recrash);
		}
	}

	#[test]
	fn test_zero_limit_rejected() {
		assert!(matches!(
			MinifyFilter::new(0),
			Err(PipelineError::InvalidStackFramesLimit(0))
		));
		assert_eq!(MinifyFilter::default().stack_frames_limit(), DEFAULT_STACK_FRAMES_LIMIT);
	}

	proptest! {
		#[test]
		fn truncation_keeps_head_and_tail(count in 0usize..64, limit in 1usize..32) {
			let input = thread(frames(count));
			let original = instruction_addrs(&input);
			let result = truncate_thread(input, limit).unwrap();
			let kept = instruction_addrs(&result);

			if count <= limit {
				prop_assert_eq!(&kept, &original);
				prop_assert!(!result.contains(&["backtrace", "truncated"]));
			} else {
				let (top, bottom) = split_limit(limit);
				prop_assert_eq!(kept.len(), limit);
				prop_assert_eq!(&kept[..top], &original[..top]);
				prop_assert_eq!(&kept[top..], &original[count - bottom..]);
				prop_assert_eq!(result.value::<bool>(&["backtrace", "truncated"]), Ok(true));
			}
		}

		#[test]
		fn pruning_keeps_exactly_referenced_images(
			referenced in prop::collection::btree_set(0u64..16, 0..8),
			image_count in 0u64..16,
		) {
			// Image i spans [i * 0x1000, i * 0x1000 + 0x800); frames point at
			// the base of the referenced slots.
			let contents: Vec<Value> = referenced
				.iter()
				.map(|slot| json!({ "instruction_addr": slot * 0x1000 + 4, "object_addr": slot * 0x1000 }))
				.collect();
			let images: Vec<Value> = (0..image_count)
				.map(|i| json!({ "name": format!("/lib{i}"), "image_addr": i * 0x1000, "image_size": 0x800 }))
				.collect();
			let document = CrashDocument::try_from(json!({
				"crash": { "threads": [{ "index": 0, "crashed": true, "backtrace": { "contents": contents } }] },
				"binary_images": images
			}))
			.unwrap();

			let result = minify(document, 100).unwrap();
			let kept: Vec<u64> = result
				.value::<Vec<CrashDocument>>(&["binary_images"])
				.unwrap()
				.iter()
				.map(|i| i.value::<u64>(&["image_addr"]).unwrap() / 0x1000)
				.collect();
			let expected: Vec<u64> = referenced.iter().copied().filter(|slot| *slot < image_count).collect();
			prop_assert_eq!(kept, expected);
		}
	}
}
