// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Loom session tracking.
//!
//! - [`SessionId`] / [`ViewId`]: identities of sessions and the views shown in them
//! - [`SessionState`]: what the previous process knew about its session
//! - [`sample`] and [`SessionSampler`]: session sampling, deterministic or random

pub mod error;
pub mod sampling;
pub mod session;
pub mod view;

pub use error::{Result, SessionsError};
pub use sampling::{
	sample, DeterministicSampler, RandomSampler, SampleRate, SamplerKind, SessionSampler,
	SAMPLING_MULTIPLIER,
};
pub use session::{SessionId, SessionState};
pub use view::ViewId;
