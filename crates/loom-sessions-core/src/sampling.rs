// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Session sampling.
//!
//! [`sample`] is deterministic: the decision depends only on the seed and the
//! rate, so two independent pipelines fed the same seed (for example a trace
//! id or a session id) agree on acceptance without talking to each other.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionsError};

/// Odd multiplier spreading sequential seeds across the `u64` range.
pub const SAMPLING_MULTIPLIER: u64 = 1_111_111_111_111_111_111;

/// A sampling percentage in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SampleRate(f64);

impl SampleRate {
	pub const ALL: Self = Self(100.0);
	pub const NONE: Self = Self(0.0);

	/// Builds a rate, clamping to `[0, 100]`. NaN becomes 0.
	#[must_use]
	pub fn new(percent: f64) -> Self {
		if percent.is_nan() {
			return Self::NONE;
		}
		Self(percent.clamp(0.0, 100.0))
	}

	/// Builds a rate, rejecting values outside `[0, 100]`.
	pub fn try_new(percent: f64) -> Result<Self> {
		if percent.is_nan() || !(0.0..=100.0).contains(&percent) {
			return Err(SessionsError::InvalidSampleRate(percent));
		}
		Ok(Self(percent))
	}

	#[must_use]
	pub fn percent(self) -> f64 {
		self.0
	}
}

impl Default for SampleRate {
	fn default() -> Self {
		Self::ALL
	}
}

impl std::fmt::Display for SampleRate {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}%", self.0)
	}
}

/// Deterministic accept/reject for `seed` at `rate`.
///
/// `hash = seed * SAMPLING_MULTIPLIER (mod 2^64)`, accepted when
/// `hash < u64::MAX * rate / 100`.
#[must_use]
pub fn sample(seed: u64, rate: SampleRate) -> bool {
	if rate.0 <= 0.0 {
		return false;
	}
	if rate.0 >= 100.0 {
		return true;
	}
	let hash = seed.wrapping_mul(SAMPLING_MULTIPLIER);
	let threshold = (u64::MAX as f64 * (rate.0 / 100.0)) as u64;
	hash < threshold
}

/// Decides whether a new session is kept.
pub trait SessionSampler: Send + Sync {
	fn rate(&self) -> SampleRate;

	/// `seed` identifies the session; samplers may ignore it.
	fn sample(&self, seed: u64) -> bool;
}

/// Sampler whose decision is a pure function of the seed.
#[derive(Debug, Clone, Copy)]
pub struct DeterministicSampler {
	rate: SampleRate,
}

impl DeterministicSampler {
	#[must_use]
	pub fn new(rate: SampleRate) -> Self {
		Self { rate }
	}
}

impl SessionSampler for DeterministicSampler {
	fn rate(&self) -> SampleRate {
		self.rate
	}

	fn sample(&self, seed: u64) -> bool {
		sample(seed, self.rate)
	}
}

/// Sampler drawing a fresh uniform random number for every decision.
#[derive(Debug, Clone, Copy)]
pub struct RandomSampler {
	rate: SampleRate,
}

impl RandomSampler {
	#[must_use]
	pub fn new(rate: SampleRate) -> Self {
		Self { rate }
	}
}

impl SessionSampler for RandomSampler {
	fn rate(&self) -> SampleRate {
		self.rate
	}

	fn sample(&self, _seed: u64) -> bool {
		match self.rate.0 {
			r if r <= 0.0 => false,
			r if r >= 100.0 => true,
			r => fastrand::f64() * 100.0 < r,
		}
	}
}

/// Which sampler the SDK uses for sessions minted from a crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
	#[default]
	Deterministic,
	Random,
}

impl SamplerKind {
	/// Builds the sampler for `rate`.
	#[must_use]
	pub fn build(self, rate: SampleRate) -> Box<dyn SessionSampler> {
		match self {
			SamplerKind::Deterministic => Box::new(DeterministicSampler::new(rate)),
			SamplerKind::Random => Box::new(RandomSampler::new(rate)),
		}
	}
}

impl std::fmt::Display for SamplerKind {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			SamplerKind::Deterministic => write!(f, "deterministic"),
			SamplerKind::Random => write!(f, "random"),
		}
	}
}

impl std::str::FromStr for SamplerKind {
	type Err = SessionsError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"deterministic" => Ok(SamplerKind::Deterministic),
			"random" => Ok(SamplerKind::Random),
			_ => Err(SessionsError::InvalidSamplerKind(s.to_string())),
		}
	}
}
