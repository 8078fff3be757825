// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporting configuration.
//!
//! Layered from built-in defaults, an optional TOML file and `LOOM_CRASH_*`
//! environment variables, in increasing precedence.
//!
//! ```toml
//! stack_frames_limit = 100
//! session_sample_rate = 25.0
//! background_events_tracking = true
//! freshness_window_secs = 14400
//! sampler = "deterministic"
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use loom_crash_pipeline::DEFAULT_STACK_FRAMES_LIMIT;
use loom_sessions_core::{SampleRate, SamplerKind};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

/// Default time after which the last view of a crashed process is no longer updated.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(4 * 60 * 60);

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read config file {path}: {source}")]
	FileRead {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("TOML parse error in {path}: {source}")]
	TomlParse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},

	#[error("invalid value for {key}: {message}")]
	InvalidValue { key: String, message: String },

	#[error("validation error: {0}")]
	Validation(String),
}

/// Partially specified configuration, as read from one source.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CrashReportingConfigLayer {
	pub stack_frames_limit: Option<usize>,
	pub session_sample_rate: Option<f64>,
	pub background_events_tracking: Option<bool>,
	pub freshness_window_secs: Option<u64>,
	pub sampler: Option<SamplerKind>,
}

impl CrashReportingConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.stack_frames_limit.is_some() {
			self.stack_frames_limit = other.stack_frames_limit;
		}
		if other.session_sample_rate.is_some() {
			self.session_sample_rate = other.session_sample_rate;
		}
		if other.background_events_tracking.is_some() {
			self.background_events_tracking = other.background_events_tracking;
		}
		if other.freshness_window_secs.is_some() {
			self.freshness_window_secs = other.freshness_window_secs;
		}
		if other.sampler.is_some() {
			self.sampler = other.sampler;
		}
	}

	pub fn finalize(self) -> Result<CrashReportingConfig, ConfigError> {
		let stack_frames_limit = self.stack_frames_limit.unwrap_or(DEFAULT_STACK_FRAMES_LIMIT);
		if stack_frames_limit == 0 {
			return Err(ConfigError::Validation(
				"stack_frames_limit must be at least 1".to_string(),
			));
		}

		let session_sample_rate = SampleRate::try_new(self.session_sample_rate.unwrap_or(100.0))
			.map_err(|e| ConfigError::Validation(e.to_string()))?;

		let freshness_window = self
			.freshness_window_secs
			.map(Duration::from_secs)
			.unwrap_or(DEFAULT_FRESHNESS_WINDOW);
		if freshness_window.is_zero() {
			return Err(ConfigError::Validation(
				"freshness_window_secs must be positive".to_string(),
			));
		}

		Ok(CrashReportingConfig {
			stack_frames_limit,
			session_sample_rate,
			background_events_tracking: self.background_events_tracking.unwrap_or(false),
			freshness_window,
			sampler: self.sampler.unwrap_or_default(),
		})
	}
}

/// Fully resolved crash reporting configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CrashReportingConfig {
	/// Frames kept per thread before the middle of a backtrace is dropped.
	pub stack_frames_limit: usize,
	/// Percentage of sessions minted for crashes that are kept.
	pub session_sample_rate: SampleRate,
	pub background_events_tracking: bool,
	pub freshness_window: Duration,
	pub sampler: SamplerKind,
}

impl Default for CrashReportingConfig {
	fn default() -> Self {
		Self {
			stack_frames_limit: DEFAULT_STACK_FRAMES_LIMIT,
			session_sample_rate: SampleRate::ALL,
			background_events_tracking: false,
			freshness_window: DEFAULT_FRESHNESS_WINDOW,
			sampler: SamplerKind::Deterministic,
		}
	}
}

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<CrashReportingConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<CrashReportingConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(CrashReportingConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is skipped.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<CrashReportingConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(CrashReportingConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: CrashReportingConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `LOOM_CRASH_<FIELD>`.
#[derive(Default)]
pub struct EnvSource {
	vars: Option<HashMap<String, String>>,
}

impl EnvSource {
	/// Reads from the process environment.
	pub fn new() -> Self {
		Self::default()
	}

	/// Reads from a fixed set of variables instead of the process environment.
	pub fn from_vars(vars: HashMap<String, String>) -> Self {
		Self { vars: Some(vars) }
	}

	fn var(&self, name: &str) -> Option<String> {
		let value = match &self.vars {
			Some(vars) => vars.get(name).cloned(),
			None => std::env::var(name).ok(),
		};
		value.filter(|s| !s.is_empty())
	}

	fn parsed<T: std::str::FromStr>(&self, name: &str, what: &str) -> Result<Option<T>, ConfigError> {
		match self.var(name) {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid {what} value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn bool(&self, name: &str) -> Option<bool> {
		self.var(name)
			.map(|v| v.eq_ignore_ascii_case("true") || v == "1")
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<CrashReportingConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(CrashReportingConfigLayer {
			stack_frames_limit: self.parsed("LOOM_CRASH_STACK_FRAMES_LIMIT", "usize")?,
			session_sample_rate: self.parsed("LOOM_CRASH_SESSION_SAMPLE_RATE", "f64")?,
			background_events_tracking: self.bool("LOOM_CRASH_BACKGROUND_EVENTS_TRACKING"),
			freshness_window_secs: self.parsed("LOOM_CRASH_FRESHNESS_WINDOW_SECS", "u64")?,
			sampler: self.parsed("LOOM_CRASH_SAMPLER", "sampler")?,
		})
	}
}

/// Merges `sources` by precedence and finalizes the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<CrashReportingConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = CrashReportingConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		merged.merge(source.load()?);
	}

	let config = merged.finalize()?;
	info!(
		stack_frames_limit = config.stack_frames_limit,
		session_sample_rate = %config.session_sample_rate,
		background_events_tracking = config.background_events_tracking,
		freshness_window_secs = config.freshness_window.as_secs(),
		sampler = %config.sampler,
		"crash reporting configuration loaded"
	);
	Ok(config)
}

/// Loads configuration from defaults, `config_path` and the environment.
pub fn load_config_with_file(
	config_path: impl Into<PathBuf>,
) -> Result<CrashReportingConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Loads configuration from defaults and the environment only.
pub fn load_config_from_env() -> Result<CrashReportingConfig, ConfigError> {
	load_from_sources(vec![Box::new(DefaultsSource), Box::new(EnvSource::new())])
}
