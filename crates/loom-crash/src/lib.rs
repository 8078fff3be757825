// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Crash reporting SDK for Loom.
//!
//! On launch, the crash persisted by the previous process is read once,
//! normalized by [`loom_crash_pipeline`], and attached to the session and
//! view it most plausibly belongs to:
//!
//! - the last view, if it was updated within the freshness window
//! - the last view's session without touching the view, if it is stale
//! - a synthetic `ApplicationLaunch` or `Background` view otherwise
//!
//! Events go through the [`FeatureScope`], which gates writes on tracking
//! consent and serializes them with host updates to the [`CrashContext`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use loom_crash::{CrashContext, CrashReporting, FeatureScope, FileCrashReportSource};
//!
//! let scope = Arc::new(FeatureScope::new(CrashContext::new("app-id"), writer));
//! let reporting = CrashReporting::builder()
//!     .config(loom_crash::load_config_from_env()?)
//!     .source(FileCrashReportSource::new("/var/mobile/crash/report.json"))
//!     .scope(scope)
//!     .build_async()
//!     .await?;
//! reporting.start();
//! ```

pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod receiver;
pub mod reconcile;
pub mod scope;
pub mod source;

pub use client::{CrashReporting, CrashReportingBuilder};
pub use config::{
	load_config_from_env, load_config_with_file, load_from_sources, ConfigError, ConfigSource,
	CrashReportingConfig, CrashReportingConfigLayer, DefaultsSource, EnvSource, Precedence,
	TomlSource, DEFAULT_FRESHNESS_WINDOW,
};
pub use context::{CrashContext, LastView, TrackingConsent};
pub use error::{CrashSdkError, Result};
pub use event::{ErrorEvent, MonitoringEvent, ViewEvent, ViewRef};
pub use receiver::{CrashReportMessage, CrashReportReceiver};
pub use reconcile::{DropReason, Outcome, ReconcileState, Reconciler, SyntheticViewKind};
pub use scope::{ConsentGate, EventWriter, FeatureScope, InMemoryEventWriter, ScopeGuard};
pub use source::{CrashReportSource, FileCrashReportSource};

pub use loom_crash_core::CrashReport;
pub use loom_crash_pipeline::CrashPipeline;
pub use loom_sessions_core::{SampleRate, SamplerKind, SessionId, SessionState, ViewId};
