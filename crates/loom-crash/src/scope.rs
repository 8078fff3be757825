// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Serialized access to the crash feature's context and event writer.
//!
//! Reading the context and writing the resulting events happen under one
//! lock, so two crash-processing attempts (or crash processing and a host
//! update to the context) never interleave.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::context::{CrashContext, TrackingConsent};
use crate::error::Result;
use crate::event::MonitoringEvent;

/// Sink for monitoring events. Storage and upload happen behind it.
pub trait EventWriter: Send {
	/// Writes `events` as one unit: either all of them are stored or none.
	fn write(&mut self, events: &[MonitoringEvent]) -> Result<()>;
}

/// Keeps written events in memory; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventWriter {
	events: Arc<StdMutex<Vec<MonitoringEvent>>>,
}

impl InMemoryEventWriter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn events(&self) -> Vec<MonitoringEvent> {
		self.events
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub fn len(&self) -> usize {
		self.events
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl EventWriter for InMemoryEventWriter {
	fn write(&mut self, events: &[MonitoringEvent]) -> Result<()> {
		self.events
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.extend_from_slice(events);
		Ok(())
	}
}

/// Drops writes unless consent is granted or the write bypasses consent.
pub struct ConsentGate<'a> {
	inner: &'a mut dyn EventWriter,
	consent: TrackingConsent,
	bypass_consent: bool,
}

impl ConsentGate<'_> {
	pub fn is_open(&self) -> bool {
		self.bypass_consent || self.consent == TrackingConsent::Granted
	}
}

impl EventWriter for ConsentGate<'_> {
	fn write(&mut self, events: &[MonitoringEvent]) -> Result<()> {
		if !self.is_open() {
			warn!(
				consent = %self.consent,
				events = events.len(),
				"monitoring events discarded, tracking consent not granted"
			);
			return Ok(());
		}
		self.inner.write(events)
	}
}

struct ScopeState {
	context: CrashContext,
	writer: Box<dyn EventWriter>,
}

/// Exclusive access to the scope, held until dropped.
pub struct ScopeGuard<'a> {
	state: MutexGuard<'a, ScopeState>,
}

impl ScopeGuard<'_> {
	pub fn context(&self) -> &CrashContext {
		&self.state.context
	}

	pub fn context_mut(&mut self) -> &mut CrashContext {
		&mut self.state.context
	}

	/// The context together with a writer gated on its consent.
	pub fn write_context(&mut self, bypass_consent: bool) -> (&CrashContext, ConsentGate<'_>) {
		let ScopeState { context, writer } = &mut *self.state;
		let gate = ConsentGate {
			inner: writer.as_mut(),
			consent: context.tracking_consent,
			bypass_consent,
		};
		(&*context, gate)
	}
}

/// The crash feature's view of the host SDK.
pub struct FeatureScope {
	state: Mutex<ScopeState>,
}

impl FeatureScope {
	pub fn new(context: CrashContext, writer: impl EventWriter + 'static) -> Self {
		Self {
			state: Mutex::new(ScopeState {
				context,
				writer: Box::new(writer),
			}),
		}
	}

	pub async fn lock(&self) -> ScopeGuard<'_> {
		ScopeGuard {
			state: self.state.lock().await,
		}
	}

	/// Snapshot of the current context.
	pub async fn context(&self) -> CrashContext {
		self.state.lock().await.context.clone()
	}

	pub async fn update_context(&self, update: impl FnOnce(&mut CrashContext)) {
		update(&mut self.state.lock().await.context);
	}

	pub async fn set_tracking_consent(&self, consent: TrackingConsent) {
		debug!(consent = %consent, "tracking consent updated");
		self.update_context(|context| context.tracking_consent = consent)
			.await;
	}

	/// Runs `f` with the current context and a consent-gated writer, holding
	/// the scope lock for the whole call.
	pub async fn event_write_context<R>(
		&self,
		bypass_consent: bool,
		f: impl FnOnce(&CrashContext, &mut dyn EventWriter) -> R,
	) -> R {
		let mut guard = self.lock().await;
		let (context, mut writer) = guard.write_context(bypass_consent);
		f(context, &mut writer)
	}
}

impl std::fmt::Debug for FeatureScope {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FeatureScope").finish_non_exhaustive()
	}
}
