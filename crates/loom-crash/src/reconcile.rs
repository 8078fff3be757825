// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Decides where a crash from the previous process belongs.
//!
//! The crash is only discovered after restart, so it has to be attributed
//! from a snapshot of the crashed process's state:
//!
//! | State                   | Outcome                                           |
//! |-------------------------|---------------------------------------------------|
//! | fresh last view         | error on that view, view marked crashed           |
//! | stale last view         | standalone error in that view's session           |
//! | prior session, no view  | synthetic view in the prior session, or drop      |
//! | no prior session        | synthetic view in a new sampled session, or drop  |
//!
//! [`Reconciler::reconcile`] is pure: it returns an [`Outcome`] and the
//! caller performs the single write.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use loom_crash_core::CrashReport;
use loom_sessions_core::{SessionId, SessionSampler, ViewId};
use tracing::{debug, info};

use crate::config::CrashReportingConfig;
use crate::context::{CrashContext, LastView};
use crate::event::{ErrorEvent, MonitoringEvent, ViewEvent};

/// Which of the four situations a crash falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileState {
	FreshLastView,
	StaleLastView,
	PriorSessionNoView,
	NoPriorSession,
}

impl std::fmt::Display for ReconcileState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			ReconcileState::FreshLastView => write!(f, "fresh_last_view"),
			ReconcileState::StaleLastView => write!(f, "stale_last_view"),
			ReconcileState::PriorSessionNoView => write!(f, "prior_session_no_view"),
			ReconcileState::NoPriorSession => write!(f, "no_prior_session"),
		}
	}
}

/// Synthetic views created to host a crash that happened outside any view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticViewKind {
	ApplicationLaunch,
	Background,
}

impl SyntheticViewKind {
	pub fn name(self) -> &'static str {
		match self {
			SyntheticViewKind::ApplicationLaunch => "ApplicationLaunch",
			SyntheticViewKind::Background => "Background",
		}
	}

	pub fn url(self) -> &'static str {
		match self {
			SyntheticViewKind::ApplicationLaunch => "com/datadog/application-launch/view",
			SyntheticViewKind::Background => "com/datadog/background/view",
		}
	}
}

/// Why a crash produced no events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
	/// The last view, fresh or stale, already carries a crash.
	DuplicateCrash,
	/// Crashed in the background with background tracking disabled.
	BackgroundTrackingDisabled,
	/// Crashed in the foreground after a view was already tracked, but that view is gone.
	NoViewToAttach,
	/// The newly minted session was rejected by the sampler.
	NotSampled,
}

impl std::fmt::Display for DropReason {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			DropReason::DuplicateCrash => write!(f, "duplicate_crash"),
			DropReason::BackgroundTrackingDisabled => write!(f, "background_tracking_disabled"),
			DropReason::NoViewToAttach => write!(f, "no_view_to_attach"),
			DropReason::NotSampled => write!(f, "not_sampled"),
		}
	}
}

/// The single write a crash results in, or none.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
	/// Error on the still-fresh last view, plus the updated view.
	AttachToLastView { error: ErrorEvent, view: ViewEvent },
	/// Error linked to a stale view; the view itself is left untouched.
	ErrorOnly { error: ErrorEvent },
	/// Error on a synthetic view.
	SyntheticView {
		kind: SyntheticViewKind,
		new_session: bool,
		error: ErrorEvent,
		view: ViewEvent,
	},
	Dropped(DropReason),
}

impl Outcome {
	/// Whether the write goes through regardless of tracking consent.
	pub fn bypasses_consent(&self) -> bool {
		matches!(self, Outcome::AttachToLastView { .. })
	}

	pub fn is_dropped(&self) -> bool {
		matches!(self, Outcome::Dropped(_))
	}

	/// Events of the write, error first.
	pub fn into_events(self) -> Vec<MonitoringEvent> {
		match self {
			Outcome::AttachToLastView { error, view } | Outcome::SyntheticView { error, view, .. } => {
				vec![MonitoringEvent::Error(error), MonitoringEvent::View(view)]
			}
			Outcome::ErrorOnly { error } => vec![MonitoringEvent::Error(error)],
			Outcome::Dropped(_) => Vec::new(),
		}
	}
}

/// Crash-to-session reconciliation.
pub struct Reconciler {
	freshness_window: TimeDelta,
	sampler: Box<dyn SessionSampler>,
	mint_session_id: Box<dyn Fn() -> SessionId + Send + Sync>,
}

impl Reconciler {
	pub fn new(freshness_window: Duration, sampler: Box<dyn SessionSampler>) -> Self {
		Self {
			freshness_window: TimeDelta::from_std(freshness_window).unwrap_or(TimeDelta::MAX),
			sampler,
			mint_session_id: Box::new(SessionId::new),
		}
	}

	pub fn from_config(config: &CrashReportingConfig) -> Self {
		Self::new(
			config.freshness_window,
			config.sampler.build(config.session_sample_rate),
		)
	}

	/// Replaces how new session ids are generated.
	pub fn with_session_id_source(
		mut self,
		source: impl Fn() -> SessionId + Send + Sync + 'static,
	) -> Self {
		self.mint_session_id = Box::new(source);
		self
	}

	pub fn state(&self, context: &CrashContext, now: DateTime<Utc>) -> ReconcileState {
		match (&context.last_view, &context.last_session_state) {
			(Some(view), _) if now - view.date < self.freshness_window => ReconcileState::FreshLastView,
			(Some(_), _) => ReconcileState::StaleLastView,
			(None, Some(_)) => ReconcileState::PriorSessionNoView,
			(None, None) => ReconcileState::NoPriorSession,
		}
	}

	pub fn reconcile(&self, report: &CrashReport, context: &CrashContext, now: DateTime<Utc>) -> Outcome {
		let state = self.state(context, now);
		let crash_date = context.to_server_time(report.date);

		let outcome = match (state, &context.last_view) {
			(ReconcileState::FreshLastView | ReconcileState::StaleLastView, Some(view))
				if view.crash_count > 0 =>
			{
				Outcome::Dropped(DropReason::DuplicateCrash)
			}
			(ReconcileState::FreshLastView, Some(view)) => attach_to_view(report, context, view, crash_date),
			(ReconcileState::StaleLastView, Some(view)) => Outcome::ErrorOnly {
				error: ErrorEvent::from_report(
					report,
					crash_date,
					&context.application_id,
					view.session_id,
					view.view_ref(),
				),
			},
			(ReconcileState::NoPriorSession, _) => self.synthetic(report, context, crash_date, true),
			_ => self.synthetic(report, context, crash_date, false),
		};

		match &outcome {
			Outcome::Dropped(reason) => {
				info!(state = %state, reason = %reason, kind = %report.kind, "crash dropped");
			}
			Outcome::AttachToLastView { view, .. } => {
				info!(state = %state, view_id = %view.view_id, session_id = %view.session_id, "crash attached to last view");
			}
			Outcome::ErrorOnly { error } => {
				info!(state = %state, session_id = %error.session_id, "crash recorded for stale view");
			}
			Outcome::SyntheticView {
				kind,
				new_session,
				view,
				..
			} => {
				info!(
					state = %state,
					view = kind.name(),
					new_session,
					session_id = %view.session_id,
					"crash attached to synthetic view"
				);
			}
		}
		outcome
	}

	fn synthetic(
		&self,
		report: &CrashReport,
		context: &CrashContext,
		crash_date: DateTime<Utc>,
		new_session: bool,
	) -> Outcome {
		let prior = context.last_session_state.as_ref().filter(|_| !new_session);
		let has_tracked_any_view = prior.map(|s| s.has_tracked_any_view).unwrap_or(false);

		let kind = if context.is_app_in_foreground {
			if has_tracked_any_view {
				return Outcome::Dropped(DropReason::NoViewToAttach);
			}
			SyntheticViewKind::ApplicationLaunch
		} else if context.background_events_tracking {
			SyntheticViewKind::Background
		} else {
			return Outcome::Dropped(DropReason::BackgroundTrackingDisabled);
		};

		let (session_id, has_replay) = match prior {
			Some(state) => (state.session_id, state.did_start_with_replay.unwrap_or(false)),
			None => {
				let session_id = (self.mint_session_id)();
				let seed = session_id.sampling_seed();
				if !self.sampler.sample(seed) {
					debug!(session_id = %session_id, rate = %self.sampler.rate(), "new session rejected by sampler");
					return Outcome::Dropped(DropReason::NotSampled);
				}
				(session_id, false)
			}
		};

		let start = match (kind, context.app_launch_date) {
			(SyntheticViewKind::ApplicationLaunch, Some(launch)) => {
				let launch = context.to_server_time(launch);
				if launch < crash_date {
					launch
				} else {
					crash_date
				}
			}
			_ => crash_date,
		};
		let time_spent_ns = (crash_date - start).num_nanoseconds().unwrap_or(i64::MAX).max(1);

		let view = ViewEvent {
			view_id: ViewId::new(),
			session_id,
			application_id: context.application_id.clone(),
			name: kind.name().to_string(),
			url: kind.url().to_string(),
			date: start,
			time_spent_ns,
			is_active: false,
			crash_count: 1,
			error_count: 1,
			document_version: 1,
			has_replay,
		};
		let error = ErrorEvent::from_report(
			report,
			crash_date,
			&context.application_id,
			session_id,
			view.view_ref(),
		);

		Outcome::SyntheticView {
			kind,
			new_session,
			error,
			view,
		}
	}
}

fn attach_to_view(
	report: &CrashReport,
	context: &CrashContext,
	last_view: &LastView,
	crash_date: DateTime<Utc>,
) -> Outcome {
	let mut view = ViewEvent::from_last_view(last_view, &context.application_id);
	view.crash_count += 1;
	view.error_count += 1;
	view.is_active = false;
	view.document_version += 1;

	let error = ErrorEvent::from_report(
		report,
		crash_date,
		&context.application_id,
		last_view.session_id,
		last_view.view_ref(),
	);
	Outcome::AttachToLastView { error, view }
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;
	use loom_crash_core::{CrashMeta, EMPTY_STACK};
	use loom_sessions_core::{DeterministicSampler, SampleRate, SessionState};
	use proptest::prelude::*;
	use uuid::Uuid;

	fn crash_date() -> DateTime<Utc> {
		Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
	}

	fn report() -> CrashReport {
		CrashReport {
			date: crash_date(),
			kind: "SIGSEGV (SEGV_MAPERR)".to_string(),
			message: "Application crash: SIGSEGV (Segmentation fault)".to_string(),
			stack: EMPTY_STACK.to_string(),
			threads: Vec::new(),
			binary_images: Vec::new(),
			meta: CrashMeta::default(),
			was_truncated: false,
			context: None,
		}
	}

	fn last_view(date: DateTime<Utc>) -> LastView {
		LastView {
			view_id: ViewId::new(),
			session_id: SessionId::new(),
			name: "Checkout".to_string(),
			url: "app/checkout".to_string(),
			date,
			time_spent_ns: 5_000_000_000,
			is_active: true,
			crash_count: 0,
			error_count: 2,
			document_version: 7,
			has_replay: true,
		}
	}

	fn reconciler(rate: f64) -> Reconciler {
		Reconciler::new(
			Duration::from_secs(4 * 60 * 60),
			Box::new(DeterministicSampler::new(SampleRate::new(rate))),
		)
	}

	fn fixed_session(seed: u128) -> impl Fn() -> SessionId + Send + Sync + 'static {
		move || SessionId(Uuid::from_u128(seed))
	}

	#[test]
	fn test_fresh_view_gets_the_crash() {
		let view = last_view(crash_date() - TimeDelta::seconds(1));
		let mut context = CrashContext::new("app");
		context.last_view = Some(view.clone());
		let now = crash_date() + TimeDelta::seconds(2);

		let reconciler = reconciler(100.0);
		assert_eq!(reconciler.state(&context, now), ReconcileState::FreshLastView);

		let outcome = reconciler.reconcile(&report(), &context, now);
		assert!(outcome.bypasses_consent());
		let Outcome::AttachToLastView { error, view: updated } = outcome else {
			panic!("expected attach, got {outcome:?}");
		};
		assert_eq!(updated.view_id, view.view_id);
		assert_eq!(updated.session_id, view.session_id);
		assert_eq!(updated.crash_count, 1);
		assert_eq!(updated.error_count, 3);
		assert_eq!(updated.document_version, 8);
		assert!(!updated.is_active);
		assert_eq!(updated.time_spent_ns, view.time_spent_ns);
		assert_eq!(error.session_id, view.session_id);
		assert_eq!(error.view.id, view.view_id);
		assert_eq!(error.date, crash_date());
	}

	#[test]
	fn test_fresh_view_with_crash_is_duplicate() {
		let mut view = last_view(crash_date());
		view.crash_count = 1;
		let mut context = CrashContext::new("app");
		context.last_view = Some(view);

		let outcome = reconciler(100.0).reconcile(&report(), &context, crash_date());
		assert_eq!(outcome, Outcome::Dropped(DropReason::DuplicateCrash));
	}

	#[test]
	fn test_stale_view_gets_standalone_error() {
		let view = last_view(crash_date() - TimeDelta::hours(5));
		let mut context = CrashContext::new("app");
		context.last_view = Some(view.clone());

		let reconciler = reconciler(100.0);
		assert_eq!(reconciler.state(&context, crash_date()), ReconcileState::StaleLastView);
		let outcome = reconciler.reconcile(&report(), &context, crash_date());
		assert!(!outcome.bypasses_consent());
		let events = outcome.into_events();
		assert_eq!(events.len(), 1);
		let MonitoringEvent::Error(error) = &events[0] else {
			panic!("expected error event");
		};
		assert_eq!(error.session_id, view.session_id);
		assert_eq!(error.view.id, view.view_id);
	}

	#[test]
	fn test_stale_view_with_crash_is_duplicate() {
		let mut view = last_view(crash_date() - TimeDelta::hours(5));
		view.crash_count = 1;
		let mut context = CrashContext::new("app");
		context.last_view = Some(view);

		let reconciler = reconciler(100.0);
		assert_eq!(reconciler.state(&context, crash_date()), ReconcileState::StaleLastView);
		let outcome = reconciler.reconcile(&report(), &context, crash_date());
		assert_eq!(outcome, Outcome::Dropped(DropReason::DuplicateCrash));
		assert!(outcome.into_events().is_empty());
	}

	#[test]
	fn test_freshness_boundary_is_exclusive() {
		let view = last_view(crash_date());
		let mut context = CrashContext::new("app");
		context.last_view = Some(view);
		let reconciler = reconciler(100.0);

		let at_window = crash_date() + TimeDelta::hours(4);
		assert_eq!(reconciler.state(&context, at_window), ReconcileState::StaleLastView);
		let before_window = at_window - TimeDelta::nanoseconds(1);
		assert_eq!(reconciler.state(&context, before_window), ReconcileState::FreshLastView);
	}

	#[test]
	fn test_prior_session_foreground_gets_application_launch_view() {
		let mut session = SessionState::new(SessionId::new());
		session.did_start_with_replay = Some(true);
		let mut context = CrashContext::new("app");
		context.last_session_state = Some(session.clone());
		context.is_app_in_foreground = true;
		context.app_launch_date = Some(crash_date() - TimeDelta::seconds(3));
		context.server_time_offset_ms = 1000;

		let outcome = reconciler(0.0).reconcile(&report(), &context, crash_date());
		let Outcome::SyntheticView {
			kind,
			new_session,
			error,
			view,
		} = outcome
		else {
			panic!("expected synthetic view, got {outcome:?}");
		};
		assert_eq!(kind, SyntheticViewKind::ApplicationLaunch);
		assert!(!new_session);
		assert_eq!(view.session_id, session.session_id);
		assert_eq!(view.name, "ApplicationLaunch");
		assert_eq!(view.url, "com/datadog/application-launch/view");
		assert_eq!(view.date, crash_date() - TimeDelta::seconds(2));
		assert_eq!(view.time_spent_ns, 3_000_000_000);
		assert_eq!(error.date, crash_date() + TimeDelta::seconds(1));
		assert!(!view.is_active);
		assert_eq!(view.crash_count, 1);
		assert!(view.has_replay);
		assert_eq!(error.view.id, view.view_id);
	}

	#[test]
	fn test_launch_after_crash_starts_view_at_crash() {
		let mut context = CrashContext::new("app");
		context.last_session_state = Some(SessionState::new(SessionId::new()));
		context.is_app_in_foreground = true;
		context.app_launch_date = Some(crash_date() + TimeDelta::seconds(10));

		let outcome = reconciler(100.0).reconcile(&report(), &context, crash_date());
		let Outcome::SyntheticView { view, .. } = outcome else {
			panic!("expected synthetic view");
		};
		assert_eq!(view.date, crash_date());
		assert_eq!(view.time_spent_ns, 1);
	}

	#[test]
	fn test_prior_session_background_needs_tracking() {
		let mut context = CrashContext::new("app");
		context.last_session_state = Some(SessionState::new(SessionId::new()));

		let outcome = reconciler(100.0).reconcile(&report(), &context, crash_date());
		assert_eq!(outcome, Outcome::Dropped(DropReason::BackgroundTrackingDisabled));

		context.background_events_tracking = true;
		let outcome = reconciler(100.0).reconcile(&report(), &context, crash_date());
		let Outcome::SyntheticView { kind, view, .. } = outcome else {
			panic!("expected background view");
		};
		assert_eq!(kind, SyntheticViewKind::Background);
		assert_eq!(view.url, "com/datadog/background/view");
		assert_eq!(view.date, crash_date());
	}

	#[test]
	fn test_foreground_after_tracked_view_is_dropped() {
		let mut session = SessionState::new(SessionId::new());
		session.has_tracked_any_view = true;
		let mut context = CrashContext::new("app");
		context.last_session_state = Some(session);
		context.is_app_in_foreground = true;

		let outcome = reconciler(100.0).reconcile(&report(), &context, crash_date());
		assert_eq!(outcome, Outcome::Dropped(DropReason::NoViewToAttach));
	}

	#[test]
	fn test_no_prior_session_background_without_tracking_is_dropped() {
		let context = CrashContext::new("app");
		let reconciler = reconciler(100.0);
		assert_eq!(reconciler.state(&context, crash_date()), ReconcileState::NoPriorSession);

		let outcome = reconciler.reconcile(&report(), &context, crash_date());
		assert_eq!(outcome, Outcome::Dropped(DropReason::BackgroundTrackingDisabled));
		assert!(outcome.into_events().is_empty());
	}

	#[test]
	fn test_no_prior_session_mints_sampled_session() {
		let mut context = CrashContext::new("app");
		context.is_app_in_foreground = true;
		let minted = SessionId(Uuid::from_u128(42));

		let outcome = reconciler(100.0)
			.with_session_id_source(fixed_session(42))
			.reconcile(&report(), &context, crash_date());
		let Outcome::SyntheticView {
			kind,
			new_session,
			view,
			..
		} = outcome
		else {
			panic!("expected synthetic view");
		};
		assert_eq!(kind, SyntheticViewKind::ApplicationLaunch);
		assert!(new_session);
		assert_eq!(view.session_id, minted);
		assert!(!view.has_replay);
	}

	#[test]
	fn test_no_prior_session_rejected_by_sampler() {
		let mut context = CrashContext::new("app");
		context.is_app_in_foreground = true;

		let outcome = reconciler(0.0)
			.with_session_id_source(fixed_session(42))
			.reconcile(&report(), &context, crash_date());
		assert_eq!(outcome, Outcome::Dropped(DropReason::NotSampled));
	}

	#[test]
	fn test_sampling_follows_minted_session_seed() {
		let mut context = CrashContext::new("app");
		context.is_app_in_foreground = true;
		let seed = SessionId(Uuid::from_u128(1)).sampling_seed();
		let rate = 50.0;
		let expected = loom_sessions_core::sample(seed, SampleRate::new(rate));

		let outcome = reconciler(rate)
			.with_session_id_source(fixed_session(1))
			.reconcile(&report(), &context, crash_date());
		assert_eq!(!outcome.is_dropped(), expected);
	}

	fn arb_context() -> impl Strategy<Value = CrashContext> {
		(
			prop::option::of((0i64..20_000, 0u64..2)),
			prop::option::of(any::<bool>()),
			any::<bool>(),
			any::<bool>(),
			-5_000i64..5_000,
		)
			.prop_map(|(view, session, foreground, background, offset)| {
				let mut context = CrashContext::new("app");
				context.last_view = view.map(|(age, crashes)| {
					let mut view = last_view(crash_date() - TimeDelta::seconds(age));
					view.crash_count = crashes;
					view
				});
				context.last_session_state = session.map(|tracked| {
					let mut state = SessionState::new(SessionId::new());
					state.has_tracked_any_view = tracked;
					state
				});
				context.is_app_in_foreground = foreground;
				context.background_events_tracking = background;
				context.server_time_offset_ms = offset;
				context
			})
	}

	proptest! {
		#[test]
		fn at_most_one_write_per_crash(context in arb_context(), rate in 0.0f64..=100.0) {
			let outcome = reconciler(rate).reconcile(&report(), &context, crash_date());
			let events = outcome.clone().into_events();
			match outcome {
				Outcome::Dropped(_) => prop_assert!(events.is_empty()),
				Outcome::ErrorOnly { .. } => prop_assert_eq!(events.len(), 1),
				_ => {
					prop_assert_eq!(events.len(), 2);
					prop_assert_eq!(events[0].session_id(), events[1].session_id());
				}
			}
			let errors = events.iter().filter(|e| matches!(e, MonitoringEvent::Error(_))).count();
			prop_assert!(errors <= 1);
		}

		#[test]
		fn reconcile_is_deterministic_for_fixed_seed(context in arb_context(), rate in 0.0f64..=100.0) {
			let reconciler = reconciler(rate).with_session_id_source(fixed_session(7));
			let first = reconciler.reconcile(&report(), &context, crash_date());
			let second = reconciler.reconcile(&report(), &context, crash_date());
			prop_assert_eq!(first.is_dropped(), second.is_dropped());
			prop_assert_eq!(
				std::mem::discriminant(&first),
				std::mem::discriminant(&second)
			);
		}
	}
}
