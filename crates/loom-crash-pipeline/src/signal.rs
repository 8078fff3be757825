// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Signal names and descriptions as reported on Darwin.

struct SignalInfo {
	number: i64,
	name: &'static str,
	description: &'static str,
}

const SIGNALS: &[SignalInfo] = &[
	SignalInfo { number: 1, name: "SIGHUP", description: "Hangup" },
	SignalInfo { number: 2, name: "SIGINT", description: "Interrupt" },
	SignalInfo { number: 3, name: "SIGQUIT", description: "Quit" },
	SignalInfo { number: 4, name: "SIGILL", description: "Illegal instruction" },
	SignalInfo { number: 5, name: "SIGTRAP", description: "Trace/BPT trap" },
	SignalInfo { number: 6, name: "SIGABRT", description: "Abort trap" },
	SignalInfo { number: 7, name: "SIGEMT", description: "EMT trap" },
	SignalInfo { number: 8, name: "SIGFPE", description: "Floating point exception" },
	SignalInfo { number: 9, name: "SIGKILL", description: "Killed" },
	SignalInfo { number: 10, name: "SIGBUS", description: "Bus error" },
	SignalInfo { number: 11, name: "SIGSEGV", description: "Segmentation fault" },
	SignalInfo { number: 12, name: "SIGSYS", description: "Bad system call" },
	SignalInfo { number: 13, name: "SIGPIPE", description: "Broken pipe" },
	SignalInfo { number: 14, name: "SIGALRM", description: "Alarm clock" },
	SignalInfo { number: 15, name: "SIGTERM", description: "Terminated" },
];

/// Human-readable description for a signal name such as `SIGSEGV`.
pub fn description(name: &str) -> Option<&'static str> {
	SIGNALS.iter().find(|s| s.name == name).map(|s| s.description)
}

/// Signal name for a signal number.
pub fn name_for_number(number: i64) -> Option<&'static str> {
	SIGNALS.iter().find(|s| s.number == number).map(|s| s.name)
}
