// Copyright (c) 2026 ptdbg Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Classification of tracee stops.

use std::fmt;

use nix::sys::signal::Signal;

use crate::dwarf::LineEntry;
use crate::process::{SigInfo, WaitOutcome};

pub const SIGTRAP: i32 = nix::libc::SIGTRAP;
pub const SIGSEGV: i32 = nix::libc::SIGSEGV;

// si_code values for SIGTRAP
pub const TRAP_BRKPT: i32 = 1;
pub const TRAP_TRACE: i32 = 2;
/// Raised by the kernel itself, which is how `int3` is reported on x86.
pub const SI_KERNEL: i32 = 0x80;

// si_code values for SIGSEGV
pub const SEGV_MAPERR: i32 = 1;
pub const SEGV_ACCERR: i32 = 2;
pub const SEGV_BNDERR: i32 = 3;
pub const SEGV_PKUERR: i32 = 4;

/// The user-visible meaning of a state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopEvent {
    /// Stopped on a software breakpoint. `address` is the corrected PC.
    BreakpointHit {
        address: u64,
        location: Option<LineEntry>,
    },
    StepCompleted,
    Segfault {
        code: i32,
        fault_addr: u64,
    },
    UnknownTrap(i32),
    Signal(i32),
    Exited(i32),
    Terminated(i32),
}

impl StopEvent {
    /// Whether the process is gone after this event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StopEvent::Exited(_) | StopEvent::Terminated(_))
    }

    /// Single-step completion is not announced.
    pub fn is_silent(&self) -> bool {
        matches!(self, StopEvent::StepCompleted)
    }
}

impl fmt::Display for StopEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopEvent::BreakpointHit { address, .. } => {
                write!(f, "Hit breakpoint at address {:#x}", address)
            }
            StopEvent::StepCompleted => Ok(()),
            StopEvent::Segfault { code, fault_addr } => write!(
                f,
                "Segmentation fault. Reason: {} ({}) at {:#x}",
                segv_reason(*code),
                code,
                fault_addr
            ),
            StopEvent::UnknownTrap(code) => write!(f, "Unknown SIGTRAP code {}", code),
            StopEvent::Signal(signo) => write!(f, "Got signal: {}", signal_name(*signo)),
            StopEvent::Exited(code) => write!(f, "Process exited with status {}", code),
            StopEvent::Terminated(signo) => {
                write!(f, "Process terminated by {}", signal_name(*signo))
            }
        }
    }
}

/// What the dispatcher must do with a stop before reporting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Breakpoint trap: the PC is one past the trap byte and must be rewound.
    Breakpoint,
    Event,
}

/// Map a wait outcome to its event. Breakpoint hits come back with address 0
/// and no location; the caller fills both in after rewinding the PC.
pub fn classify(outcome: WaitOutcome) -> (Classification, StopEvent) {
    match outcome {
        WaitOutcome::Exited(code) => (Classification::Event, StopEvent::Exited(code)),
        WaitOutcome::Signaled(signo) => (Classification::Event, StopEvent::Terminated(signo)),
        WaitOutcome::Stopped(info) => classify_siginfo(&info),
    }
}

fn classify_siginfo(info: &SigInfo) -> (Classification, StopEvent) {
    match (info.signo, info.code) {
        (SIGTRAP, TRAP_BRKPT | SI_KERNEL) => (
            Classification::Breakpoint,
            StopEvent::BreakpointHit {
                address: 0,
                location: None,
            },
        ),
        (SIGTRAP, TRAP_TRACE) => (Classification::Event, StopEvent::StepCompleted),
        (SIGTRAP, code) => (Classification::Event, StopEvent::UnknownTrap(code)),
        (SIGSEGV, code) => (
            Classification::Event,
            StopEvent::Segfault {
                code,
                fault_addr: info.fault_addr,
            },
        ),
        (signo, _) => (Classification::Event, StopEvent::Signal(signo)),
    }
}

pub fn segv_reason(code: i32) -> &'static str {
    match code {
        SEGV_MAPERR => "address not mapped to object",
        SEGV_ACCERR => "invalid permissions for mapped object",
        SEGV_BNDERR => "failed address bound checks",
        SEGV_PKUERR => "access denied by memory protection keys",
        SI_KERNEL => "general protection fault",
        _ => "unknown",
    }
}

pub fn signal_name(signo: i32) -> String {
    match Signal::try_from(signo) {
        Ok(sig) => sig.as_str().to_string(),
        Err(_) => format!("signal {}", signo),
    }
}

/// Where stop reports and source listings go.
pub trait SourceDisplay {
    fn report(&mut self, event: &StopEvent);

    /// Show `line` of `path` with `context` lines around it.
    fn show(&mut self, path: &str, line: u64, context: usize);
}

/// Discards everything. Used when a session is driven programmatically.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDisplay;

impl SourceDisplay for NoDisplay {
    fn report(&mut self, _event: &StopEvent) {}

    fn show(&mut self, _path: &str, _line: u64, _context: usize) {}
}
