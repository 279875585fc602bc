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

//! Software breakpoints: a single `int3` byte patched over the first byte of
//! an instruction. Patching is done a word at a time through the tracee.

use std::collections::BTreeMap;

use log::trace;
use nix::unistd::Pid;

use crate::error::{DebugError, Result};
use crate::process::Tracee;

/// x86 `int3`
pub const TRAP_OPCODE: u8 = 0xCC;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakpoint {
    pid: Pid,
    address: u64,
    enabled: bool,
    /// Original byte under the trap; captured by the first `enable`.
    saved: Option<u8>,
}

impl Breakpoint {
    pub fn new(pid: Pid, address: u64) -> Self {
        Self {
            pid,
            address,
            enabled: false,
            saved: None,
        }
    }

    pub fn address(&self) -> u64 {
        self.address
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn saved_byte(&self) -> Option<u8> {
        self.saved
    }

    /// Patch the trap byte in. Enabling twice is a no-op, so the trap opcode
    /// is never mistaken for original code.
    pub fn enable<T: Tracee + ?Sized>(&mut self, tracee: &T) -> Result<()> {
        if self.enabled {
            return Ok(());
        }
        let word = tracee.read_word(self.address)?;
        let original = (word & 0xff) as u8;
        tracee.write_word(self.address, (word & !0xff) | TRAP_OPCODE as u64)?;
        trace!("pid {}: int3 at {:#x} (saved {:#04x})", self.pid, self.address, original);
        self.saved = Some(original);
        self.enabled = true;
        Ok(())
    }

    /// Put the original byte back. Disabling a disabled breakpoint is a no-op.
    pub fn disable<T: Tracee + ?Sized>(&mut self, tracee: &T) -> Result<()> {
        let (true, Some(original)) = (self.enabled, self.saved) else {
            return Ok(());
        };
        let word = tracee.read_word(self.address)?;
        tracee.write_word(self.address, (word & !0xff) | original as u64)?;
        trace!("pid {}: restored {:#04x} at {:#x}", self.pid, original, self.address);
        self.enabled = false;
        Ok(())
    }
}

/// Breakpoints of one session, keyed by runtime address.
#[derive(Debug, Default)]
pub struct BreakpointSet {
    breakpoints: BTreeMap<u64, Breakpoint>,
}

impl BreakpointSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create and enable a breakpoint at `address`. Returns `false` when one
    /// already existed there; it is left as it was.
    pub fn insert<T: Tracee + ?Sized>(&mut self, tracee: &T, address: u64) -> Result<bool> {
        if self.breakpoints.contains_key(&address) {
            return Ok(false);
        }
        let mut bp = Breakpoint::new(tracee.pid(), address);
        bp.enable(tracee)?;
        self.breakpoints.insert(address, bp);
        Ok(true)
    }

    /// Disable and forget the breakpoint at `address`.
    pub fn remove<T: Tracee + ?Sized>(&mut self, tracee: &T, address: u64) -> Result<()> {
        let bp = self
            .breakpoints
            .get_mut(&address)
            .ok_or(DebugError::BreakpointNotFound(address))?;
        bp.disable(tracee)?;
        self.breakpoints.remove(&address);
        Ok(())
    }

    /// Drop the record without touching memory. For a process that is gone.
    pub fn forget(&mut self, address: u64) -> bool {
        self.breakpoints.remove(&address).is_some()
    }

    pub fn enable<T: Tracee + ?Sized>(&mut self, tracee: &T, address: u64) -> Result<()> {
        self.breakpoints
            .get_mut(&address)
            .ok_or(DebugError::BreakpointNotFound(address))?
            .enable(tracee)
    }

    pub fn disable<T: Tracee + ?Sized>(&mut self, tracee: &T, address: u64) -> Result<()> {
        self.breakpoints
            .get_mut(&address)
            .ok_or(DebugError::BreakpointNotFound(address))?
            .disable(tracee)
    }

    pub fn is_enabled_at(&self, address: u64) -> bool {
        self.breakpoints.get(&address).is_some_and(Breakpoint::is_enabled)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.breakpoints.values()
    }

    pub fn addresses(&self) -> Vec<u64> {
        self.breakpoints.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.breakpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakpoints.is_empty()
    }
}
