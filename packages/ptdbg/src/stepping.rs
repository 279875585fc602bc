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

//! Source-level stepping built from single steps and transient breakpoints.
//!
//! Return addresses are read from `[rbp + 8]`, so stepping out of (or over
//! the end of) a function compiled without frame pointers goes wrong.

use log::{debug, warn};

use crate::error::Result;
use crate::process::Tracee;
use crate::registers::{self, Register};
use crate::session::Session;
use crate::signals::{SourceDisplay, StopEvent};

impl<T: Tracee, D: SourceDisplay> Session<T, D> {
    /// One instruction, then show where it landed if that is known.
    pub fn step_instruction(&mut self) -> Result<StopEvent> {
        let event = self.single_step()?;
        if event.is_silent() {
            if let Ok(entry) = self.current_location() {
                self.show_location(&entry);
            }
        }
        Ok(event)
    }

    /// Single-step until the PC is on a different source line. Addresses
    /// without line coverage, and rows at line 0, are stepped through.
    pub fn step_line(&mut self) -> Result<StopEvent> {
        self.ensure_alive()?;
        let start = self.current_location()?;
        loop {
            let event = self.single_step()?;
            if !event.is_silent() {
                return Ok(event);
            }
            let Ok(entry) = self.current_location() else {
                continue;
            };
            if entry.line == 0 {
                continue;
            }
            if entry.line != start.line || entry.file != start.file {
                debug!("step line: {}:{} -> {}:{}", start.file, start.line, entry.file, entry.line);
                self.show_location(&entry);
                return Ok(event);
            }
        }
    }

    /// Run to the next statement of the current function, or to its caller,
    /// without stopping inside calls made from this line.
    pub fn step_over(&mut self) -> Result<StopEvent> {
        self.ensure_alive()?;
        let pc = self.to_link_time(self.pc()?);
        let info = &self.object.debug_info;
        let func = info.function_containing(pc)?;
        let here = info.line_entry_for(pc)?.address;
        let mut targets: Vec<u64> = info
            .statement_addresses(func)?
            .into_iter()
            .filter(|&addr| addr != here)
            .map(|addr| self.to_runtime(addr))
            .collect();
        targets.push(self.return_address()?);
        debug!("step over {}: {} candidate stops", func.name, targets.len());
        self.with_transient_breakpoints(&targets, |s| s.resume())
    }

    /// Run until the current function returns to its caller.
    pub fn step_out(&mut self) -> Result<StopEvent> {
        self.ensure_alive()?;
        let pc = self.to_link_time(self.pc()?);
        self.object.debug_info.function_containing(pc)?;
        let ret = self.return_address()?;
        debug!("step out to {:#x}", ret);
        self.with_transient_breakpoints(&[ret], |s| s.resume())
    }

    fn return_address(&self) -> Result<u64> {
        let rbp = registers::get(&self.tracee, Register::rbp)?;
        self.read_memory(rbp.wrapping_add(8))
    }

    /// Install a breakpoint at each of `addresses` that has none, run `act`,
    /// then remove exactly the breakpoints installed here. Removal happens
    /// whether or not installing or `act` failed.
    fn with_transient_breakpoints<F>(&mut self, addresses: &[u64], act: F) -> Result<StopEvent>
    where
        F: FnOnce(&mut Self) -> Result<StopEvent>,
    {
        let mut installed = Vec::new();
        let mut armed = Ok(());
        for &addr in addresses {
            match self.breakpoints.insert(&self.tracee, addr) {
                Ok(true) => installed.push(addr),
                Ok(false) => {}
                Err(e) => {
                    armed = Err(e);
                    break;
                }
            }
        }
        let outcome = armed.and_then(|()| act(self));

        let mut cleanup = Ok(());
        for addr in installed {
            if !self.is_alive() {
                self.breakpoints.forget(addr);
                continue;
            }
            if let Err(e) = self.breakpoints.remove(&self.tracee, addr) {
                warn!("failed to remove transient breakpoint at {:#x}: {}", addr, e);
                self.breakpoints.forget(addr);
                if cleanup.is_ok() {
                    cleanup = Err(e);
                }
            }
        }
        let event = outcome?;
        cleanup?;
        Ok(event)
    }
}
