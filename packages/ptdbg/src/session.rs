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

//! A debugging session: one traced process, its executable's symbols and
//! debug info, and the breakpoints set in it.
//!
//! Addresses crossing the session API are runtime addresses. Debug info and
//! symbol tables hold link-time addresses; the two differ by the load bias of
//! a position-independent executable.

use std::path::Path;

use log::{debug, info, warn};
use nix::unistd::Pid;

use crate::breakpoint::BreakpointSet;
use crate::dwarf::{DebugInfo, FunctionEntry, LineEntry};
use crate::elf_items::ObjectInfo;
use crate::error::{DebugError, Result};
use crate::memory::image_base;
use crate::process::{Inferior, LaunchOptions, Tracee};
use crate::registers::{self, Register, REGISTERS};
use crate::signals::{classify, Classification, SourceDisplay, StopEvent};
use crate::symbols::Symbol;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lines printed on each side of the current one.
    pub context_lines: usize,
    pub disable_aslr: bool,
    /// Arguments passed to a launched program, not including argv[0].
    pub args: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            context_lines: 2,
            disable_aslr: true,
            args: Vec::new(),
        }
    }
}

pub struct Session<T: Tracee, D: SourceDisplay> {
    pub(crate) tracee: T,
    pub(crate) object: ObjectInfo,
    pub(crate) breakpoints: BreakpointSet,
    load_bias: u64,
    display: D,
    config: SessionConfig,
    alive: bool,
}

impl<D: SourceDisplay> Session<Inferior, D> {
    /// Load `program`'s debug info, then start it stopped at its first
    /// instruction.
    pub fn launch(program: &Path, config: SessionConfig, display: D) -> Result<Self> {
        let object = ObjectInfo::load(program)?;
        let opts = LaunchOptions {
            args: config.args.clone(),
            disable_aslr: config.disable_aslr,
        };
        let inferior = Inferior::launch(program, &opts)?;
        Self::new(inferior, object, config, display)
    }

    pub fn attach(pid: Pid, config: SessionConfig, display: D) -> Result<Self> {
        let program = Inferior::executable_of(pid)?;
        let object = ObjectInfo::load(&program)?;
        let inferior = Inferior::attach(pid)?;
        Self::new(inferior, object, config, display)
    }
}

impl<T: Tracee, D: SourceDisplay> Session<T, D> {
    pub fn new(tracee: T, object: ObjectInfo, config: SessionConfig, display: D) -> Result<Self> {
        let load_bias = if object.position_independent {
            let regions = tracee.mappings()?;
            match image_base(&regions, &object.path.to_string_lossy()) {
                Some(base) => base,
                None => {
                    warn!("no mapping of {} found; assuming no load bias", object.path.display());
                    0
                }
            }
        } else {
            0
        };
        info!("pid {}: load bias {:#x}", tracee.pid(), load_bias);
        Ok(Self {
            tracee,
            object,
            breakpoints: BreakpointSet::new(),
            load_bias,
            display,
            config,
            alive: true,
        })
    }

    pub fn pid(&self) -> Pid {
        self.tracee.pid()
    }

    pub fn program(&self) -> &Path {
        &self.object.path
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn load_bias(&self) -> u64 {
        self.load_bias
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn debug_info(&self) -> &DebugInfo {
        &self.object.debug_info
    }

    pub fn breakpoints(&self) -> &BreakpointSet {
        &self.breakpoints
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub(crate) fn ensure_alive(&self) -> Result<()> {
        if self.alive {
            Ok(())
        } else {
            Err(DebugError::ProcessExited)
        }
    }

    pub(crate) fn to_link_time(&self, runtime: u64) -> u64 {
        runtime.wrapping_sub(self.load_bias)
    }

    pub(crate) fn to_runtime(&self, link_time: u64) -> u64 {
        link_time.wrapping_add(self.load_bias)
    }

    // Registers

    pub fn pc(&self) -> Result<u64> {
        self.ensure_alive()?;
        registers::get(&self.tracee, Register::rip)
    }

    pub fn set_pc(&self, pc: u64) -> Result<()> {
        self.ensure_alive()?;
        registers::set(&self.tracee, Register::rip, pc)
    }

    pub fn read_register(&self, name: &str) -> Result<u64> {
        let reg = registers::by_name(name)?;
        self.ensure_alive()?;
        registers::get(&self.tracee, reg)
    }

    pub fn write_register(&self, name: &str, value: u64) -> Result<()> {
        let reg = registers::by_name(name)?;
        self.ensure_alive()?;
        registers::set(&self.tracee, reg, value)
    }

    /// Every register in table order, from a single register-file read.
    pub fn dump_registers(&self) -> Result<Vec<(&'static str, u64)>> {
        self.ensure_alive()?;
        let regs = self.tracee.registers()?;
        Ok(REGISTERS.iter().map(|d| (d.name, regs.get(d.reg))).collect())
    }

    // Memory

    pub fn read_memory(&self, addr: u64) -> Result<u64> {
        self.ensure_alive()?;
        self.tracee.read_word(addr)
    }

    pub fn write_memory(&self, addr: u64, value: u64) -> Result<()> {
        self.ensure_alive()?;
        self.tracee.write_word(addr, value)
    }

    // Breakpoints

    /// Returns `false` when a breakpoint already existed at `addr`.
    pub fn set_breakpoint_at_address(&mut self, addr: u64) -> Result<bool> {
        self.ensure_alive()?;
        let added = self.breakpoints.insert(&self.tracee, addr)?;
        info!("breakpoint at {:#x}{}", addr, if added { "" } else { " (exists)" });
        Ok(added)
    }

    /// Break after the prologue of every function named `name`.
    pub fn break_function(&mut self, name: &str) -> Result<Vec<u64>> {
        self.ensure_alive()?;
        let addresses: Vec<u64> = self
            .object
            .debug_info
            .function_breakpoint_addresses(name)?
            .into_iter()
            .map(|a| self.to_runtime(a))
            .collect();
        for &addr in &addresses {
            self.set_breakpoint_at_address(addr)?;
        }
        Ok(addresses)
    }

    /// Break on the first statement of `file:line`. Empty when no unit of
    /// that name has code on that line.
    pub fn break_line(&mut self, file: &str, line: u64) -> Result<Vec<u64>> {
        self.ensure_alive()?;
        let Some(addr) = self.object.debug_info.line_breakpoint_address(file, line) else {
            debug!("no statement for {}:{}", file, line);
            return Ok(Vec::new());
        };
        let addr = self.to_runtime(addr);
        self.set_breakpoint_at_address(addr)?;
        Ok(vec![addr])
    }

    pub fn remove_breakpoint(&mut self, addr: u64) -> Result<()> {
        if !self.alive {
            if !self.breakpoints.forget(addr) {
                return Err(DebugError::BreakpointNotFound(addr));
            }
            return Ok(());
        }
        self.breakpoints.remove(&self.tracee, addr)?;
        info!("removed breakpoint at {:#x}", addr);
        Ok(())
    }

    // Symbols and debug info

    /// `.symtab` and `.dynsym` entries named exactly `name`. Addresses are
    /// as recorded in the file.
    pub fn symbol_lookup(&self, name: &str) -> Vec<Symbol> {
        self.object.symbols.get_by_name(name)
    }

    /// Innermost top-level function around the current PC.
    pub fn current_function(&self) -> Result<FunctionEntry> {
        let pc = self.to_link_time(self.pc()?);
        self.object.debug_info.function_containing(pc).cloned()
    }

    /// Line-table entry for the current PC, address translated to runtime.
    pub fn current_location(&self) -> Result<LineEntry> {
        self.location_of(self.pc()?)
    }

    pub fn location_of(&self, pc: u64) -> Result<LineEntry> {
        let mut entry = self.object.debug_info.line_entry_for(self.to_link_time(pc))?;
        entry.address = self.to_runtime(entry.address);
        Ok(entry)
    }

    pub fn show_location(&mut self, entry: &LineEntry) {
        self.display.show(&entry.file, entry.line, self.config.context_lines);
    }

    // Execution control

    /// Continue until the next stop. A breakpoint at the current PC is
    /// stepped over first; anything but a completed step there ends the
    /// resume with that event.
    pub fn resume(&mut self) -> Result<StopEvent> {
        self.ensure_alive()?;
        if let Some(event) = self.step_over_breakpoint()? {
            if !event.is_silent() {
                return Ok(event);
            }
        }
        self.tracee.cont()?;
        self.wait()
    }

    /// Execute exactly one instruction, stepping over a breakpoint at the PC.
    pub fn single_step(&mut self) -> Result<StopEvent> {
        self.ensure_alive()?;
        match self.step_over_breakpoint()? {
            Some(event) => Ok(event),
            None => {
                self.tracee.step()?;
                self.wait()
            }
        }
    }

    /// If an enabled breakpoint sits at the PC, run its original instruction
    /// with the trap lifted. `None` when there was nothing to step over.
    fn step_over_breakpoint(&mut self) -> Result<Option<StopEvent>> {
        let pc = self.pc()?;
        if !self.breakpoints.is_enabled_at(pc) {
            return Ok(None);
        }
        debug!("stepping over breakpoint at {:#x}", pc);
        self.breakpoints.disable(&self.tracee, pc)?;
        self.tracee.step()?;
        let event = self.wait()?;
        if self.alive {
            self.breakpoints.enable(&self.tracee, pc)?;
        }
        Ok(Some(event))
    }

    /// Block until the process stops, then classify and report the stop.
    /// On a breakpoint hit the PC is rewound onto the trap address first.
    pub fn wait(&mut self) -> Result<StopEvent> {
        let outcome = self.tracee.wait()?;
        let event = match classify(outcome) {
            (Classification::Breakpoint, _) => {
                let address = self.pc()?.wrapping_sub(1);
                self.set_pc(address)?;
                StopEvent::BreakpointHit {
                    address,
                    location: self.location_of(address).ok(),
                }
            }
            (Classification::Event, event) => event,
        };
        if event.is_terminal() {
            self.alive = false;
            info!("pid {}: {}", self.pid(), event);
        }
        if !event.is_silent() {
            self.display.report(&event);
        }
        if let StopEvent::BreakpointHit {
            location: Some(ref entry),
            ..
        } = event
        {
            self.show_location(entry);
        }
        Ok(event)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::breakpoint::TRAP_OPCODE;
    use crate::dwarf::tests::sample;
    use crate::memory::MemoryRegion;
    use crate::process::fake::FakeTracee;
    use crate::process::SigInfo;
    use crate::signals::{SEGV_MAPERR, SIGSEGV};
    use crate::symbols::SymbolTable;

    /// Collects what a session would print.
    #[derive(Debug, Default)]
    pub(crate) struct Recorder {
        pub reports: Vec<String>,
        pub shown: Vec<(String, u64)>,
    }

    impl SourceDisplay for Recorder {
        fn report(&mut self, event: &StopEvent) {
            self.reports.push(event.to_string());
        }

        fn show(&mut self, path: &str, line: u64, _context: usize) {
            self.shown.push((path.to_string(), line));
        }
    }

    /// Code of the sample program laid out as executed:
    /// main calls callee from 0x1028 and resumes at 0x1030.
    pub(crate) const FLOW: [u64; 10] = [
        0x1020, 0x1028, 0x1000, 0x1008, 0x1010, 0x1030, 0x1038, 0x1040, 0x1048, 0x1050,
    ];

    pub(crate) fn object(pie: bool) -> ObjectInfo {
        ObjectInfo {
            path: PathBuf::from("/work/prog"),
            symbols: SymbolTable::new(),
            debug_info: sample(),
            position_independent: pie,
        }
    }

    pub(crate) fn session_at(pc: u64) -> Session<FakeTracee, Recorder> {
        let tracee = FakeTracee::new().with_flow(&FLOW);
        tracee.set_pc(pc);
        Session::new(tracee, object(false), SessionConfig::default(), Recorder::default()).unwrap()
    }

    #[test]
    fn function_breakpoint_then_continue_stops_after_the_prologue() {
        let mut s = session_at(0x1020);
        assert_eq!(s.break_function("main").unwrap(), vec![0x1028]);
        assert_eq!(s.tracee.byte(0x1028), TRAP_OPCODE);

        let event = s.resume().unwrap();
        match event {
            StopEvent::BreakpointHit { address, ref location } => {
                assert_eq!(address, 0x1028);
                assert_eq!(location.as_ref().map(|l| l.line), Some(8));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(s.pc().unwrap(), 0x1028);
        let display = s.display_mut();
        assert_eq!(display.reports, vec!["Hit breakpoint at address 0x1028"]);
        assert_eq!(display.shown, vec![("/work/src/prog.c".to_string(), 8)]);
    }

    #[test]
    fn continuing_from_a_breakpoint_executes_the_original_instruction() {
        let mut s = session_at(0x1020);
        s.set_breakpoint_at_address(0x1028).unwrap();
        s.set_breakpoint_at_address(0x1040).unwrap();
        s.resume().unwrap();
        assert_eq!(s.pc().unwrap(), 0x1028);

        s.tracee.ops.borrow_mut().clear();
        let event = s.resume().unwrap();
        assert!(matches!(event, StopEvent::BreakpointHit { address: 0x1040, .. }));
        assert_eq!(*s.tracee.ops.borrow(), vec!["step", "wait", "cont", "wait"]);
        // Re-armed after being stepped over.
        assert_eq!(s.tracee.byte(0x1028), TRAP_OPCODE);
    }

    #[test]
    fn running_off_the_end_ends_the_session() {
        let mut s = session_at(0x1020);
        assert_eq!(s.resume().unwrap(), StopEvent::Exited(0));
        assert!(!s.is_alive());
        assert!(matches!(s.resume(), Err(DebugError::ProcessExited)));
        assert!(matches!(s.read_memory(0x1000), Err(DebugError::ProcessExited)));
        assert!(matches!(s.read_register("rip"), Err(DebugError::ProcessExited)));
        assert_eq!(s.display_mut().reports, vec!["Process exited with status 0"]);
    }

    #[test]
    fn a_fault_while_stepping_off_a_breakpoint_ends_the_resume() {
        let mut s = session_at(0x1020);
        s.set_breakpoint_at_address(0x1028).unwrap();
        s.resume().unwrap();
        s.tracee.fault_at(
            0x1028,
            SigInfo {
                signo: SIGSEGV,
                code: SEGV_MAPERR,
                fault_addr: 0x10,
            },
        );

        s.tracee.ops.borrow_mut().clear();
        let event = s.resume().unwrap();
        assert_eq!(
            event,
            StopEvent::Segfault {
                code: SEGV_MAPERR,
                fault_addr: 0x10
            }
        );
        assert_eq!(*s.tracee.ops.borrow(), vec!["step", "wait"]);
        assert_eq!(s.pc().unwrap(), 0x1028);
        assert_eq!(s.tracee.byte(0x1028), TRAP_OPCODE);
        assert!(s.is_alive());
    }

    #[test]
    fn single_step_over_a_breakpoint_lands_on_the_next_instruction() {
        let mut s = session_at(0x1020);
        s.set_breakpoint_at_address(0x1020).unwrap();
        assert_eq!(s.single_step().unwrap(), StopEvent::StepCompleted);
        assert_eq!(s.pc().unwrap(), 0x1028);
        assert_eq!(s.tracee.byte(0x1020), TRAP_OPCODE);
        assert!(s.display_mut().reports.is_empty());
    }

    #[test]
    fn memory_write_then_read() {
        let s = session_at(0x1020);
        s.write_memory(0x7000, 0x1122_3344_5566_7788).unwrap();
        assert_eq!(s.read_memory(0x7000).unwrap(), 0x1122_3344_5566_7788);
    }

    #[test]
    fn registers_by_name() {
        let s = session_at(0x1020);
        s.write_register("rax", 42).unwrap();
        assert_eq!(s.read_register("rax").unwrap(), 42);
        assert!(matches!(s.read_register("xmm0"), Err(DebugError::UnknownRegister(_))));
        let dump = s.dump_registers().unwrap();
        assert_eq!(dump.len(), REGISTERS.len());
        assert!(dump.contains(&("rip", 0x1020)));
    }

    #[test]
    fn line_breakpoint_without_code_is_a_no_op() {
        let mut s = session_at(0x1020);
        assert!(s.break_line("prog.c", 99).unwrap().is_empty());
        assert!(s.breakpoints().is_empty());
        assert_eq!(s.break_line("prog.c", 10).unwrap(), vec![0x1040]);
        assert!(matches!(
            s.remove_breakpoint(0x1041),
            Err(DebugError::BreakpointNotFound(0x1041))
        ));
        s.remove_breakpoint(0x1040).unwrap();
        assert_eq!(s.tracee.byte(0x1040), 0x90);
    }

    #[test]
    fn position_independent_images_are_rebased() {
        let base = 0x5555_5555_4000;
        let mut tracee = FakeTracee::new();
        tracee.maps = vec![MemoryRegion::new("/work/prog".to_string(), base, 0x2000, 0)];
        let flow: Vec<u64> = FLOW.iter().map(|a| a + base).collect();
        let tracee = tracee.with_flow(&flow);
        tracee.set_pc(base + 0x1020);
        let mut s = Session::new(tracee, object(true), SessionConfig::default(), Recorder::default()).unwrap();

        assert_eq!(s.load_bias(), base);
        assert_eq!(s.break_function("main").unwrap(), vec![base + 0x1028]);
        assert_eq!(s.current_function().unwrap().name, "main");
        assert_eq!(s.current_location().unwrap().address, base + 0x1020);
        assert!(matches!(
            s.resume().unwrap(),
            StopEvent::BreakpointHit { address, location: Some(_) } if address == base + 0x1028
        ));
    }
}
