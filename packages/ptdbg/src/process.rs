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

//! Traced-process primitives.
//!
//! [`Tracee`] is the seam between the debugger core and the operating system.
//! [`Inferior`] implements it with ptrace; every method other than `wait`
//! assumes the process is currently stopped.

use std::cell::Cell;
use std::ffi::CString;
use std::io::Read;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};
use nix::errno::Errno;
use nix::fcntl::OFlag;
use nix::sys::personality::{self, Persona};
use nix::sys::ptrace;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{execv, fork, pipe2, ForkResult, Pid};

use crate::error::{DebugError, Result};
use crate::memory::MemoryRegion;
use crate::registers::Registers;

/// Signal information read from a stopped tracee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigInfo {
    pub signo: i32,
    pub code: i32,
    /// Faulting address for memory faults, zero otherwise.
    pub fault_addr: u64,
}

/// How the tracee changed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Stopped(SigInfo),
    Exited(i32),
    Signaled(i32),
}

pub trait Tracee {
    fn pid(&self) -> Pid;
    fn registers(&self) -> Result<Registers>;
    fn set_registers(&self, regs: &Registers) -> Result<()>;
    fn read_word(&self, addr: u64) -> Result<u64>;
    fn write_word(&self, addr: u64, value: u64) -> Result<()>;
    /// Resume until the next signal. Does not wait.
    fn cont(&self) -> Result<()>;
    /// Execute one instruction. Does not wait.
    fn step(&self) -> Result<()>;
    /// Block until the tracee changes state.
    fn wait(&self) -> Result<WaitOutcome>;
    fn mappings(&self) -> Result<Vec<MemoryRegion>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Launched,
    Attached,
}

/// A process traced through ptrace.
pub struct Inferior {
    pid: Pid,
    origin: Origin,
    gone: Cell<bool>,
}

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub args: Vec<String>,
    pub disable_aslr: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            args: Vec::new(),
            disable_aslr: true,
        }
    }
}

impl Inferior {
    /// Fork and exec `path` under ptrace. Returns once the exec stop has been
    /// consumed; the process is stopped at its first instruction.
    pub fn launch(path: &Path, opts: &LaunchOptions) -> Result<Self> {
        let launch_err = |source: Errno| DebugError::Launch {
            path: path.to_path_buf(),
            source,
        };
        // Everything the child needs is allocated before fork.
        let c_path = CString::new(path.as_os_str().as_bytes()).map_err(|_| launch_err(Errno::EINVAL))?;
        let mut argv = vec![c_path.clone()];
        for arg in &opts.args {
            argv.push(CString::new(arg.as_bytes()).map_err(|_| launch_err(Errno::EINVAL))?);
        }
        let (read_end, write_end) = pipe2(OFlag::O_CLOEXEC).map_err(launch_err)?;

        match unsafe { fork() }.map_err(launch_err)? {
            ForkResult::Child => {
                drop(read_end);
                if opts.disable_aslr {
                    if let Ok(persona) = personality::get() {
                        let _ = personality::set(persona | Persona::ADDR_NO_RANDOMIZE);
                    }
                }
                let errno = match ptrace::traceme() {
                    Err(e) => e,
                    Ok(()) => match execv(&c_path, &argv) {
                        Err(e) => e,
                        Ok(never) => match never {},
                    },
                };
                // The pipe is close-on-exec: the parent reads EOF on success and
                // the errno on failure.
                let _ = nix::unistd::write(&write_end, &(errno as i32).to_ne_bytes());
                unsafe { nix::libc::_exit(127) }
            }
            ForkResult::Parent { child } => {
                drop(write_end);
                let mut report = Vec::new();
                std::fs::File::from(read_end)
                    .read_to_end(&mut report)
                    .map_err(|e| launch_err(Errno::from_raw(e.raw_os_error().unwrap_or(0))))?;
                if report.len() >= 4 {
                    let raw = i32::from_ne_bytes([report[0], report[1], report[2], report[3]]);
                    let _ = waitpid(child, None);
                    return Err(launch_err(Errno::from_raw(raw)));
                }

                match waitpid(child, None).map_err(launch_err)? {
                    WaitStatus::Stopped(_, Signal::SIGTRAP) => {}
                    other => {
                        warn!("unexpected first stop of {}: {:?}", child, other);
                        return Err(launch_err(Errno::ECHILD));
                    }
                }
                info!("launched {} as pid {}", path.display(), child);
                Ok(Self {
                    pid: child,
                    origin: Origin::Launched,
                    gone: Cell::new(false),
                })
            }
        }
    }

    /// Attach to a running process and wait for it to stop.
    pub fn attach(pid: Pid) -> Result<Self> {
        ptrace::attach(pid).map_err(DebugError::io("PTRACE_ATTACH"))?;
        let inferior = Self {
            pid,
            origin: Origin::Attached,
            gone: Cell::new(false),
        };
        match inferior.wait()? {
            WaitOutcome::Stopped(_) => {}
            _ => return Err(DebugError::ProcessExited),
        }
        info!("attached to pid {}", pid);
        Ok(inferior)
    }

    /// Path of the executable image of `pid`.
    pub fn executable_of(pid: Pid) -> Result<PathBuf> {
        std::fs::read_link(format!("/proc/{}/exe", pid)).map_err(|e| DebugError::ProcessIo {
            op: "readlink /proc/<pid>/exe",
            source: Errno::from_raw(e.raw_os_error().unwrap_or(0)),
        })
    }
}

impl Tracee for Inferior {
    fn pid(&self) -> Pid {
        self.pid
    }

    fn registers(&self) -> Result<Registers> {
        let regs = ptrace::getregs(self.pid).map_err(DebugError::io("PTRACE_GETREGS"))?;
        Ok(Registers::from_raw(regs))
    }

    fn set_registers(&self, regs: &Registers) -> Result<()> {
        ptrace::setregs(self.pid, regs.raw()).map_err(DebugError::io("PTRACE_SETREGS"))
    }

    fn read_word(&self, addr: u64) -> Result<u64> {
        let word = ptrace::read(self.pid, addr as ptrace::AddressType)
            .map_err(DebugError::io("PTRACE_PEEKDATA"))?;
        trace!("peek {:#x} -> {:#018x}", addr, word as u64);
        Ok(word as u64)
    }

    fn write_word(&self, addr: u64, value: u64) -> Result<()> {
        trace!("poke {:#x} <- {:#018x}", addr, value);
        ptrace::write(self.pid, addr as ptrace::AddressType, value as nix::libc::c_long)
            .map_err(DebugError::io("PTRACE_POKEDATA"))
    }

    fn cont(&self) -> Result<()> {
        ptrace::cont(self.pid, None).map_err(DebugError::io("PTRACE_CONT"))
    }

    fn step(&self) -> Result<()> {
        ptrace::step(self.pid, None).map_err(DebugError::io("PTRACE_SINGLESTEP"))
    }

    fn wait(&self) -> Result<WaitOutcome> {
        let status = waitpid(self.pid, None).map_err(DebugError::io("waitpid"))?;
        trace!("waitpid: {:?}", status);
        match status {
            WaitStatus::Exited(_, code) => {
                self.gone.set(true);
                Ok(WaitOutcome::Exited(code))
            }
            WaitStatus::Signaled(_, sig, _) => {
                self.gone.set(true);
                Ok(WaitOutcome::Signaled(sig as i32))
            }
            _ => {
                let info = ptrace::getsiginfo(self.pid).map_err(DebugError::io("PTRACE_GETSIGINFO"))?;
                // SAFETY: si_addr is defined for every signal; it is only
                // meaningful for faults, and only read as a number.
                let fault_addr = unsafe { info.si_addr() } as u64;
                Ok(WaitOutcome::Stopped(SigInfo {
                    signo: info.si_signo,
                    code: info.si_code,
                    fault_addr,
                }))
            }
        }
    }

    fn mappings(&self) -> Result<Vec<MemoryRegion>> {
        let maps = proc_maps::get_process_maps(self.pid.as_raw()).map_err(|e| DebugError::ProcessIo {
            op: "read /proc/<pid>/maps",
            source: Errno::from_raw(e.raw_os_error().unwrap_or(0)),
        })?;
        Ok(maps
            .iter()
            .map(|m| {
                MemoryRegion::new(
                    m.filename().map(|p| p.to_string_lossy().into_owned()).unwrap_or_default(),
                    m.start() as u64,
                    m.size() as u64,
                    m.offset as u64,
                )
            })
            .collect())
    }
}

impl Drop for Inferior {
    fn drop(&mut self) {
        if self.gone.get() {
            return;
        }
        match self.origin {
            Origin::Launched => {
                debug!("killing pid {}", self.pid);
                let _ = signal::kill(self.pid, Signal::SIGKILL);
                let _ = waitpid(self.pid, None);
            }
            Origin::Attached => {
                debug!("detaching from pid {}", self.pid);
                let _ = ptrace::detach(self.pid, None);
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fake::FakeTracee;
    use super::*;
    use crate::signals::{TRAP_BRKPT, TRAP_TRACE};

    #[test]
    fn fake_traps_past_the_int3_byte() {
        let t = FakeTracee::new().with_flow(&[0x1000, 0x1004, 0x1008]);
        t.poke_bytes(0x1004, &[0xCC]);
        t.set_pc(0x1000);
        t.cont().unwrap();
        match t.wait().unwrap() {
            WaitOutcome::Stopped(info) => assert_eq!(info.code, TRAP_BRKPT),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(t.pc(), 0x1005);
    }

    #[test]
    fn fake_single_step_reports_trace() {
        let t = FakeTracee::new().with_flow(&[0x1000, 0x1004]);
        t.set_pc(0x1000);
        t.step().unwrap();
        assert_eq!(
            t.wait().unwrap(),
            WaitOutcome::Stopped(SigInfo {
                signo: crate::signals::SIGTRAP,
                code: TRAP_TRACE,
                fault_addr: 0
            })
        );
        assert_eq!(t.pc(), 0x1004);
    }

    #[test]
    fn launching_a_missing_program_is_fatal() {
        let err = Inferior::launch(Path::new("/nonexistent/ptdbg-target"), &LaunchOptions::default());
        match err {
            // ENOENT from execv, or EPERM from traceme where ptrace is forbidden.
            Err(DebugError::Launch { source, .. }) => {
                assert!(matches!(source, Errno::ENOENT | Errno::EPERM), "{}", source)
            }
            Err(other) => panic!("unexpected error {}", other),
            Ok(_) => panic!("launch of a missing file succeeded"),
        }
    }
}
