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

//! x86-64 register table.
//!
//! Rows are listed in `user_regs_struct` order so that a register dump walks
//! the register file front to back. DWARF numbers follow the System V AMD64
//! psABI; `rip` and `orig_rax` have none.

use nix::libc::user_regs_struct;

use crate::error::{DebugError, Result};
use crate::process::Tracee;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Register {
    r15,
    r14,
    r13,
    r12,
    rbp,
    rbx,
    r11,
    r10,
    r9,
    r8,
    rax,
    rcx,
    rdx,
    rsi,
    rdi,
    orig_rax,
    rip,
    cs,
    eflags,
    rsp,
    ss,
    fs_base,
    gs_base,
    ds,
    es,
    fs,
    gs,
}

#[derive(Debug, Clone, Copy)]
pub struct RegisterDescriptor {
    pub reg: Register,
    pub dwarf: Option<u16>,
    pub name: &'static str,
}

const fn row(reg: Register, dwarf: Option<u16>, name: &'static str) -> RegisterDescriptor {
    RegisterDescriptor { reg, dwarf, name }
}

pub static REGISTERS: [RegisterDescriptor; 27] = [
    row(Register::r15, Some(15), "r15"),
    row(Register::r14, Some(14), "r14"),
    row(Register::r13, Some(13), "r13"),
    row(Register::r12, Some(12), "r12"),
    row(Register::rbp, Some(6), "rbp"),
    row(Register::rbx, Some(3), "rbx"),
    row(Register::r11, Some(11), "r11"),
    row(Register::r10, Some(10), "r10"),
    row(Register::r9, Some(9), "r9"),
    row(Register::r8, Some(8), "r8"),
    row(Register::rax, Some(0), "rax"),
    row(Register::rcx, Some(2), "rcx"),
    row(Register::rdx, Some(1), "rdx"),
    row(Register::rsi, Some(4), "rsi"),
    row(Register::rdi, Some(5), "rdi"),
    row(Register::orig_rax, None, "orig_rax"),
    row(Register::rip, None, "rip"),
    row(Register::cs, Some(51), "cs"),
    row(Register::eflags, Some(49), "eflags"),
    row(Register::rsp, Some(7), "rsp"),
    row(Register::ss, Some(52), "ss"),
    row(Register::fs_base, Some(58), "fs_base"),
    row(Register::gs_base, Some(59), "gs_base"),
    row(Register::ds, Some(53), "ds"),
    row(Register::es, Some(50), "es"),
    row(Register::fs, Some(54), "fs"),
    row(Register::gs, Some(55), "gs"),
];

pub fn by_name(name: &str) -> Result<Register> {
    REGISTERS
        .iter()
        .find(|rd| rd.name == name)
        .map(|rd| rd.reg)
        .ok_or_else(|| DebugError::UnknownRegister(name.to_string()))
}

pub fn by_dwarf_number(number: u16) -> Result<Register> {
    REGISTERS
        .iter()
        .find(|rd| rd.dwarf == Some(number))
        .map(|rd| rd.reg)
        .ok_or_else(|| DebugError::UnknownRegister(format!("dwarf register {}", number)))
}

pub fn name_of(reg: Register) -> &'static str {
    // The table is total over `Register`, so the fallback is never taken.
    REGISTERS
        .iter()
        .find(|rd| rd.reg == reg)
        .map(|rd| rd.name)
        .unwrap_or("?")
}

/// Snapshot of the general-purpose register file of a stopped tracee.
#[derive(Clone, Copy)]
pub struct Registers {
    regs: user_regs_struct,
}

impl Registers {
    pub fn from_raw(regs: user_regs_struct) -> Self {
        Self { regs }
    }

    pub fn zeroed() -> Self {
        // SAFETY: user_regs_struct is plain integers; all-zero is a valid value.
        Self {
            regs: unsafe { std::mem::zeroed() },
        }
    }

    pub fn raw(&self) -> user_regs_struct {
        self.regs
    }

    pub fn get(&self, reg: Register) -> u64 {
        let r = &self.regs;
        match reg {
            Register::r15 => r.r15,
            Register::r14 => r.r14,
            Register::r13 => r.r13,
            Register::r12 => r.r12,
            Register::rbp => r.rbp,
            Register::rbx => r.rbx,
            Register::r11 => r.r11,
            Register::r10 => r.r10,
            Register::r9 => r.r9,
            Register::r8 => r.r8,
            Register::rax => r.rax,
            Register::rcx => r.rcx,
            Register::rdx => r.rdx,
            Register::rsi => r.rsi,
            Register::rdi => r.rdi,
            Register::orig_rax => r.orig_rax,
            Register::rip => r.rip,
            Register::cs => r.cs,
            Register::eflags => r.eflags,
            Register::rsp => r.rsp,
            Register::ss => r.ss,
            Register::fs_base => r.fs_base,
            Register::gs_base => r.gs_base,
            Register::ds => r.ds,
            Register::es => r.es,
            Register::fs => r.fs,
            Register::gs => r.gs,
        }
    }

    pub fn set(&mut self, reg: Register, value: u64) {
        let r = &mut self.regs;
        let slot = match reg {
            Register::r15 => &mut r.r15,
            Register::r14 => &mut r.r14,
            Register::r13 => &mut r.r13,
            Register::r12 => &mut r.r12,
            Register::rbp => &mut r.rbp,
            Register::rbx => &mut r.rbx,
            Register::r11 => &mut r.r11,
            Register::r10 => &mut r.r10,
            Register::r9 => &mut r.r9,
            Register::r8 => &mut r.r8,
            Register::rax => &mut r.rax,
            Register::rcx => &mut r.rcx,
            Register::rdx => &mut r.rdx,
            Register::rsi => &mut r.rsi,
            Register::rdi => &mut r.rdi,
            Register::orig_rax => &mut r.orig_rax,
            Register::rip => &mut r.rip,
            Register::cs => &mut r.cs,
            Register::eflags => &mut r.eflags,
            Register::rsp => &mut r.rsp,
            Register::ss => &mut r.ss,
            Register::fs_base => &mut r.fs_base,
            Register::gs_base => &mut r.gs_base,
            Register::ds => &mut r.ds,
            Register::es => &mut r.es,
            Register::fs => &mut r.fs,
            Register::gs => &mut r.gs,
        };
        *slot = value;
    }
}

/// Read one register of a stopped tracee.
pub fn get<T: Tracee + ?Sized>(tracee: &T, reg: Register) -> Result<u64> {
    Ok(tracee.registers()?.get(reg))
}

/// Write one register of a stopped tracee, leaving the rest of the file intact.
pub fn set<T: Tracee + ?Sized>(tracee: &T, reg: Register, value: u64) -> Result<()> {
    let mut regs = tracee.registers()?;
    regs.set(reg, value);
    tracee.set_registers(&regs)
}
