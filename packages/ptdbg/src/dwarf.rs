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

//! Query surface over the compilation units, function entries and line
//! tables extracted from the executable's DWARF.
//!
//! All addresses here are link-time addresses as recorded in the debug info;
//! the session applies the load bias of position-independent executables.

use std::ops::Range;

use log::debug;

use crate::elf_items::FileTable;
use crate::error::{DebugError, Result};
use crate::utils::path_ends_with;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    pub name: String,
    pub low_pc: u64,
    /// One past the last instruction.
    pub high_pc: u64,
}

impl FunctionEntry {
    pub fn contains(&self, pc: u64) -> bool {
        self.low_pc <= pc && pc < self.high_pc
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRow {
    pub address: u64,
    pub file_id: u32,
    /// Zero when the compiler attributed the address to no line.
    pub line: u64,
    pub is_stmt: bool,
    /// Marks the first address past a sequence; covers nothing itself.
    pub end_sequence: bool,
}

#[derive(Debug, Clone, Default)]
pub struct CompileUnit {
    /// Primary source file name (DW_AT_name).
    pub name: String,
    pub ranges: Vec<Range<u64>>,
    pub functions: Vec<FunctionEntry>,
    /// Rows in emission order; addresses never decrease within a sequence.
    pub lines: Vec<LineRow>,
}

impl CompileUnit {
    pub fn contains(&self, pc: u64) -> bool {
        self.ranges.iter().any(|r| r.contains(&pc))
    }

    /// Index of the row whose range `[row.address, next.address)` covers `pc`.
    fn covering_row(&self, pc: u64) -> Option<usize> {
        self.lines.windows(2).position(|pair| {
            !pair[0].end_sequence && pair[0].address <= pc && pc < pair[1].address
        })
    }
}

/// A line-table row with its file resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineEntry {
    pub address: u64,
    pub file: String,
    pub line: u64,
    pub is_stmt: bool,
}

pub struct DebugInfo {
    units: Vec<CompileUnit>,
    files: FileTable,
}

impl DebugInfo {
    pub fn new(units: Vec<CompileUnit>, files: FileTable) -> Self {
        Self { units, files }
    }

    pub fn units(&self) -> &[CompileUnit] {
        &self.units
    }

    pub fn file_name(&self, id: u32) -> &str {
        self.files.get_by_id(id).map(String::as_str).unwrap_or("??")
    }

    fn unit_for(&self, pc: u64) -> Option<&CompileUnit> {
        self.units.iter().find(|u| u.contains(pc))
    }

    /// First top-level function of the unit owning `pc` whose range holds it.
    pub fn function_containing(&self, pc: u64) -> Result<&FunctionEntry> {
        self.unit_for(pc)
            .and_then(|u| u.functions.iter().find(|f| f.contains(pc)))
            .ok_or(DebugError::UnknownFunction(pc))
    }

    pub fn line_entry_for(&self, pc: u64) -> Result<LineEntry> {
        let unit = self.unit_for(pc).ok_or(DebugError::UnknownLineEntry(pc))?;
        let idx = unit.covering_row(pc).ok_or(DebugError::UnknownLineEntry(pc))?;
        Ok(self.entry(&unit.lines[idx]))
    }

    fn entry(&self, row: &LineRow) -> LineEntry {
        LineEntry {
            address: row.address,
            file: self.file_name(row.file_id).to_string(),
            line: row.line,
            is_stmt: row.is_stmt,
        }
    }

    /// Post-prologue address of every function called `name`: the row after
    /// the one covering the function's low PC. Functions without line rows
    /// fall back to their low PC.
    pub fn function_breakpoint_addresses(&self, name: &str) -> Result<Vec<u64>> {
        let mut found = false;
        let mut addresses = Vec::new();
        for unit in &self.units {
            for func in unit.functions.iter().filter(|f| f.name == name) {
                found = true;
                let addr = match unit.covering_row(func.low_pc) {
                    Some(idx) => match unit.lines.get(idx + 1) {
                        Some(next) if !next.end_sequence => next.address,
                        _ => unit.lines[idx].address,
                    },
                    None => func.low_pc,
                };
                debug!("{} [{:#x}, {:#x}) -> breakpoint at {:#x}", name, func.low_pc, func.high_pc, addr);
                if !addresses.contains(&addr) {
                    addresses.push(addr);
                }
            }
        }
        if !found {
            return Err(DebugError::NoSuchFunction(name.to_string()));
        }
        Ok(addresses)
    }

    /// Address of the first statement row for `line` in a unit whose primary
    /// source name ends with `file`. Rows inlined from other files into the
    /// unit do not count. `None` when nothing matches.
    pub fn line_breakpoint_address(&self, file: &str, line: u64) -> Option<u64> {
        self.units
            .iter()
            .filter(|u| path_ends_with(&u.name, file))
            .find_map(|u| {
                u.lines
                    .iter()
                    .find(|r| {
                        r.is_stmt
                            && !r.end_sequence
                            && r.line == line
                            && path_ends_with(self.file_name(r.file_id), file)
                    })
                    .map(|r| r.address)
            })
    }

    /// Statement-row addresses of `func`, walking its unit's line table from
    /// the row at the function's low PC up to its high PC.
    pub fn statement_addresses(&self, func: &FunctionEntry) -> Result<Vec<u64>> {
        let unit = self
            .unit_for(func.low_pc)
            .ok_or(DebugError::UnknownLineEntry(func.low_pc))?;
        let start = unit
            .covering_row(func.low_pc)
            .ok_or(DebugError::UnknownLineEntry(func.low_pc))?;
        Ok(unit.lines[start..]
            .iter()
            .take_while(|r| !r.end_sequence && r.address < func.high_pc)
            .filter(|r| r.is_stmt)
            .map(|r| r.address)
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn row(address: u64, line: u64, is_stmt: bool) -> LineRow {
        LineRow {
            address,
            file_id: 1,
            line,
            is_stmt,
            end_sequence: false,
        }
    }

    fn end(address: u64) -> LineRow {
        LineRow {
            address,
            file_id: 1,
            line: 0,
            is_stmt: false,
            end_sequence: true,
        }
    }

    /// Two functions in `src/prog.c`:
    ///
    /// ```text
    /// callee: 0x1000..0x1020   lines 2 (entry), 3, 4
    /// main:   0x1020..0x1060   lines 7 (entry), 8 (call), 9, 9 (non-stmt), 10
    /// ```
    pub(crate) fn sample() -> DebugInfo {
        let mut files = FileTable::new();
        let id = files.intern("/work/src/prog.c".to_string());
        assert_eq!(id, 1);
        let unit = CompileUnit {
            name: "/work/src/prog.c".to_string(),
            ranges: vec![0x1000..0x1060],
            functions: vec![
                FunctionEntry {
                    name: "callee".to_string(),
                    low_pc: 0x1000,
                    high_pc: 0x1020,
                },
                FunctionEntry {
                    name: "main".to_string(),
                    low_pc: 0x1020,
                    high_pc: 0x1060,
                },
            ],
            lines: vec![
                row(0x1000, 2, true),
                row(0x1008, 3, true),
                row(0x1010, 4, true),
                row(0x1020, 7, true),
                row(0x1028, 8, true),
                row(0x1030, 9, true),
                row(0x1038, 9, false),
                row(0x1040, 10, true),
                end(0x1060),
            ],
        };
        DebugInfo::new(vec![unit], files)
    }

    /// `sample` with the non-statement row at `address` replaced by a
    /// statement row at line 0.
    pub(crate) fn sample_with_line_zero_at(address: u64) -> DebugInfo {
        let mut info = sample();
        for r in info.units[0].lines.iter_mut().filter(|r| r.address == address) {
            *r = row(address, 0, true);
        }
        info
    }

    #[test]
    fn function_lookup_uses_half_open_ranges() {
        let info = sample();
        assert_eq!(info.function_containing(0x1000).unwrap().name, "callee");
        assert_eq!(info.function_containing(0x101f).unwrap().name, "callee");
        assert_eq!(info.function_containing(0x1020).unwrap().name, "main");
        assert!(matches!(
            info.function_containing(0x1060),
            Err(DebugError::UnknownFunction(0x1060))
        ));
    }

    #[test]
    fn line_lookup_picks_the_covering_row() {
        let info = sample();
        let e = info.line_entry_for(0x102c).unwrap();
        assert_eq!((e.address, e.line), (0x1028, 8));
        assert_eq!(e.file, "/work/src/prog.c");
        assert_eq!(info.line_entry_for(0x1038).unwrap().line, 9);
        assert!(matches!(
            info.line_entry_for(0x1060),
            Err(DebugError::UnknownLineEntry(_))
        ));
    }

    #[test]
    fn function_breakpoint_skips_the_entry_row() {
        let info = sample();
        assert_eq!(info.function_breakpoint_addresses("main").unwrap(), vec![0x1028]);
        assert_eq!(info.function_breakpoint_addresses("callee").unwrap(), vec![0x1008]);
        assert!(matches!(
            info.function_breakpoint_addresses("nope"),
            Err(DebugError::NoSuchFunction(_))
        ));
    }

    #[test]
    fn duplicate_static_functions_all_resolve() {
        let mut info = sample();
        let mut other = info.units[0].clone();
        other.name = "/work/src/other.c".to_string();
        for f in &mut other.functions {
            f.low_pc += 0x1000;
            f.high_pc += 0x1000;
        }
        for r in &mut other.lines {
            r.address += 0x1000;
        }
        other.ranges = vec![0x2000..0x2060];
        info.units.push(other);
        assert_eq!(
            info.function_breakpoint_addresses("callee").unwrap(),
            vec![0x1008, 0x2008]
        );
    }

    #[test]
    fn line_breakpoint_matches_path_suffix_and_statements() {
        let info = sample();
        assert_eq!(info.line_breakpoint_address("prog.c", 9), Some(0x1030));
        assert_eq!(info.line_breakpoint_address("src/prog.c", 10), Some(0x1040));
        assert_eq!(info.line_breakpoint_address("/work/src/prog.c", 3), Some(0x1008));
        assert_eq!(info.line_breakpoint_address("other.c", 9), None);
        assert_eq!(info.line_breakpoint_address("prog.c", 99), None);
    }

    #[test]
    fn statement_walk_stays_inside_the_function() {
        let info = sample();
        let main = info.function_containing(0x1020).unwrap().clone();
        assert_eq!(
            info.statement_addresses(&main).unwrap(),
            vec![0x1020, 0x1028, 0x1030, 0x1040]
        );
        let callee = info.function_containing(0x1000).unwrap().clone();
        assert_eq!(
            info.statement_addresses(&callee).unwrap(),
            vec![0x1000, 0x1008, 0x1010]
        );
    }
}
