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

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Instant;

use gimli::Reader;
use log::{debug, info};
use object::{Object, ObjectSection};

use crate::dwarf::{CompileUnit, DebugInfo, FunctionEntry, LineRow};
use crate::error::{DebugError, Result};
use crate::symbols::SymbolTable;
use crate::utils::canonicalize_path;

type GimliReader = gimli::EndianRcSlice<gimli::RunTimeEndian>;

pub struct FileTable {
    // Map from file index to file path
    files_by_id: BTreeMap<u32, String>,
    id_by_file: BTreeMap<String, u32>,
    next_id: u32,
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTable {
    pub fn new() -> Self {
        Self {
            files_by_id: BTreeMap::new(),
            id_by_file: BTreeMap::new(),
            next_id: 1,
        }
    }

    pub fn intern(&mut self, path: String) -> u32 {
        let fp = canonicalize_path(&path);
        if let Some(&id) = self.id_by_file.get(&fp) {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        self.files_by_id.insert(id, fp.clone());
        self.id_by_file.insert(fp, id);
        id
    }

    pub fn get_by_id(&self, id: u32) -> Option<&String> {
        self.files_by_id.get(&id)
    }
}

/// Everything the debugger reads from the executable file, loaded once.
pub struct ObjectInfo {
    pub path: PathBuf,
    /// `.symtab` and `.dynsym`
    pub symbols: SymbolTable,
    /// Units, functions and line tables from DWARF
    pub debug_info: DebugInfo,
    /// ET_DYN images are relocated at load time; see `Session::load_bias`.
    pub position_independent: bool,
}

impl ObjectInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let now = Instant::now();
        let file = std::fs::File::open(path)
            .map_err(|e| DebugError::MalformedDebugInfo(format!("{}: {}", path.display(), e)))?;
        // SAFETY: the mapping is read-only and dropped before this returns;
        // everything kept is copied out of it.
        let mmap = unsafe { memmap2::Mmap::map(&file) }
            .map_err(|e| DebugError::MalformedDebugInfo(format!("{}: {}", path.display(), e)))?;
        let obj_file = object::File::parse(&*mmap)?;

        let symbols = SymbolTable::from_object(&obj_file);
        let debug_info = load_dwarf(&obj_file)?;
        info!(
            "loaded {}: {} symbols, {} units in {:.2?}",
            path.display(),
            symbols.len(),
            debug_info.units().len(),
            now.elapsed()
        );
        Ok(Self {
            path: path.to_path_buf(),
            symbols,
            debug_info,
            position_independent: obj_file.kind() == object::ObjectKind::Dynamic,
        })
    }
}

fn load_dwarf(obj_file: &object::File) -> Result<DebugInfo> {
    let endian = if obj_file.is_little_endian() {
        gimli::RunTimeEndian::Little
    } else {
        gimli::RunTimeEndian::Big
    };

    // Load DWARF sections
    let load_section = |id: gimli::SectionId| -> std::result::Result<GimliReader, gimli::Error> {
        let data = obj_file
            .section_by_name(id.name())
            .and_then(|s| s.uncompressed_data().ok())
            .unwrap_or_default();

        let data_rc: Rc<[u8]> = match data {
            Cow::Borrowed(b) => Rc::from(b),
            Cow::Owned(o) => Rc::from(o),
        };
        Ok(gimli::EndianRcSlice::new(data_rc, endian))
    };

    let dwarf = gimli::Dwarf::load(&load_section)?;
    let mut files = FileTable::new();
    let mut units = Vec::new();

    // Iterate over Compilation Units
    let mut headers = dwarf.units();
    while let Some(header) = headers.next()? {
        let unit = dwarf.unit(header)?;
        let name = match unit.name {
            Some(ref n) => primary_source(&n.to_string_lossy()?),
            None => String::new(),
        };

        let mut ranges = Vec::new();
        let mut iter = dwarf.unit_ranges(&unit)?;
        while let Some(range) = iter.next()? {
            if range.begin < range.end {
                ranges.push(range.begin..range.end);
            }
        }

        let functions = collect_functions(&dwarf, &unit)?;
        let lines = collect_lines(&dwarf, &unit, &mut files)?;
        debug!(
            "unit {}: {} ranges, {} functions, {} rows",
            name,
            ranges.len(),
            functions.len(),
            lines.len()
        );
        units.push(CompileUnit {
            name,
            ranges,
            functions,
            lines,
        });
    }

    Ok(DebugInfo::new(units, files))
}

/// rustc names units `<crate root>/@/<codegen unit>`; keep the source part.
fn primary_source(unit_name: &str) -> String {
    match unit_name.split_once("/@/") {
        Some((source, _)) => source.to_string(),
        None => unit_name.to_string(),
    }
}

/// Subprograms with code, excluding any nested inside another subprogram.
/// Namespaces and classes do not count as nesting.
fn collect_functions(
    dwarf: &gimli::Dwarf<GimliReader>,
    unit: &gimli::Unit<GimliReader>,
) -> Result<Vec<FunctionEntry>> {
    let mut functions = Vec::new();
    let mut entries = unit.entries();
    let mut depth: isize = 0;
    let mut enclosing: Option<isize> = None;

    while let Some((delta, entry)) = entries.next_dfs()? {
        depth += delta;
        if enclosing.is_some_and(|d| depth <= d) {
            enclosing = None;
        }
        if entry.tag() != gimli::DW_TAG_subprogram || enclosing.is_some() {
            continue;
        }
        enclosing = Some(depth);

        // low_pc is usually an absolute address
        let Some(low_attr) = entry.attr_value(gimli::DW_AT_low_pc)? else {
            continue;
        };
        let Some(low) = dwarf.attr_address(unit, low_attr)? else {
            continue;
        };

        // high_pc can be an address OR an offset (length)
        let high = match entry.attr_value(gimli::DW_AT_high_pc)? {
            Some(gimli::AttributeValue::Addr(addr)) => addr,
            Some(v @ gimli::AttributeValue::DebugAddrIndex(_)) => match dwarf.attr_address(unit, v)? {
                Some(addr) => addr,
                None => continue,
            },
            Some(v) => match v.udata_value() {
                Some(size) => low + size,
                None => continue,
            },
            None => continue,
        };

        if low == 0 || high <= low {
            continue;
        }
        let name = die_name(dwarf, unit, entry)?.unwrap_or_default();
        functions.push(FunctionEntry {
            name,
            low_pc: low,
            high_pc: high,
        });
    }
    Ok(functions)
}

/// DW_AT_name of a DIE, following one level of specification/abstract origin.
fn die_name(
    dwarf: &gimli::Dwarf<GimliReader>,
    unit: &gimli::Unit<GimliReader>,
    entry: &gimli::DebuggingInformationEntry<GimliReader>,
) -> Result<Option<String>> {
    if let Some(name_attr) = entry.attr_value(gimli::DW_AT_name)? {
        let s = dwarf.attr_string(unit, name_attr)?;
        return Ok(Some(s.to_string_lossy()?.into_owned()));
    }
    for link in [gimli::DW_AT_specification, gimli::DW_AT_abstract_origin] {
        if let Some(gimli::AttributeValue::UnitRef(offset)) = entry.attr_value(link)? {
            let target = unit.entry(offset)?;
            if let Some(name_attr) = target.attr_value(gimli::DW_AT_name)? {
                let s = dwarf.attr_string(unit, name_attr)?;
                return Ok(Some(s.to_string_lossy()?.into_owned()));
            }
        }
    }
    Ok(None)
}

fn collect_lines(
    dwarf: &gimli::Dwarf<GimliReader>,
    unit: &gimli::Unit<GimliReader>,
    files: &mut FileTable,
) -> Result<Vec<LineRow>> {
    let mut lines = Vec::new();
    let Some(program) = unit.line_program.clone() else {
        return Ok(lines);
    };
    // DWARF file index -> FileTable id, for this unit only
    let mut file_ids: HashMap<u64, u32> = HashMap::new();
    let mut rows = program.rows();
    while let Some((header, row)) = rows.next_row()? {
        let file_id = match file_ids.get(&row.file_index()) {
            Some(&id) => id,
            None => {
                let path = match row.file(header) {
                    Some(file) => render_file(dwarf, unit, header, file)?,
                    None => "??".to_string(),
                };
                let id = files.intern(path);
                file_ids.insert(row.file_index(), id);
                id
            }
        };
        lines.push(LineRow {
            address: row.address(),
            file_id,
            // Line information is missing (0) for compiler generated code
            line: row.line().map(|l| l.get()).unwrap_or(0),
            is_stmt: row.is_stmt(),
            end_sequence: row.end_sequence(),
        });
    }
    Ok(lines)
}

fn render_file(
    dwarf: &gimli::Dwarf<GimliReader>,
    unit: &gimli::Unit<GimliReader>,
    header: &gimli::LineProgramHeader<GimliReader>,
    file: &gimli::FileEntry<GimliReader>,
) -> Result<String> {
    // Absolute components replace what was pushed before them.
    let mut path = PathBuf::new();
    if let Some(ref comp_dir) = unit.comp_dir {
        path.push(comp_dir.to_string_lossy()?.as_ref());
    }
    if let Some(dir) = file.directory(header) {
        path.push(dwarf.attr_string(unit, dir)?.to_string_lossy()?.as_ref());
    }
    path.push(
        dwarf
            .attr_string(unit, file.path_name())?
            .to_string_lossy()?
            .as_ref(),
    );
    Ok(path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_table_interns_once() {
        let mut table = FileTable::new();
        let a = table.intern("/src/a.c".to_string());
        let b = table.intern("/src/b.c".to_string());
        assert_ne!(a, b);
        assert_eq!(table.intern("/src/a.c".to_string()), a);
        assert_eq!(table.get_by_id(b).map(String::as_str), Some("/src/b.c"));
        assert_eq!(table.get_by_id(a).map(String::as_str), Some("/src/a.c"));
        assert_eq!(table.get_by_id(0), None);
    }

    #[test]
    fn rust_unit_names_lose_the_codegen_unit() {
        assert_eq!(primary_source("src/main.rs/@/ptdbg.1a2b3c-cgu.0"), "src/main.rs");
        assert_eq!(primary_source("/work/src/prog.c"), "/work/src/prog.c");
    }

    #[test]
    fn loading_a_non_elf_file_is_malformed_debug_info() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not an executable").unwrap();
        assert!(matches!(
            ObjectInfo::load(file.path()),
            Err(DebugError::MalformedDebugInfo(_))
        ));
    }

    #[test]
    fn loading_a_missing_file_is_malformed_debug_info() {
        assert!(matches!(
            ObjectInfo::load(Path::new("/nonexistent/ptdbg")),
            Err(DebugError::MalformedDebugInfo(_))
        ));
    }
}
