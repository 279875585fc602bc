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

use std::sync::Arc;

use object::{Object, ObjectSymbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    None,
    Object,
    Function,
    Section,
    File,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::None => "notype",
            SymbolKind::Object => "object",
            SymbolKind::Function => "func",
            SymbolKind::Section => "section",
            SymbolKind::File => "file",
        }
    }
}

impl From<object::SymbolKind> for SymbolKind {
    fn from(kind: object::SymbolKind) -> Self {
        match kind {
            object::SymbolKind::Text => SymbolKind::Function,
            object::SymbolKind::Data | object::SymbolKind::Tls => SymbolKind::Object,
            object::SymbolKind::Section => SymbolKind::Section,
            object::SymbolKind::File => SymbolKind::File,
            _ => SymbolKind::None,
        }
    }
}

/// Which ELF symbol table an entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolSource {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub kind: SymbolKind,
    pub source: SymbolSource,
}

pub struct SymbolTable {
    // Names are not unique: statics in different files and the same symbol
    // in .symtab and .dynsym all share one entry here.
    symbols_by_name: std::collections::HashMap<String, Vec<Arc<Symbol>>>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self {
            symbols_by_name: std::collections::HashMap::new(),
        }
    }

    /// Collect `.symtab` and `.dynsym`.
    pub fn from_object(obj: &object::File) -> Self {
        let mut table = Self::new();
        let tables = [
            (SymbolSource::Static, obj.symbols()),
            (SymbolSource::Dynamic, obj.dynamic_symbols()),
        ];
        for (source, symbols) in tables {
            for sym in symbols {
                let Ok(name) = sym.name() else { continue };
                if name.is_empty() {
                    continue;
                }
                table.insert(Symbol {
                    name: name.to_string(),
                    address: sym.address(),
                    size: sym.size(),
                    kind: sym.kind().into(),
                    source,
                });
            }
        }
        table
    }

    pub fn insert(&mut self, symbol: Symbol) {
        let arc_symbol = Arc::new(symbol);
        self.symbols_by_name
            .entry(arc_symbol.name.clone())
            .or_default()
            .push(arc_symbol);
    }

    /// Every entry named exactly `name`, in table order. Empty when absent.
    pub fn get_by_name(&self, name: &str) -> Vec<Symbol> {
        self.symbols_by_name
            .get(name)
            .map(|syms| syms.iter().map(|s| s.as_ref().clone()).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.symbols_by_name.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols_by_name.is_empty()
    }
}

/// Demangled form of a Rust symbol name, or the name unchanged.
pub fn display_name(name: &str) -> String {
    match rustc_demangle::try_demangle(name) {
        Ok(d) => format!("{:#}", d),
        Err(_) => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(name: &str, address: u64, size: u64, kind: SymbolKind, source: SymbolSource) -> Symbol {
        Symbol {
            name: name.to_string(),
            address,
            size,
            kind,
            source,
        }
    }

    #[test]
    fn duplicate_names_across_tables_are_all_returned() {
        let mut table = SymbolTable::new();
        table.insert(sym("puts", 0, 0, SymbolKind::Function, SymbolSource::Static));
        table.insert(sym("puts", 0, 0, SymbolKind::Function, SymbolSource::Dynamic));
        table.insert(sym("counter", 0x4010, 4, SymbolKind::Object, SymbolSource::Static));

        let found = table.get_by_name("puts");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].source, SymbolSource::Static);
        assert_eq!(found[1].source, SymbolSource::Dynamic);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn lookup_is_verbatim_and_missing_names_are_empty() {
        let mut table = SymbolTable::new();
        table.insert(sym("main", 0x1139, 0x20, SymbolKind::Function, SymbolSource::Static));
        assert!(table.get_by_name("mai").is_empty());
        assert!(table.get_by_name("Main").is_empty());
        assert_eq!(table.get_by_name("main")[0].address, 0x1139);
    }

    #[test]
    fn demangles_rust_names_only() {
        assert_eq!(display_name("main"), "main");
        assert_eq!(
            display_name("_ZN4core3fmt5write17h0123456789abcdefE"),
            "core::fmt::write"
        );
    }
}
