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

//! Text command language of the interactive front end.
//!
//! Every keyword may be abbreviated to any prefix; when a prefix fits more
//! than one keyword the first in table order wins (`s` is `step`). Numbers
//! are hexadecimal with or without `0x`, except line numbers.

use crate::error::{DebugError, Result};
use crate::utils::parse_hex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BreakTarget {
    Address(u64),
    Function(String),
    Line { file: String, line: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegisterCommand {
    Dump,
    Read(String),
    Write(String, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryCommand {
    Read(u64),
    Write(u64, u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Instruction,
    Line,
    Over,
    Out,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Continue,
    Break(BreakTarget),
    Delete(u64),
    Register(RegisterCommand),
    Memory(MemoryCommand),
    Step(StepKind),
    Symbol(String),
    InfoBreakpoints,
    Help,
    Quit,
}

const KEYWORDS: [&str; 10] = [
    "continue", "break", "delete", "register", "memory", "step", "symbol", "info", "help", "quit",
];

pub const HELP: &str = "\
continue                     resume until the next stop
break <0xaddr>               breakpoint at a runtime address
break <function>             breakpoint after the prologue of a function
break <file>:<line>          breakpoint on a source line
delete <0xaddr>              remove a breakpoint
register dump                print every register
register read <name>         print one register
register write <name> <hex>  set one register
memory read <hex>            print the word at an address
memory write <hex> <hex>     store a word at an address
step [instruction|line|over|out]
symbol <name>                look a name up in the ELF symbol tables
info breakpoints             list breakpoints
quit";

fn is_prefix(word: &str, of: &str) -> bool {
    !word.is_empty() && of.starts_with(word)
}

/// First of `choices` that `word` abbreviates.
fn keyword<'a>(word: &str, choices: &[&'a str]) -> Option<&'a str> {
    choices.iter().copied().find(|c| is_prefix(word, c))
}

fn hex(word: Option<&str>, what: &str) -> Result<u64> {
    let word = word.ok_or_else(|| DebugError::Parse(format!("missing {}", what)))?;
    parse_hex(word).ok_or_else(|| DebugError::Parse(format!("invalid {} '{}'", what, word)))
}

fn arg<'a>(word: Option<&'a str>, what: &str) -> Result<&'a str> {
    word.ok_or_else(|| DebugError::Parse(format!("missing {}", what)))
}

/// Parse one input line. Blank lines parse to `None`.
pub fn parse(line: &str) -> Result<Option<Command>> {
    let mut words = line.split_whitespace();
    let Some(first) = words.next() else {
        return Ok(None);
    };
    let command = keyword(first, &KEYWORDS)
        .ok_or_else(|| DebugError::Parse(format!("Unknown command '{}'", first)))?;

    let parsed = match command {
        "continue" => Command::Continue,
        "break" => Command::Break(parse_break_target(arg(words.next(), "breakpoint location")?)?),
        "delete" => Command::Delete(hex(words.next(), "address")?),
        "register" => {
            let sub = arg(words.next(), "register subcommand")?;
            match keyword(sub, &["dump", "read", "write"]) {
                Some("dump") => Command::Register(RegisterCommand::Dump),
                Some("read") => Command::Register(RegisterCommand::Read(
                    arg(words.next(), "register name")?.to_string(),
                )),
                Some(_) => {
                    let name = arg(words.next(), "register name")?.to_string();
                    Command::Register(RegisterCommand::Write(name, hex(words.next(), "value")?))
                }
                None => return Err(DebugError::Parse(format!("Unknown register subcommand '{}'", sub))),
            }
        }
        "memory" => {
            let sub = arg(words.next(), "memory subcommand")?;
            match keyword(sub, &["read", "write"]) {
                Some("read") => Command::Memory(MemoryCommand::Read(hex(words.next(), "address")?)),
                Some(_) => {
                    let addr = hex(words.next(), "address")?;
                    Command::Memory(MemoryCommand::Write(addr, hex(words.next(), "value")?))
                }
                None => return Err(DebugError::Parse(format!("Unknown memory subcommand '{}'", sub))),
            }
        }
        "step" => {
            let kind = match words.next() {
                None => StepKind::Line,
                Some(sub) => match keyword(sub, &["instruction", "line", "over", "out"]) {
                    Some("instruction") => StepKind::Instruction,
                    Some("line") => StepKind::Line,
                    Some("over") => StepKind::Over,
                    Some(_) => StepKind::Out,
                    None => return Err(DebugError::Parse(format!("Unknown step kind '{}'", sub))),
                },
            };
            Command::Step(kind)
        }
        "symbol" => Command::Symbol(arg(words.next(), "symbol name")?.to_string()),
        "info" => match words.next() {
            Some(sub) if is_prefix(sub, "breakpoints") => Command::InfoBreakpoints,
            _ => return Err(DebugError::Parse("usage: info breakpoints".to_string())),
        },
        "help" => Command::Help,
        _ => Command::Quit,
    };
    Ok(Some(parsed))
}

/// `0x…` is an address, `file:line` a source line, anything else a function.
/// Only a run of digits after the last `:` makes a line, so `ns::f` stays a
/// function name.
fn parse_break_target(target: &str) -> Result<BreakTarget> {
    if target.starts_with("0x") || target.starts_with("0X") {
        return parse_hex(target)
            .map(BreakTarget::Address)
            .ok_or_else(|| DebugError::Parse(format!("invalid address '{}'", target)));
    }
    let split = target
        .rsplit_once(':')
        .filter(|(file, line)| !file.is_empty() && !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit()));
    if let Some((file, line)) = split {
        let line = line
            .parse::<u64>()
            .map_err(|_| DebugError::Parse(format!("invalid line number '{}'", line)))?;
        return Ok(BreakTarget::Line {
            file: file.to_string(),
            line,
        });
    }
    Ok(BreakTarget::Function(target.to_string()))
}
