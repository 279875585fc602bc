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

use std::fmt::Write as _;
use std::io::{BufRead, Write};

use log::debug;

use crate::commands::{self, BreakTarget, Command, MemoryCommand, RegisterCommand, StepKind, HELP};
use crate::error::Result;
use crate::process::Tracee;
use crate::session::Session;
use crate::signals::SourceDisplay;
use crate::symbols::{display_name, SymbolSource};

/// What the front end should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Print this text (already newline terminated).
    Output(String),
    /// Nothing to print; stop reports went through the display.
    Silent,
    Quit,
}

/// Run one parsed command against the session.
pub fn dispatch<T: Tracee, D: SourceDisplay>(session: &mut Session<T, D>, command: Command) -> Result<Reply> {
    debug!("dispatch {:?}", command);
    let reply = match command {
        Command::Continue => {
            session.resume()?;
            Reply::Silent
        }
        Command::Break(target) => handle_break(session, target)?,
        Command::Delete(addr) => {
            session.remove_breakpoint(addr)?;
            Reply::Output(format!("Removed breakpoint at address {:#x}\n", addr))
        }
        Command::Register(RegisterCommand::Dump) => {
            let mut out = String::new();
            for (name, value) in session.dump_registers()? {
                let _ = writeln!(out, "{:<8} 0x{:016x}", name, value);
            }
            Reply::Output(out)
        }
        Command::Register(RegisterCommand::Read(name)) => {
            Reply::Output(format!("{:#x}\n", session.read_register(&name)?))
        }
        Command::Register(RegisterCommand::Write(name, value)) => {
            session.write_register(&name, value)?;
            Reply::Silent
        }
        Command::Memory(MemoryCommand::Read(addr)) => {
            Reply::Output(format!("{:#x}\n", session.read_memory(addr)?))
        }
        Command::Memory(MemoryCommand::Write(addr, value)) => {
            session.write_memory(addr, value)?;
            Reply::Silent
        }
        Command::Step(kind) => {
            match kind {
                StepKind::Instruction => session.step_instruction()?,
                StepKind::Line => session.step_line()?,
                StepKind::Over => session.step_over()?,
                StepKind::Out => session.step_out()?,
            };
            Reply::Silent
        }
        Command::Symbol(name) => handle_symbol(session, &name),
        Command::InfoBreakpoints => handle_info_breakpoints(session),
        Command::Help => Reply::Output(format!("{}\n", HELP)),
        Command::Quit => Reply::Quit,
    };
    Ok(reply)
}

fn handle_break<T: Tracee, D: SourceDisplay>(session: &mut Session<T, D>, target: BreakTarget) -> Result<Reply> {
    let addresses = match target {
        BreakTarget::Address(addr) => {
            session.set_breakpoint_at_address(addr)?;
            vec![addr]
        }
        BreakTarget::Function(name) => session.break_function(&name)?,
        BreakTarget::Line { file, line } => session.break_line(&file, line)?,
    };
    if addresses.is_empty() {
        return Ok(Reply::Silent);
    }
    let mut out = String::new();
    for addr in addresses {
        let _ = writeln!(out, "Set breakpoint at address {:#x}", addr);
    }
    Ok(Reply::Output(out))
}

fn handle_symbol<T: Tracee, D: SourceDisplay>(session: &Session<T, D>, name: &str) -> Reply {
    let symbols = session.symbol_lookup(name);
    if symbols.is_empty() {
        return Reply::Output(format!("No symbol named {}\n", name));
    }
    let mut out = String::new();
    for sym in symbols {
        let table = match sym.source {
            SymbolSource::Static => "symtab",
            SymbolSource::Dynamic => "dynsym",
        };
        let _ = writeln!(
            out,
            "{} {} {:#x} ({})",
            display_name(&sym.name),
            sym.kind.as_str(),
            sym.address,
            table
        );
    }
    Reply::Output(out)
}

fn handle_info_breakpoints<T: Tracee, D: SourceDisplay>(session: &Session<T, D>) -> Reply {
    if session.breakpoints().is_empty() {
        return Reply::Output("No breakpoints\n".to_string());
    }
    let mut out = String::new();
    for bp in session.breakpoints().iter() {
        let state = if bp.is_enabled() { "enabled" } else { "disabled" };
        let _ = write!(out, "{:#x} {}", bp.address(), state);
        if let Ok(entry) = session.location_of(bp.address()) {
            let _ = write!(out, " at {}:{}", entry.file, entry.line);
        }
        out.push('\n');
    }
    Reply::Output(out)
}

/// Read commands from `input` until `quit` or end of input. Results go to
/// `output`; command errors are reported there too and do not end the loop.
pub fn run<T, D, R, W>(session: &mut Session<T, D>, input: R, mut output: W, prompt: Option<&str>) -> std::io::Result<()>
where
    T: Tracee,
    D: SourceDisplay,
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    loop {
        if let Some(prompt) = prompt {
            write!(output, "{}", prompt)?;
            output.flush()?;
        }
        let Some(line) = lines.next().transpose()? else {
            return Ok(());
        };
        let reply = commands::parse(&line).and_then(|cmd| match cmd {
            Some(cmd) => dispatch(session, cmd),
            None => Ok(Reply::Silent),
        });
        match reply {
            Ok(Reply::Output(text)) => output.write_all(text.as_bytes())?,
            Ok(Reply::Silent) => {}
            Ok(Reply::Quit) => return Ok(()),
            Err(e) => writeln!(output, "error: {}", e)?,
        }
        output.flush()?;
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::session::tests::session_at;
    use crate::symbols::{Symbol, SymbolKind};

    fn exec(script: &str) -> String {
        let mut s = session_at(0x1020);
        let mut out = Vec::new();
        run(&mut s, Cursor::new(script), &mut out, None).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn memory_write_then_read_round_trips() {
        assert_eq!(exec("memory write 0x7000 0xcafe\nmemory read 0x7000\n"), "0xcafe\n");
    }

    #[test]
    fn register_commands() {
        let out = exec("reg write rbx 0x2a\nreg read rbx\nreg read nope\n");
        assert_eq!(out, "0x2a\nerror: unknown register: nope\n");
    }

    #[test]
    fn break_continue_and_list() {
        let out = exec("break main\nb prog.c:99\ninfo breakpoints\ncontinue\ndelete 0x1028\ninfo b\n");
        assert_eq!(
            out,
            "Set breakpoint at address 0x1028\n\
             0x1028 enabled at /work/src/prog.c:8\n\
             Removed breakpoint at address 0x1028\n\
             No breakpoints\n"
        );
    }

    #[test]
    fn errors_do_not_end_the_loop_but_quit_does() {
        let out = exec("bogus\nb nosuch\nquit\nmemory read 0x1020\n");
        assert_eq!(out, "error: Unknown command 'bogus'\nerror: no function named nosuch\n");
    }

    #[test]
    fn continue_after_exit_reports_the_dead_process() {
        let out = exec("c\nc\n");
        assert_eq!(out, "error: the process is not running\n");
    }

    #[test]
    fn prompt_is_printed_per_line() {
        let mut s = session_at(0x1020);
        let mut out = Vec::new();
        run(&mut s, Cursor::new("help\n"), &mut out, Some("(ptdbg) ")).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("(ptdbg) continue"));
        assert!(out.ends_with("quit\n(ptdbg) "));
    }

    #[test]
    fn symbols_list_both_tables() {
        let mut s = session_at(0x1020);
        for source in [SymbolSource::Static, SymbolSource::Dynamic] {
            s.object.symbols.insert(Symbol {
                name: "main".to_string(),
                address: 0x1020,
                size: 0x40,
                kind: SymbolKind::Function,
                source,
            });
        }
        assert_eq!(
            dispatch(&mut s, Command::Symbol("main".to_string())).unwrap(),
            Reply::Output("main func 0x1020 (symtab)\nmain func 0x1020 (dynsym)\n".to_string())
        );
        assert_eq!(
            dispatch(&mut s, Command::Symbol("mai".to_string())).unwrap(),
            Reply::Output("No symbol named mai\n".to_string())
        );
    }
}
