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

use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use nix::unistd::Pid;

use ptdbg::debug::{init_logging, LogOptions};
use ptdbg::request_handler;
use ptdbg::source_view::SourcePrinter;
use ptdbg::{Session, SessionConfig};

#[derive(Parser, Debug)]
#[command(name = "ptdbg", version, about = "Source-level debugger for x86-64 Linux programs")]
struct Cli {
    /// Program to launch under the debugger
    #[arg(required_unless_present = "pid", conflicts_with = "pid")]
    program: Option<PathBuf>,

    /// Arguments passed to the program
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Attach to a running process instead of launching one
    #[arg(short = 'p', long = "pid")]
    pid: Option<i32>,

    /// Source lines shown on each side of the current line
    #[arg(short = 'c', long = "context", default_value_t = 2)]
    context: usize,

    /// Leave address space randomization enabled for a launched program
    #[arg(long = "keep-aslr", default_value_t = false)]
    keep_aslr: bool,

    /// Read commands from a file instead of stdin
    #[arg(short = 'b', long = "batch")]
    batch: Option<PathBuf>,

    /// Log specification, e.g. `info` or `ptdbg=trace` (overrides RUST_LOG)
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Write the log to this file instead of stderr
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Enable debug output
    #[arg(short = 'd', long = "debug", default_value_t = false)]
    debug: bool,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            context_lines: self.context,
            disable_aslr: !self.keep_aslr,
            args: self.args.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = init_logging(&LogOptions {
        level: cli.log_level.clone(),
        file: cli.log_file.clone(),
        debug: cli.debug,
    })
    .context("failed to start logging")?;

    let display = SourcePrinter::new(io::stdout());
    let mut session = match (cli.pid, &cli.program) {
        (Some(pid), _) => {
            let session = Session::attach(Pid::from_raw(pid), cli.session_config(), display)
                .with_context(|| format!("failed to attach to pid {}", pid))?;
            println!("Attached to {} with PID {}", session.program().display(), pid);
            session
        }
        (None, Some(program)) => {
            let session = Session::launch(program, cli.session_config(), display)
                .with_context(|| format!("failed to start {}", program.display()))?;
            println!("Started {} with PID {}", program.display(), session.pid());
            session
        }
        (None, None) => anyhow::bail!("no program or pid given"),
    };

    match cli.batch {
        Some(ref path) => {
            let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
            request_handler::run(&mut session, BufReader::new(file), io::stdout(), None)?;
        }
        None => {
            let stdin = io::stdin();
            request_handler::run(&mut session, stdin.lock(), io::stdout(), Some("ptdbg> "))?;
        }
    }
    info!("session for pid {} finished", session.pid());
    Ok(())
}
