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

//! Error taxonomy shared by every layer of the debugger core.

use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DebugError>;

#[derive(Debug, Error)]
pub enum DebugError {
    /// Register name or DWARF register number with no row in the register table.
    #[error("unknown register: {0}")]
    UnknownRegister(String),

    /// No function entry in the debug info covers the address (DWARF address space).
    #[error("no function contains address {0:#x}")]
    UnknownFunction(u64),

    /// No function entry in any unit carries this name.
    #[error("no function named {0}")]
    NoSuchFunction(String),

    /// No line-table row covers the address (DWARF address space).
    #[error("no line table entry for address {0:#x}")]
    UnknownLineEntry(u64),

    #[error("no breakpoint at address {0:#x}")]
    BreakpointNotFound(u64),

    /// An OS process-control call failed.
    #[error("{op} failed: {source}")]
    ProcessIo {
        op: &'static str,
        #[source]
        source: Errno,
    },

    #[error("malformed debug info: {0}")]
    MalformedDebugInfo(String),

    /// The traced process could not be created or could not exec the target.
    #[error("failed to start {}: {source}", path.display())]
    Launch {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    /// Inferior-directed call after the traced process went away.
    #[error("the process is not running")]
    ProcessExited,

    /// Front-end command text that could not be understood.
    #[error("{0}")]
    Parse(String),
}

impl DebugError {
    /// Adapter for `map_err` on raw `nix` results.
    pub fn io(op: &'static str) -> impl FnOnce(Errno) -> DebugError {
        move |source| DebugError::ProcessIo { op, source }
    }
}

impl From<gimli::Error> for DebugError {
    fn from(e: gimli::Error) -> Self {
        DebugError::MalformedDebugInfo(e.to_string())
    }
}

impl From<object::read::Error> for DebugError {
    fn from(e: object::read::Error) -> Self {
        DebugError::MalformedDebugInfo(e.to_string())
    }
}
