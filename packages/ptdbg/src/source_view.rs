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

use std::io::Write;

use log::warn;

use crate::signals::{SourceDisplay, StopEvent};

/// Prints stop reports and source excerpts to a writer, usually stdout.
pub struct SourcePrinter<W: Write> {
    out: W,
}

impl<W: Write> SourcePrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> SourceDisplay for SourcePrinter<W> {
    fn report(&mut self, event: &StopEvent) {
        if let Err(e) = writeln!(self.out, "{}", event) {
            warn!("cannot write stop report: {}", e);
        }
    }

    fn show(&mut self, path: &str, line: u64, context: usize) {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("cannot read {}: {}", path, e);
                return;
            }
        };
        if let Err(e) = self.out.write_all(excerpt(&text, line, context).as_bytes()) {
            warn!("cannot write source excerpt: {}", e);
        }
    }
}

/// `2 * context + 1` lines around `line` (1-based), `line` marked with `>`.
/// Near the top of the file the window slides down rather than shrinking.
pub fn excerpt(source: &str, line: u64, context: usize) -> String {
    let context = context as u64;
    let first = line.saturating_sub(context).max(1);
    let last = first + 2 * context;
    let mut out = String::new();
    for (number, text) in (1u64..).zip(source.lines()) {
        if number < first {
            continue;
        }
        if number > last {
            break;
        }
        out.push_str(if number == line { "> " } else { "  " });
        out.push_str(text);
        out.push('\n');
    }
    out
}
