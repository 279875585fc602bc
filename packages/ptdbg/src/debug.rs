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

//! Logger setup. Diagnostics go to stderr or a file, never to stdout.

use std::path::PathBuf;

use flexi_logger::{detailed_format, Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle};

const DEFAULT_LEVEL: &str = "warn";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// Explicit log specification, e.g. `info` or `ptdbg::stepping=trace`.
    pub level: Option<String>,
    pub file: Option<PathBuf>,
    /// Shorthand for `--log-level debug`
    pub debug: bool,
}

impl LogOptions {
    /// The explicit specification, if any. `RUST_LOG` applies otherwise.
    fn spec(&self) -> Option<&str> {
        if self.debug {
            Some("debug")
        } else {
            self.level.as_deref()
        }
    }
}

/// Start the global logger. Keep the handle alive for the whole run.
pub fn init_logging(opts: &LogOptions) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = match opts.spec() {
        Some(spec) => Logger::try_with_str(spec)?,
        None => Logger::try_with_env_or_str(DEFAULT_LEVEL)?,
    };
    let logger = match opts.file {
        Some(ref path) => logger
            .log_to_file(FileSpec::try_from(path)?)
            .duplicate_to_stderr(Duplicate::Warn),
        None => logger.log_to_stderr(),
    };
    logger.format(detailed_format).start()
}
