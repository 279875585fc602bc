// Crate root: declare modules and control visibility

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
compile_error!("ptdbg only supports x86-64 Linux");

pub mod breakpoint;
pub mod commands;
pub mod debug;
pub mod dwarf;
pub mod elf_items;
pub mod error;
pub mod memory;
pub mod process;
pub mod registers;
pub mod request_handler;
pub mod session;
pub mod signals;
pub mod source_view;
pub mod stepping;
pub mod symbols;
pub mod utils;

// Re-export commonly used API from the library for binaries/tests
pub use error::{DebugError, Result};
pub use process::{Inferior, Tracee};
pub use session::{Session, SessionConfig};
pub use signals::{SourceDisplay, StopEvent};
