//! Command execution: templates, tokenization, recorders and the
//! subprocess runtime.
//!
//! The chain for one request is render, tokenize, spawn. A
//! [`CommandTemplate`] renders the argument bag into a command-line
//! string, [`tokenize`] splits it into an argv, and the
//! [`CommandExecutor`] runs that argv with stdout routed into a
//! [`ResultRecorder`].

pub mod executor;
pub mod exit_code;
pub mod recorder;
pub mod template;
pub mod tokenizer;

pub use executor::{CommandExecutor, ExecError, ExecutionError};
pub use exit_code::exit_code_message;
pub use recorder::{MemoryRecorder, ResultRecorder, TempFileRecorder};
pub use template::CommandTemplate;
pub use tokenizer::tokenize;

use std::io;

use tempfile::NamedTempFile;

/// Prefix for every temp file the gateway creates.
pub const TEMP_FILE_PREFIX: &str = "pycliw-";

/// Create a temp file in the OS temp directory with the gateway prefix.
pub fn new_temp_file() -> io::Result<NamedTempFile> {
    tempfile::Builder::new().prefix(TEMP_FILE_PREFIX).tempfile()
}
