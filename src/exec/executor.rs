//! Subprocess execution with captured stderr and streamed stdout.

use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Command, Stdio};
use std::thread;

use thiserror::Error;
use tracing::debug;

use crate::model::Arguments;

use super::exit_code::exit_code_message;
use super::template::CommandTemplate;

/// Failure of a launched process, carrying its exit code and whatever
/// it wrote to stderr.
#[derive(Debug)]
pub struct ExecutionError {
    pub exit_code: i32,
    pub stderr: Vec<u8>,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.stderr.is_empty() {
            f.write_str(&exit_code_message(self.exit_code))
        } else {
            f.write_str(&String::from_utf8_lossy(&self.stderr))
        }
    }
}

impl std::error::Error for ExecutionError {}

/// Errors from rendering or running a command.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("invalid command-line template")]
    InvalidTemplate,
    #[error(transparent)]
    Render(#[from] minijinja::Error),
    #[error(transparent)]
    Process(#[from] ExecutionError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Executes a command template against an argument bag.
///
/// The rendered argv is spawned directly (no shell), with stdin closed,
/// stdout streamed into the given writer and stderr captured for error
/// reporting. The child inherits the parent environment. `execute`
/// blocks until the process exits.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    template: CommandTemplate,
}

impl CommandExecutor {
    pub fn new(template: CommandTemplate) -> Self {
        Self { template }
    }

    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }

    pub fn execute<W: Write + ?Sized>(
        &self,
        args: &Arguments,
        output: &mut W,
    ) -> Result<(), ExecError> {
        let argv = self.template.render_argv(args)?;
        let Some((program, rest)) = argv.split_first() else {
            return Err(ExecError::InvalidTemplate);
        };

        debug!(template = %self.template.name(), program = %program, "spawning subprocess");

        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Drain stderr on a helper thread so a chatty process cannot
        // fill the pipe and deadlock against the stdout copy.
        let stderr_drain = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                buf
            })
        });

        let copy_result = match child.stdout.take() {
            Some(mut pipe) => io::copy(&mut pipe, output).map(|_| ()),
            None => Ok(()),
        };

        let status = child.wait()?;
        let stderr = stderr_drain
            .map(|drain| drain.join().unwrap_or_default())
            .unwrap_or_default();

        if !status.success() {
            let exit_code = status.code().unwrap_or(-1);
            debug!(exit_code, "subprocess failed");
            return Err(ExecutionError { exit_code, stderr }.into());
        }
        copy_result?;

        debug!(template = %self.template.name(), "subprocess completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::recorder::{MemoryRecorder, ResultRecorder, TempFileRecorder};
    use crate::model::Value;
    use std::collections::HashMap;

    fn message_args() -> Arguments {
        let mut args = HashMap::new();
        args.insert("message".to_string(), Value::Str("Hello, world!".into()));
        args
    }

    fn replay(recorder: &mut dyn ResultRecorder) -> String {
        let mut out = Vec::new();
        recorder.write_to(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_echo_into_memory_recorder() {
        let template = CommandTemplate::new("echo", "echo \"{{ message }}\"").unwrap();
        let executor = CommandExecutor::new(template);
        let mut recorder = MemoryRecorder::new();
        executor.execute(&message_args(), &mut recorder).unwrap();
        assert_eq!(replay(&mut recorder), "Hello, world!\n");
        recorder.close().unwrap();
    }

    #[test]
    fn test_echo_into_temp_file_recorder() {
        let template = CommandTemplate::new("echo", "echo {{ message }}").unwrap();
        let executor = CommandExecutor::new(template);
        let mut recorder = TempFileRecorder::new(true).unwrap();
        executor.execute(&message_args(), &mut recorder).unwrap();
        assert_eq!(replay(&mut recorder), "Hello, world!\n");
        assert_eq!(recorder.len(), "Hello, world!\n".len());
        recorder.close().unwrap();
    }

    #[test]
    fn test_failing_process_reports_exit_code_and_stderr() {
        let template =
            CommandTemplate::auto_named("sh -c 'echo nope >&2; exit 3'").unwrap();
        let executor = CommandExecutor::new(template);
        let mut recorder = MemoryRecorder::new();
        let err = executor
            .execute(&HashMap::new(), &mut recorder)
            .unwrap_err();
        match err {
            ExecError::Process(e) => {
                assert_eq!(e.exit_code, 3);
                assert_eq!(e.to_string(), "nope\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_silent_failure_falls_back_to_exit_code_text() {
        let template = CommandTemplate::auto_named("sh -c 'exit 5'").unwrap();
        let executor = CommandExecutor::new(template);
        let mut recorder = MemoryRecorder::new();
        let err = executor
            .execute(&HashMap::new(), &mut recorder)
            .unwrap_err();
        match err {
            ExecError::Process(e) => {
                assert_eq!(e.exit_code, 5);
                assert_eq!(e.to_string(), exit_code_message(5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_rendered_command_is_invalid() {
        let template = CommandTemplate::new("empty", "{{ missing }}").unwrap();
        let executor = CommandExecutor::new(template);
        let mut recorder = MemoryRecorder::new();
        assert!(matches!(
            executor.execute(&HashMap::new(), &mut recorder),
            Err(ExecError::InvalidTemplate)
        ));
    }

    #[test]
    fn test_missing_program_is_io_error() {
        let template =
            CommandTemplate::auto_named("definitely-not-a-real-binary-xyz").unwrap();
        let executor = CommandExecutor::new(template);
        let mut recorder = MemoryRecorder::new();
        assert!(matches!(
            executor.execute(&HashMap::new(), &mut recorder),
            Err(ExecError::Io(_))
        ));
    }
}
