//! Completion command invocation.
//!
//! The completion capability is any user-configured command that reads a
//! prompt on stdin and writes generated text to stdout (`llm`, `ollama run`,
//! a wrapper script). Delegating to a command keeps the engine free of
//! provider SDKs and API keys, and makes every test runnable against plain
//! shell utilities.
//!
//! Invocations carry a wall-clock budget; on deadline the child is killed
//! and the caller gets a distinct [`StepError::Timeout`] instead of a hung
//! chain.

use crate::error::StepError;
use anyhow::{anyhow, Context, Result};
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Poll interval for the deadline loop.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// A configured completion command with a wall-clock budget.
#[derive(Debug, Clone)]
pub struct CompletionCommand {
    argv: Vec<String>,
    timeout: Duration,
}

impl CompletionCommand {
    /// Parse a shell-style command string into an invocable command.
    pub fn new(command: &str, timeout: Duration) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse LM command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("LM command is empty"));
        }
        Ok(Self { argv, timeout })
    }

    /// Send a prompt and collect the generated text.
    pub fn complete(&self, prompt: &str) -> Result<String, StepError> {
        let start = Instant::now();
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| StepError::Completion(format!("spawn {}: {err}", self.argv[0])))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A dead child surfaces as a broken pipe here; the exit status
            // below carries the real diagnosis.
            let _ = stdin.write_all(prompt.as_bytes());
        }
        let stdout_reader = drain(child.stdout.take());
        let stderr_reader = drain(child.stderr.take());

        let status = self.wait_with_deadline(&mut child, start)?;
        let stdout = join_reader(stdout_reader)?;
        let stderr = join_reader(stderr_reader)?;

        tracing::info!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            prompt_bytes = prompt.len(),
            response_bytes = stdout.len(),
            "completion finished"
        );

        if !status.success() {
            let detail = String::from_utf8_lossy(&stderr);
            return Err(StepError::Completion(format!(
                "LM command exited with {status}: {}",
                detail.trim()
            )));
        }

        String::from_utf8(stdout)
            .map_err(|err| StepError::Completion(format!("decode LM stdout as UTF-8: {err}")))
    }

    fn wait_with_deadline(
        &self,
        child: &mut Child,
        start: Instant,
    ) -> Result<std::process::ExitStatus, StepError> {
        let deadline = start + self.timeout;
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        return Err(StepError::Timeout(self.timeout));
                    }
                    thread::sleep(WAIT_POLL);
                }
                Err(err) => {
                    return Err(StepError::Completion(format!("wait for LM command: {err}")))
                }
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(source: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    source.map(|mut reader| {
        thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            buffer
        })
    })
}

fn join_reader(handle: Option<JoinHandle<Vec<u8>>>) -> Result<Vec<u8>, StepError> {
    match handle {
        Some(handle) => handle
            .join()
            .map_err(|_| StepError::Completion("output reader thread panicked".to_string())),
        None => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cat_echoes_the_prompt() {
        let command = CompletionCommand::new("cat", Duration::from_secs(5)).unwrap();
        let response = command.complete("hello chain").unwrap();
        assert_eq!(response, "hello chain");
    }

    #[test]
    fn timeout_kills_a_hung_command() {
        let command = CompletionCommand::new("sleep 5", Duration::from_millis(100)).unwrap();
        let started = Instant::now();
        let err = command.complete("ignored").unwrap_err();
        assert!(matches!(err, StepError::Timeout(_)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn nonzero_exit_surfaces_stderr() {
        let command =
            CompletionCommand::new("sh -c 'echo boom >&2; exit 3'", Duration::from_secs(5))
                .unwrap();
        let err = command.complete("ignored").unwrap_err();
        match err {
            StepError::Completion(detail) => assert!(detail.contains("boom"), "got: {detail}"),
            other => panic!("expected completion failure, got {other:?}"),
        }
    }

    #[test]
    fn empty_command_is_rejected_at_parse() {
        assert!(CompletionCommand::new("   ", Duration::from_secs(1)).is_err());
    }
}
