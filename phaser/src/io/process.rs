//! Helpers for running the agent process and capturing its combined output.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How often the wait loop checks the interrupt flag.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    /// Combined stdout and stderr, in the order the child wrote them.
    pub output: Vec<u8>,
    pub interrupted: bool,
}

impl CommandOutput {
    pub fn output_lossy(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

/// Run `cmd` to completion with stdout and stderr redirected into one
/// anonymous temporary file, then read the file back.
///
/// There is no timeout. When `interrupt` becomes true the child is killed and
/// the output captured so far is returned with `interrupted` set. The capture
/// file is unlinked on creation and released on every return path.
#[instrument(skip_all, fields(stdin = stdin.is_some()))]
pub fn run_command_captured(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    interrupt: &Arc<AtomicBool>,
) -> Result<CommandOutput> {
    let mut capture = tempfile::tempfile().context("create capture file")?;
    let stdout = capture.try_clone().context("clone capture handle")?;
    let stderr = capture.try_clone().context("clone capture handle")?;

    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::from(stdout)).stderr(Stdio::from(stderr));

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        if let Err(err) = child_stdin.write_all(input) {
            // The child may exit without reading its input; its exit status tells the story.
            warn!(err = %err, "failed to write stdin");
        }
    }

    let mut interrupted = false;
    let status = loop {
        if let Some(status) = child.wait_timeout(POLL_INTERVAL).context("wait for command")? {
            break status;
        }
        if interrupt.load(Ordering::SeqCst) {
            warn!("interrupt received, killing child");
            interrupted = true;
            // The child may already have exited from the same signal.
            if let Err(err) = child.kill() {
                debug!(err = %err, "kill after interrupt failed");
            }
            break child.wait().context("wait command after kill")?;
        }
    };
    interrupted |= interrupt.load(Ordering::SeqCst);

    let output = read_capture(&mut capture)?;
    debug!(exit_code = ?status.code(), interrupted, bytes = output.len(), "command finished");
    Ok(CommandOutput {
        status,
        output,
        interrupted,
    })
}

fn read_capture(file: &mut File) -> Result<Vec<u8>> {
    file.flush().context("flush capture file")?;
    file.seek(SeekFrom::Start(0))
        .context("rewind capture file")?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf).context("read capture file")?;
    Ok(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    #[test]
    fn captures_stdout_and_stderr_together() {
        let flag = Arc::new(AtomicBool::new(false));
        let output =
            run_command_captured(sh("echo out; echo err 1>&2; echo done"), None, &flag)
                .expect("run");
        assert!(output.status.success());
        assert_eq!(output.output_lossy(), "out\nerr\ndone\n");
        assert!(!output.interrupted);
    }

    #[test]
    fn feeds_stdin_to_child() {
        let flag = Arc::new(AtomicBool::new(false));
        let output = run_command_captured(sh("cat"), Some(b"prompt text"), &flag).expect("run");
        assert_eq!(output.output_lossy(), "prompt text");
    }

    #[test]
    fn reports_non_zero_exit() {
        let flag = Arc::new(AtomicBool::new(false));
        let output = run_command_captured(sh("echo nope; exit 3"), None, &flag).expect("run");
        assert_eq!(output.status.code(), Some(3));
    }

    #[test]
    fn interrupt_flag_kills_child() {
        let flag = Arc::new(AtomicBool::new(true));
        let output = run_command_captured(sh("sleep 30"), None, &flag).expect("run");
        assert!(output.interrupted);
    }

    #[test]
    fn missing_program_is_an_error() {
        let flag = Arc::new(AtomicBool::new(false));
        let err = run_command_captured(Command::new("/nonexistent/agent"), None, &flag)
            .expect_err("spawn should fail");
        assert!(format!("{err:#}").contains("spawn command"));
    }
}
