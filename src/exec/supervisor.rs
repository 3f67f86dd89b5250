//! Process Supervisor
//!
//! Executes a validated command (or an allowlisted task's argument vector)
//! as a child process, captures interleaved stdout+stderr, enforces a
//! wall-clock timeout, and guarantees the child is reaped under every exit
//! path: success, non-zero exit, timeout, spawn failure.

use super::validator::{validate, Verdict};
use crate::metrics;
use crate::tasks;
use serde::Serialize;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reserved exit code reported when the child was killed on timeout.
pub const EXIT_KILLED: i32 = -2;

/// Reserved exit code for abnormal termination (killed by another signal).
pub const EXIT_ABNORMAL: i32 = -1;

/// Exit status of a child whose program could not be executed. Matches the
/// shell's own convention for "command not found".
pub const EXIT_EXEC_FAILED: i32 = 127;

/// Maximum length of a free-form command, in characters.
pub const MAX_COMMAND_LEN: usize = 4096;

/// Default timeout for free-form commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

/// Default timeout for allowlisted tasks; these are known-fast
/// system-info queries.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(8);

// Grace window for draining pipe bytes still buffered after the child has
// been reaped. Bounded so a grandchild holding the write end cannot hang
// the request.
const DRAIN_GRACE: Duration = Duration::from_millis(50);

/// The outcome of one execution attempt.
///
/// Exactly one of two shapes holds: `accepted == true` with a well-formed
/// `exit_code`/`timed_out`/`output`, or `accepted == false` with a
/// non-empty `failure_reason`. The constructors below are the only way a
/// result is built, so the invariant cannot be violated piecemeal.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// False if the command never reached the OS (validation or
    /// resource-allocation failure).
    pub accepted: bool,

    /// Real exit status, or [`EXIT_KILLED`] / [`EXIT_ABNORMAL`].
    pub exit_code: i32,

    /// Whether the child was killed at the deadline.
    pub timed_out: bool,

    /// Interleaved stdout+stderr captured up to completion or kill,
    /// lossily decoded as UTF-8.
    pub output: String,

    /// Populated only when `accepted` is false.
    pub failure_reason: Option<String>,
}

impl ExecutionResult {
    /// The command never reached the OS.
    fn rejected(reason: impl Into<String>) -> Self {
        Self {
            accepted: false,
            exit_code: EXIT_ABNORMAL,
            timed_out: false,
            output: String::new(),
            failure_reason: Some(reason.into()),
        }
    }

    /// The child ran to completion (any exit status, including non-zero).
    fn completed(exit_code: i32, output: String) -> Self {
        Self {
            accepted: true,
            exit_code,
            timed_out: false,
            output,
            failure_reason: None,
        }
    }

    /// The child was killed at the deadline; partial output is kept.
    fn killed(output: String) -> Self {
        Self {
            accepted: true,
            exit_code: EXIT_KILLED,
            timed_out: true,
            output,
            failure_reason: None,
        }
    }
}

/// Execute a free-form command through the shell with a bounded timeout.
///
/// The command is passed to `/bin/bash -lc` as a single string argument,
/// never as caller-controlled argv, so the caller cannot smuggle extra
/// arguments to the interpreter itself. Preconditions checked before
/// anything is spawned: trimmed non-empty, length within
/// [`MAX_COMMAND_LEN`], and the denylist must allow it.
pub async fn execute(command: &str, timeout: Duration) -> ExecutionResult {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return reject("command", "empty command");
    }
    if trimmed.len() > MAX_COMMAND_LEN {
        return reject("command", "command too long (max 4096 chars)");
    }

    if let Verdict::Blocked(reason) = validate(trimmed) {
        warn!(reason, "blocked command");
        metrics::COMMANDS_BLOCKED_TOTAL
            .with_label_values(&[reason])
            .inc();
        return reject("command", format!("blocked command: {reason}"));
    }

    let mut cmd = Command::new("/bin/bash");
    cmd.arg("-lc").arg(trimmed);
    run_supervised("command", cmd, timeout).await
}

/// Execute an allowlisted task by name with a bounded timeout.
///
/// Tasks run directly via their fixed, pre-defined argument vector with no
/// shell interpretation, so no denylist pass is needed. Unknown names are
/// rejected without spawning anything.
pub async fn execute_task(name: &str, timeout: Duration) -> ExecutionResult {
    let Some(argv) = tasks::lookup(name) else {
        return reject("task", "task not allowed");
    };

    let mut cmd = Command::new(argv[0]);
    cmd.args(&argv[1..]);
    run_supervised("task", cmd, timeout).await
}

fn reject(mode: &str, reason: impl Into<String>) -> ExecutionResult {
    metrics::EXECUTIONS_TOTAL
        .with_label_values(&[mode, "rejected"])
        .inc();
    ExecutionResult::rejected(reason)
}

/// Spawn the prepared command and supervise it to completion or deadline.
///
/// Instead of the classic non-blocking poll loop (read pipe, `WNOHANG`
/// wait, sleep, repeat), this waits on readiness: both pipes and the
/// child's exit are awaited concurrently together with the deadline. The
/// external timing semantics are identical: the call returns within the
/// timeout plus a small bounded drain window.
async fn run_supervised(mode: &str, mut cmd: Command, timeout: Duration) -> ExecutionResult {
    let exec_id = Uuid::new_v4();
    let started = Instant::now();

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // The service ran but the target program was missing. Surface
            // this as a normal non-zero exit, not a supervisor failure, so
            // callers can tell the two apart.
            info!(%exec_id, mode, "program not found, reporting exit {}", EXIT_EXEC_FAILED);
            return finish(
                mode,
                started,
                ExecutionResult::completed(EXIT_EXEC_FAILED, String::new()),
            );
        }
        Err(err) => {
            warn!(%exec_id, mode, error = %err, "spawn failed");
            return reject(mode, format!("spawn failed: {err}"));
        }
    };

    let (Some(mut stdout), Some(mut stderr)) = (child.stdout.take(), child.stderr.take()) else {
        // Both streams were requested piped above; missing handles mean the
        // output channel could not be allocated.
        let _ = child.start_kill();
        let _ = child.wait().await;
        return reject(mode, "output pipe setup failed");
    };

    debug!(%exec_id, mode, timeout_secs = timeout.as_secs(), "child spawned");

    let deadline = started + timeout;
    let mut output: Vec<u8> = Vec::new();
    let mut stdout_open = true;
    let mut stderr_open = true;
    let mut timed_out = false;
    let mut out_buf = [0u8; 4096];
    let mut err_buf = [0u8; 4096];

    // Append pipe bytes in arrival order until the child exits or the
    // deadline fires. `Child::wait` and `AsyncReadExt::read` are both
    // cancel-safe, so losing a race here drops no data.
    let wait_result = loop {
        tokio::select! {
            read = stdout.read(&mut out_buf), if stdout_open => match read {
                Ok(0) | Err(_) => stdout_open = false,
                Ok(n) => output.extend_from_slice(&out_buf[..n]),
            },
            read = stderr.read(&mut err_buf), if stderr_open => match read {
                Ok(0) | Err(_) => stderr_open = false,
                Ok(n) => output.extend_from_slice(&err_buf[..n]),
            },
            status = child.wait() => break status,
            _ = tokio::time::sleep_until(deadline) => {
                timed_out = true;
                break Err(io::Error::new(io::ErrorKind::TimedOut, "deadline elapsed"));
            }
        }
    };

    if timed_out {
        warn!(%exec_id, mode, "deadline elapsed, killing child");
        let _ = child.start_kill();
        // Blocking reap; SIGKILL cannot be ignored so this returns
        // promptly. Reaches the immediate child only; descendants it
        // forked are not signalled.
        let _ = child.wait().await;
    }

    // Drain whatever is still buffered in the pipes. Bounded reads rather
    // than read-to-EOF: a grandchild may still hold the write end open.
    if stdout_open {
        drain(&mut stdout, &mut output).await;
    }
    if stderr_open {
        drain(&mut stderr, &mut output).await;
    }

    let output = String::from_utf8_lossy(&output).into_owned();

    if timed_out {
        return finish(mode, started, ExecutionResult::killed(output));
    }

    let exit_code = match wait_result {
        // Normal termination carries a code; termination by signal does not.
        Ok(status) => status.code().unwrap_or(EXIT_ABNORMAL),
        Err(err) => {
            warn!(%exec_id, mode, error = %err, "wait failed");
            EXIT_ABNORMAL
        }
    };

    info!(%exec_id, mode, exit_code, bytes = output.len(), "child reaped");
    finish(mode, started, ExecutionResult::completed(exit_code, output))
}

/// Record outcome metrics and pass the result through.
fn finish(mode: &str, started: Instant, result: ExecutionResult) -> ExecutionResult {
    let outcome = if result.timed_out {
        "timed_out"
    } else {
        "completed"
    };
    metrics::EXECUTIONS_TOTAL
        .with_label_values(&[mode, outcome])
        .inc();
    metrics::EXECUTION_DURATION_SECONDS
        .with_label_values(&[mode])
        .observe(started.elapsed().as_secs_f64());
    result
}

/// Read remaining buffered bytes with short bounded attempts until the pipe
/// is empty, closed, or goes quiet.
async fn drain(pipe: &mut (impl AsyncRead + Unpin), sink: &mut Vec<u8>) {
    let mut buf = [0u8; 4096];
    loop {
        match tokio::time::timeout(DRAIN_GRACE, pipe.read(&mut buf)).await {
            Ok(Ok(n)) if n > 0 => sink.extend_from_slice(&buf[..n]),
            _ => break,
        }
    }
}
