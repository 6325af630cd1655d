//! Process invoker: runs one engine process under a hard timeout.
//!
//! Both output streams are drained by their own tasks while the child
//! runs, so a chatty engine can never block on a full pipe. On Unix the
//! child leads its own process group and a timeout kills the whole group.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Cap on captured bytes per stream. Output beyond this is read and discarded.
const MAX_CAPTURE_BYTES: usize = 64 * 1024 * 1024;

/// How long to wait for the output drains after the child is gone.
const DEFAULT_DRAIN_GRACE: Duration = Duration::from_millis(500);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// One process to run.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Executable to start.
    pub program: PathBuf,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Bytes written to stdin before it is closed. `None` gives the child a
    /// null stdin.
    pub stdin: Option<Vec<u8>>,
    /// Hard deadline for the child to exit.
    pub timeout: Duration,
    /// Working directory.
    pub current_dir: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Grace period for the output drains after exit or kill.
    pub drain_grace: Duration,
}

impl Invocation {
    /// Run `program` with no arguments under `timeout`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdin: None,
            timeout,
            current_dir: None,
            env: Vec::new(),
            drain_grace: DEFAULT_DRAIN_GRACE,
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Feed `bytes` on stdin.
    #[must_use]
    pub fn stdin_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the drain grace period.
    #[must_use]
    pub fn drain_grace(mut self, grace: Duration) -> Self {
        self.drain_grace = grace;
        self
    }
}

/// How the process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitState {
    /// The process exited on its own. `code` is `None` when it was killed
    /// by a signal.
    Exited {
        /// Exit code.
        code: Option<i32>,
    },
    /// The deadline passed and the process was killed.
    TimedOut,
    /// The process could not be started.
    SpawnFailed {
        /// OS error text.
        message: String,
    },
}

/// Raw result of one invocation.
#[derive(Debug, Clone)]
pub struct Outcome {
    /// How the process ended.
    pub exit: ExitState,
    /// Captured stdout.
    pub stdout: Vec<u8>,
    /// Captured stderr.
    pub stderr: Vec<u8>,
    /// Wall-clock time from spawn to collection.
    pub duration: Duration,
    /// OS process id, if the process started.
    pub pid: Option<u32>,
}

impl Outcome {
    fn spawn_failed(message: String, started: Instant) -> Self {
        Self {
            exit: ExitState::SpawnFailed { message },
            stdout: Vec::new(),
            stderr: Vec::new(),
            duration: started.elapsed(),
            pid: None,
        }
    }

    /// Exit code, if the process exited normally.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self.exit {
            ExitState::Exited { code } => code,
            _ => None,
        }
    }
}

type Buffer = Arc<Mutex<Vec<u8>>>;

/// Run `invocation` to completion, timeout or spawn failure.
///
/// Never returns an error: every way the process can end is described by
/// the returned [`Outcome`].
pub async fn invoke(invocation: &Invocation) -> Outcome {
    let started = Instant::now();

    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args)
        .stdin(if invocation.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &invocation.current_dir {
        cmd.current_dir(dir);
    }
    for (key, value) in &invocation.env {
        cmd.env(key, value);
    }

    #[cfg(unix)]
    cmd.process_group(0);
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    debug!(
        program = %invocation.program.display(),
        args = ?invocation.args,
        timeout = ?invocation.timeout,
        "Spawning engine process"
    );

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(program = %invocation.program.display(), error = %e, "Failed to spawn engine process");
            return Outcome::spawn_failed(
                format!("failed to start {}: {e}", invocation.program.display()),
                started,
            );
        },
    };
    let pid = child.id();
    let mut group = GroupGuard { pid, armed: true };

    let stdout_buf: Buffer = Arc::default();
    let stderr_buf: Buffer = Arc::default();
    let mut stdout_task = child
        .stdout
        .take()
        .map(|s| tokio::spawn(drain(s, Arc::clone(&stdout_buf))));
    let mut stderr_task = child
        .stderr
        .take()
        .map(|s| tokio::spawn(drain(s, Arc::clone(&stderr_buf))));

    let stdin_task = match (child.stdin.take(), invocation.stdin.clone()) {
        (Some(mut pipe), Some(bytes)) => Some(tokio::spawn(async move {
            // The engine may exit without reading its input.
            if let Err(e) = pipe.write_all(&bytes).await {
                debug!(error = %e, "Engine closed stdin early");
            }
            let _ = pipe.shutdown().await;
        })),
        _ => None,
    };

    let exit = match tokio::time::timeout(invocation.timeout, child.wait()).await {
        Ok(Ok(status)) => ExitState::Exited {
            code: status.code(),
        },
        Ok(Err(e)) => {
            terminate(&mut child, pid).await;
            ExitState::SpawnFailed {
                message: format!("failed to wait for engine process: {e}"),
            }
        },
        Err(_) => {
            warn!(
                pid = ?pid,
                timeout = ?invocation.timeout,
                "Engine process timed out, killing process group"
            );
            terminate(&mut child, pid).await;
            ExitState::TimedOut
        },
    };

    if let Some(task) = stdin_task {
        task.abort();
    }

    let stdout_done = finish_drain(&mut stdout_task, invocation.drain_grace).await;
    let stderr_done = finish_drain(&mut stderr_task, invocation.drain_grace).await;
    if !(stdout_done && stderr_done) {
        debug!(pid = ?pid, "Output still held open after exit, killing leftover processes");
        kill_group(pid);
    }

    group.armed = false;

    let stdout = std::mem::take(&mut *stdout_buf.lock().await);
    let stderr = std::mem::take(&mut *stderr_buf.lock().await);
    let duration = started.elapsed();

    debug!(
        pid = ?pid,
        exit = ?exit,
        stdout_bytes = stdout.len(),
        stderr_bytes = stderr.len(),
        duration = ?duration,
        "Engine process finished"
    );

    Outcome {
        exit,
        stdout,
        stderr,
        duration,
        pid,
    }
}

async fn drain<R>(mut reader: R, buffer: Buffer)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                let mut buf = buffer.lock().await;
                let room = MAX_CAPTURE_BYTES.saturating_sub(buf.len());
                let take = n.min(room);
                if let Some(bytes) = chunk.get(..take) {
                    buf.extend_from_slice(bytes);
                }
            },
        }
    }
}

/// Wait up to `grace` for a drain task. Returns `false` if it had to be
/// aborted.
async fn finish_drain(task: &mut Option<JoinHandle<()>>, grace: Duration) -> bool {
    let Some(handle) = task.as_mut() else {
        return true;
    };
    if tokio::time::timeout(grace, &mut *handle).await.is_ok() {
        return true;
    }
    handle.abort();
    false
}

/// Kills the process group if the invocation future is dropped mid-run.
/// `kill_on_drop` alone only reaches the direct child.
struct GroupGuard {
    pid: Option<u32>,
    armed: bool,
}

impl Drop for GroupGuard {
    fn drop(&mut self) {
        if self.armed {
            kill_group(self.pid);
        }
    }
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_group(pid);
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "Engine process already gone");
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "Failed to reap engine process");
    }
}

#[cfg(unix)]
fn kill_group(pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(raw) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    if let Err(e) = killpg(Pid::from_raw(raw), Signal::SIGKILL) {
        debug!(pgid = raw, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> Invocation {
        Invocation::new("sh", timeout).arg("-c").arg(script)
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let outcome = invoke(&sh("echo hello", Duration::from_secs(5))).await;
        assert_eq!(outcome.exit, ExitState::Exited { code: Some(0) });
        assert_eq!(outcome.stdout, b"hello\n");
        assert!(outcome.stderr.is_empty());
        assert!(outcome.pid.is_some());
    }

    #[tokio::test]
    async fn test_nonzero_exit_with_stderr() {
        let outcome = invoke(&sh("echo boom >&2; exit 7", Duration::from_secs(5))).await;
        assert_eq!(outcome.exit_code(), Some(7));
        assert_eq!(outcome.stderr, b"boom\n");
    }

    #[tokio::test]
    async fn test_stdin_is_written_and_closed() {
        let inv = sh("cat", Duration::from_secs(5)).stdin_bytes(b"{\"a\":1}".to_vec());
        let outcome = invoke(&inv).await;
        assert_eq!(outcome.exit_code(), Some(0));
        assert_eq!(outcome.stdout, b"{\"a\":1}");
    }

    #[tokio::test]
    async fn test_stdin_ignored_by_child() {
        let payload = vec![b'x'; 1024 * 1024];
        let inv = sh("exit 0", Duration::from_secs(5)).stdin_bytes(payload);
        let outcome = invoke(&inv).await;
        assert_eq!(outcome.exit_code(), Some(0));
    }

    #[tokio::test]
    async fn test_large_output_does_not_block() {
        let inv = sh(
            "head -c 1048576 /dev/zero; head -c 1048576 /dev/zero >&2",
            Duration::from_secs(10),
        );
        let outcome = invoke(&inv).await;
        assert_eq!(outcome.exit_code(), Some(0));
        assert_eq!(outcome.stdout.len(), 1_048_576);
        assert_eq!(outcome.stderr.len(), 1_048_576);
    }

    #[tokio::test]
    async fn test_timeout_kills_process() {
        let inv = sh("echo started; sleep 30", Duration::from_millis(300));
        let outcome = invoke(&inv).await;
        assert_eq!(outcome.exit, ExitState::TimedOut);
        assert!(outcome.duration < Duration::from_secs(5));
        assert_eq!(outcome.stdout, b"started\n");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let inv = Invocation::new("/nonexistent/helio-engine", Duration::from_secs(1));
        let outcome = invoke(&inv).await;
        assert!(matches!(outcome.exit, ExitState::SpawnFailed { .. }));
        assert!(outcome.pid.is_none());
    }

    #[tokio::test]
    async fn test_leaked_grandchild_does_not_hang() {
        let inv = sh("sleep 30 & echo done", Duration::from_secs(10))
            .drain_grace(Duration::from_millis(200));
        let outcome = invoke(&inv).await;
        assert_eq!(outcome.exit_code(), Some(0));
        assert_eq!(outcome.stdout, b"done\n");
        assert!(outcome.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_env_and_current_dir() {
        let dir = tempfile::tempdir().unwrap();
        let inv = sh("echo \"$HELIO_TEST_VALUE\"; pwd -P", Duration::from_secs(5))
            .env("HELIO_TEST_VALUE", "forty-two")
            .current_dir(dir.path());
        let outcome = invoke(&inv).await;
        let text = String::from_utf8(outcome.stdout).unwrap();
        assert!(text.starts_with("forty-two\n"));
        let canonical = dir.path().canonicalize().unwrap();
        assert!(text.contains(canonical.to_str().unwrap()));
    }
}
