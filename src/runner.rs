use std::io::Read;
use std::process::{Child, ExitStatus, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

#[cfg(unix)]
use std::sync::mpsc::{self, RecvTimeoutError};

use tracing::debug;

use crate::errors::BenchError;
use crate::interrupt::interrupt_requested;
use crate::runtime::SampleRuntime;
use crate::types::{RunFailure, RunResult, SampleDescriptor, SampleStatus};

pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// How often a pending sample checks for an interrupt. Exit is observed without polling on unix.
#[cfg(unix)]
const INTERRUPT_CHECK_INTERVAL: Duration = Duration::from_millis(20);

#[cfg(not(unix))]
const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Executes samples one at a time as isolated child processes.
pub struct ProcessRunner {
    runtime: Box<dyn SampleRuntime>,
    timeout: Duration,
    max_output_bytes: usize,
}

enum WaitOutcome {
    /// When the child became a zombie; it is still unreaped.
    Exited(Instant),
    TimedOut,
    Interrupted,
}

type CaptureHandle = JoinHandle<std::io::Result<(Vec<u8>, bool)>>;

impl ProcessRunner {
    pub fn new(runtime: Box<dyn SampleRuntime>, timeout: Duration) -> Self {
        Self {
            runtime,
            timeout,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_max_output_bytes(mut self, max_output_bytes: usize) -> Self {
        self.max_output_bytes = max_output_bytes;
        self
    }

    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one sample to completion or until the timeout elapses.
    ///
    /// Timeouts and non-zero exits come back as `Ok` with a failure status.
    /// Only a spawn/wait failure or an interrupt is an `Err`.
    pub fn run(&self, sample: &SampleDescriptor) -> Result<RunResult, BenchError> {
        let mut cmd = self.runtime.command(sample);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            cmd.process_group(0);
        }

        let program = cmd.get_program().to_string_lossy().to_string();
        debug!(sample = %sample.id, program = %program, runtime = self.runtime.name(), "spawning sample");

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| BenchError::SpawnFailed {
            program,
            sample: sample.id.clone(),
            source,
        })?;

        let cap = self.max_output_bytes;
        let stdout_thread = child
            .stdout
            .take()
            .map(|s| std::thread::spawn(move || read_to_end_capped(s, cap)));
        let stderr_thread = child
            .stderr
            .take()
            .map(|s| std::thread::spawn(move || read_to_end_capped(s, cap)));

        let waited = wait_for_exit(&mut child, start + self.timeout);
        let elapsed = match &waited {
            Ok(WaitOutcome::Exited(at)) => at.saturating_duration_since(start),
            _ => start.elapsed(),
        };

        // The unreaped child still holds its pid, so the group id cannot have been
        // reused. Anything the sample left running would hold the pipes open.
        kill_group(&mut child);
        let reaped = child.wait();

        let (stdout, stdout_truncated) = join_capture(stdout_thread);
        let (stderr, stderr_truncated) = join_capture(stderr_thread);

        let wait_err = |source: std::io::Error| BenchError::WaitFailed {
            sample: sample.id.clone(),
            source,
        };
        let status = match waited.map_err(wait_err)? {
            WaitOutcome::Exited(_) => status_from_exit(reaped.map_err(wait_err)?),
            WaitOutcome::TimedOut => SampleStatus::Failure(RunFailure::TimedOut),
            WaitOutcome::Interrupted => return Err(BenchError::Interrupted),
        };

        debug!(sample = %sample.id, elapsed_ms = elapsed.as_millis() as u64, status = status.as_str(), "sample finished");

        Ok(RunResult {
            sample_id: sample.id.clone(),
            elapsed,
            status,
            stdout,
            stderr,
            output_truncated: stdout_truncated || stderr_truncated,
        })
    }
}

/// Wait until the child exits, the deadline passes or an interrupt arrives.
///
/// The child is never reaped here. On timeout or interrupt its group is killed
/// and this returns once it has exited.
#[cfg(unix)]
fn wait_for_exit(child: &mut Child, deadline: Instant) -> std::io::Result<WaitOutcome> {
    let pid = child.id();
    let (tx, exited) = mpsc::channel();
    std::thread::spawn(move || {
        let _ = tx.send(wait_unreaped(pid));
    });

    let outcome = loop {
        let now = Instant::now();
        if now >= deadline {
            break WaitOutcome::TimedOut;
        }
        match exited.recv_timeout(INTERRUPT_CHECK_INTERVAL.min(deadline - now)) {
            Ok(at) => return at.map(WaitOutcome::Exited),
            Err(RecvTimeoutError::Timeout) if interrupt_requested() => break WaitOutcome::Interrupted,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                return Err(std::io::Error::other("exit watcher stopped"));
            }
        }
    };

    kill_group(child);
    let _ = exited.recv();
    Ok(outcome)
}

/// Block until `pid` exits, leaving it a zombie for the caller to reap.
#[cfg(unix)]
fn wait_unreaped(pid: u32) -> std::io::Result<Instant> {
    loop {
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let ret = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if ret == 0 {
            return Ok(Instant::now());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

#[cfg(not(unix))]
fn wait_for_exit(child: &mut Child, deadline: Instant) -> std::io::Result<WaitOutcome> {
    loop {
        if child.try_wait()?.is_some() {
            return Ok(WaitOutcome::Exited(Instant::now()));
        }
        if interrupt_requested() {
            kill_group(child);
            child.wait()?;
            return Ok(WaitOutcome::Interrupted);
        }
        let now = Instant::now();
        if now >= deadline {
            kill_group(child);
            child.wait()?;
            return Ok(WaitOutcome::TimedOut);
        }
        std::thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(unix)]
fn kill_group(child: &mut Child) {
    let ret = unsafe { libc::kill(-(child.id() as libc::pid_t), libc::SIGKILL) };
    if ret == -1 {
        let _ = child.kill();
    }
}

#[cfg(not(unix))]
fn kill_group(child: &mut Child) {
    let _ = child.kill();
}

fn status_from_exit(status: ExitStatus) -> SampleStatus {
    if status.success() {
        return SampleStatus::Success;
    }
    if let Some(code) = status.code() {
        return SampleStatus::Failure(RunFailure::NonZeroExit { code });
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt as _;
        if let Some(signal) = status.signal() {
            return SampleStatus::Failure(RunFailure::Signaled { signal });
        }
    }

    SampleStatus::Failure(RunFailure::NonZeroExit { code: -1 })
}

/// Read until EOF, keeping at most `cap` bytes. Keeps draining past the cap so the child never blocks.
pub(crate) fn read_to_end_capped<R: Read>(mut reader: R, cap: usize) -> std::io::Result<(Vec<u8>, bool)> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };

        let remaining = cap.saturating_sub(buf.len());
        if n <= remaining {
            buf.extend_from_slice(&chunk[..n]);
        } else {
            buf.extend_from_slice(&chunk[..remaining]);
            truncated = true;
        }
    }

    Ok((buf, truncated))
}

fn join_capture(handle: Option<CaptureHandle>) -> (String, bool) {
    match handle.map(|h| h.join()) {
        Some(Ok(Ok((bytes, truncated)))) => (String::from_utf8_lossy(&bytes).into_owned(), truncated),
        _ => (String::new(), false),
    }
}
