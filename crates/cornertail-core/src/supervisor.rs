//! Process supervisor for the single tailed command.
//!
//! Launches `<shell> -c <command line>` and streams its stdout/stderr as
//! [`ProcessEvent`]s over an unbounded channel. The consumer drains events
//! with [`ProcessSupervisor::try_next_event`] (event loop) or
//! [`ProcessSupervisor::next_event`] (async), which also advances the
//! supervisor state when the exit is observed.
//!
//! ```text
//! NotStarted --start()--> Running --exit--> Finished
//!     |                      |                 |
//!     +--spawn error--> Failed    terminate()--+--> Terminated
//! ```

use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_SHELL, TERMINATE_GRACE};
use crate::decode::StreamDecoder;

/// Tag applied to stderr chunks in the output buffer.
pub const ERROR_TAG: &str = "ERROR";

/// Bytes requested per pipe read.
const READ_CHUNK_BYTES: usize = 4096;

/// How long output may trail the child's exit before `Exited` is sent anyway.
const DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Line ingested when the child exits.
pub fn exit_notice(code: i32) -> String {
    format!("\n[Process finished: exit code {code}]")
}

/// Line ingested (tagged [`ERROR_TAG`]) when the command cannot be launched.
pub fn launch_failure_line(error: &str) -> String {
    format!("Failed to launch command: {error}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl OutputStream {
    /// Buffer tag for chunks from this stream.
    pub fn tag(self) -> Option<&'static str> {
        match self {
            OutputStream::Stdout => None,
            OutputStream::Stderr => Some(ERROR_TAG),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessEvent {
    /// Decoded text read from one of the child's streams.
    Output { stream: OutputStream, text: String },
    /// The child exited. Sent once its pending output was delivered, or after
    /// a short drain timeout when background jobs keep the pipes open. `-1`
    /// when killed by a signal.
    Exited { code: i32 },
}

pub type ProcessEventSender = mpsc::UnboundedSender<ProcessEvent>;
pub type ProcessEventReceiver = mpsc::UnboundedReceiver<ProcessEvent>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running { pid: Option<u32> },
    Finished { code: i32 },
    Terminated,
    /// The command could not be launched. Inert; no retries.
    Failed { error: String },
}

impl ProcessState {
    pub fn is_running(&self) -> bool {
        matches!(self, ProcessState::Running { .. })
    }
}

/// Owns the child process and its event channel.
pub struct ProcessSupervisor {
    shell: String,
    grace: Duration,
    state: ProcessState,
    /// Taken on start so the channel closes once the child's tasks finish.
    events_tx: Option<ProcessEventSender>,
    events_rx: ProcessEventReceiver,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Default for ProcessSupervisor {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

impl ProcessSupervisor {
    pub fn new(shell: impl Into<String>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            shell: shell.into(),
            grace: TERMINATE_GRACE,
            state: ProcessState::NotStarted,
            events_tx: Some(events_tx),
            events_rx,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    /// Overrides how long `terminate()` waits before force-killing.
    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    /// Launches the command. Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// Returns an error if the supervisor was already started or the shell
    /// could not be spawned. A spawn failure leaves the supervisor in
    /// [`ProcessState::Failed`].
    pub fn start(&mut self, command_line: &str) -> Result<()> {
        if !matches!(self.state, ProcessState::NotStarted) {
            bail!("Process already started (state: {:?})", self.state);
        }

        match self.spawn(command_line) {
            Ok(pid) => {
                info!(pid, shell = %self.shell, command = command_line, "process started");
                self.state = ProcessState::Running { pid };
                Ok(())
            }
            Err(err) => {
                warn!(shell = %self.shell, command = command_line, error = %format!("{err:#}"), "launch failed");
                self.state = ProcessState::Failed {
                    error: format!("{err:#}"),
                };
                Err(err)
            }
        }
    }

    fn spawn(&mut self, command_line: &str) -> Result<Option<u32>> {
        let mut command = Command::new(&self.shell);
        command
            .arg("-c")
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group so terminate() reaches the whole pipeline.
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to spawn '{}'", self.shell))?;

        let pid = child.id();
        let stdout = child.stdout.take().context("Child stdout was not captured")?;
        let stderr = child.stderr.take().context("Child stderr was not captured")?;
        let events_tx = self
            .events_tx
            .take()
            .context("Process event channel already in use")?;

        let stdout_task = tokio::spawn(pump(stdout, OutputStream::Stdout, events_tx.clone()));
        let stderr_task = tokio::spawn(pump(stderr, OutputStream::Stderr, events_tx.clone()));

        let handles = ChildHandles {
            child,
            pid,
            readers: vec![stdout_task, stderr_task],
        };
        self.task = Some(tokio::spawn(supervise(
            handles,
            events_tx,
            self.cancel.clone(),
            self.grace,
        )));

        Ok(pid)
    }

    /// Returns the next pending event without waiting.
    pub fn try_next_event(&mut self) -> Option<ProcessEvent> {
        let event = self.events_rx.try_recv().ok()?;
        self.observe(&event);
        Some(event)
    }

    /// Waits for the next event. Returns `None` once the child's tasks have
    /// finished and every event was consumed, or if the process never started.
    pub async fn next_event(&mut self) -> Option<ProcessEvent> {
        if self.events_tx.is_some() {
            // Not started: nothing will ever arrive.
            return self.try_next_event();
        }
        let event = self.events_rx.recv().await?;
        self.observe(&event);
        Some(event)
    }

    fn observe(&mut self, event: &ProcessEvent) {
        if let ProcessEvent::Exited { code } = event
            && self.state.is_running()
        {
            debug!(code, "process finished");
            self.state = ProcessState::Finished { code: *code };
        }
    }

    /// Stops the child: SIGTERM to its process group, a bounded wait, then
    /// SIGKILL. No-op unless the process is running or finished.
    pub async fn terminate(&mut self) {
        if !matches!(
            self.state,
            ProcessState::Running { .. } | ProcessState::Finished { .. }
        ) {
            return;
        }

        self.cancel.cancel();
        if let Some(task) = self.task.take()
            && let Err(err) = task.await
        {
            warn!(error = %err, "supervisor task failed");
        }
        info!("process terminated");
        self.state = ProcessState::Terminated;
    }
}

struct ChildHandles {
    child: Child,
    pid: Option<u32>,
    readers: Vec<JoinHandle<()>>,
}

/// Waits for exit, or shuts the child down on cancellation.
///
/// After the exit, output already in the pipes gets [`DRAIN_TIMEOUT`] to
/// arrive before `Exited` is sent. Background jobs that inherited the pipes
/// keep streaming afterwards until they close them or the supervisor is
/// terminated.
async fn supervise(
    handles: ChildHandles,
    events_tx: ProcessEventSender,
    cancel: CancellationToken,
    grace: Duration,
) {
    let ChildHandles {
        mut child,
        pid,
        mut readers,
    } = handles;

    let code = tokio::select! {
        code = wait_for_exit(&mut child) => code,
        () = cancel.cancelled() => {
            shutdown(&mut child, pid, grace).await;
            abort_readers(&readers);
            return;
        }
    };

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, join_readers(&mut readers))
        .await
        .is_ok();
    let _ = events_tx.send(ProcessEvent::Exited { code });
    drop(events_tx);
    if drained {
        return;
    }

    debug!("streams still open after exit");
    tokio::select! {
        () = join_readers(&mut readers) => {}
        () = cancel.cancelled() => {
            // The shell is gone; stop whatever still holds its pipes.
            #[cfg(unix)]
            signal_group(pid, libc::SIGTERM);
            abort_readers(&readers);
        }
    }
}

async fn wait_for_exit(child: &mut Child) -> i32 {
    match child.wait().await {
        Ok(status) => status.code().unwrap_or(-1),
        Err(err) => {
            warn!(error = %err, "failed to wait for child");
            -1
        }
    }
}

/// Awaits readers until all finished. Safe to cancel and call again.
async fn join_readers(readers: &mut Vec<JoinHandle<()>>) {
    while let Some(reader) = readers.last_mut() {
        let _ = reader.await;
        readers.pop();
    }
}

fn abort_readers(readers: &[JoinHandle<()>]) {
    for reader in readers {
        reader.abort();
    }
}

async fn shutdown(child: &mut Child, pid: Option<u32>, grace: Duration) {
    if !send_terminate(child, pid) {
        debug!("terminate signal not delivered; child likely gone");
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => debug!(?status, "child exited after terminate"),
        Ok(Err(err)) => warn!(error = %err, "failed to wait for child"),
        Err(_) => {
            warn!(grace_ms = grace.as_millis() as u64, "child ignored terminate; killing");
            force_kill(child, pid).await;
        }
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: libc::c_int) -> bool {
    let Some(pid) = pid else {
        return false;
    };
    // SAFETY: kill(2) on a negative pid signals the process group created at
    // spawn; it takes no pointers.
    unsafe { libc::kill(-(pid as libc::pid_t), signal) == 0 }
}

#[cfg(unix)]
fn send_terminate(_child: &mut Child, pid: Option<u32>) -> bool {
    signal_group(pid, libc::SIGTERM)
}

#[cfg(not(unix))]
fn send_terminate(child: &mut Child, _pid: Option<u32>) -> bool {
    child.start_kill().is_ok()
}

async fn force_kill(child: &mut Child, pid: Option<u32>) {
    #[cfg(unix)]
    signal_group(pid, libc::SIGKILL);
    #[cfg(not(unix))]
    let _ = pid;

    if let Err(err) = child.kill().await {
        warn!(error = %err, "failed to kill child");
    }
}

/// Reads one stream to EOF, forwarding decoded text.
async fn pump<R>(mut reader: R, stream: OutputStream, events_tx: ProcessEventSender)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = StreamDecoder::new();
    let mut buf = vec![0u8; READ_CHUNK_BYTES];

    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.push(&buf[..n]);
                if !text.is_empty()
                    && events_tx
                        .send(ProcessEvent::Output { stream, text })
                        .is_err()
                {
                    return;
                }
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => {
                warn!(?stream, error = %err, "read failed; treating stream as closed");
                break;
            }
        }
    }

    let rest = decoder.finish();
    if !rest.is_empty() {
        let _ = events_tx.send(ProcessEvent::Output { stream, text: rest });
    }
}
