// SPDX-License-Identifier: MIT OR Apache-2.0
//! The lifecycle engine: builders, handles, supervision, and destruction.
//!
//! A [`ProcessBuilder`] assembles a spec with its injected collaborators
//! (host-info provider, transport, signal dispatcher) and `start()`s it.
//! Startup never returns an error: a failed launch yields a handle already
//! in the `Error` state whose stderr stream carries the failure text, so
//! callers that only consume streams and exit codes still see everything.

use crate::cancel::CancelToken;
use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::io::ProcessIo;
use crate::launch::{self, Created, HelperPaths, Launcher, STARTUP_FAILURE_EXIT, Waiter};
use crate::spec::ProcessSpec;
use crate::state::{ProcessState, StateCell};
use nexec_core::{
    ExecutionTarget, ExtendedInfoProvider, HostInfoProvider, LocalHostInfoProvider, ProcessInfoBag,
    ShellSignalDispatcher, Signal, SignalDispatcher, SignalError, first_extended_info,
};
use nexec_transport::ChannelTransport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Exit code recorded when the launch itself failed.
const STARTUP_FAILURE_CODE: i32 = -2;

/// Exit code recorded when the real result is unknowable (cancelled before
/// completion, signal-terminated, detached terminal session).
const UNKNOWN_EXIT_CODE: i32 = -1;

/// NTSTATUS a Windows child exits with when a required DLL is absent.
const STATUS_DLL_NOT_FOUND: i32 = 0xC000_0135_u32 as i32;

struct Inner {
    target: Arc<ExecutionTarget>,
    state: StateCell,
    pid: OnceLock<u32>,
    tty: OnceLock<String>,
    exit_code: Mutex<Option<i32>>,
    io: ProcessIo,
    info: ProcessInfoBag,
    cancel: CancelToken,
    destroyed: AtomicBool,
    dispatcher: Arc<dyn SignalDispatcher>,
    config: LifecycleConfig,
    launcher: Launcher,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Inner {
    /// First recorded exit code wins.
    fn record_exit(&self, code: i32) {
        let mut guard = match self.exit_code.lock() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        guard.get_or_insert(code);
    }

    fn exit_code(&self) -> Option<i32> {
        match self.exit_code.lock() {
            Ok(g) => *g,
            Err(p) => *p.into_inner(),
        }
    }

    /// Publish completion. State must already be terminal.
    fn mark_done(&self) {
        self.done_tx.send_replace(true);
    }
}

/// Handle to a launched (or failed-to-launch) native process.
///
/// Cheap to clone; all clones observe the same state machine, streams, and
/// exit code.
#[derive(Clone)]
pub struct NativeProcess {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for NativeProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeProcess")
            .field("target", &self.inner.target.to_key())
            .field("state", &self.inner.state.get())
            .field("pid", &self.inner.pid.get())
            .finish_non_exhaustive()
    }
}

impl NativeProcess {
    /// Where this process runs.
    pub fn target(&self) -> &Arc<ExecutionTarget> {
        &self.inner.target
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.inner.state.get()
    }

    /// Subscribe to state changes. After a terminal state the channel
    /// closes; late subscribers still observe the terminal value.
    pub fn subscribe(&self) -> watch::Receiver<ProcessState> {
        self.inner.state.subscribe()
    }

    /// PID of the underlying OS process.
    ///
    /// Fails with [`LifecycleError::PidUnavailable`] until startup
    /// completed; there is no placeholder value.
    pub fn pid(&self) -> Result<u32, LifecycleError> {
        self.inner.pid.get().copied().ok_or(LifecycleError::PidUnavailable)
    }

    /// TTY name of a pty-backed session, once discovered.
    pub fn tty(&self) -> Option<&str> {
        self.inner.tty.get().map(String::as_str)
    }

    /// Exit code, once the process is over. `-2` marks a startup failure,
    /// `-1` an unknowable result.
    pub fn exit_code(&self) -> Option<i32> {
        self.inner.exit_code()
    }

    /// The write-once fact bag attached to this handle.
    pub fn info(&self) -> &ProcessInfoBag {
        &self.inner.info
    }

    /// Take the stdin writer. Placeholder if startup failed.
    pub fn take_stdin(&self) -> crate::io::InputWriter {
        self.inner.io.take_stdin()
    }

    /// Take the stdout reader. Placeholder if startup failed.
    pub fn take_stdout(&self) -> crate::io::OutputReader {
        self.inner.io.take_stdout()
    }

    /// Take the stderr reader. Startup failures and one-shot diagnostics
    /// are appended to this stream.
    pub fn take_stderr(&self) -> crate::io::OutputReader {
        self.inner.io.take_stderr()
    }

    /// Block until the process is over; returns the exit code.
    pub async fn wait_for(&self) -> i32 {
        let mut rx = self.inner.done_rx.clone();
        // The sender lives in Inner, so this only fails if the runtime is
        // tearing down; fall through to whatever code was recorded.
        let _ = rx.wait_for(|done| *done).await;
        self.inner.exit_code().unwrap_or(UNKNOWN_EXIT_CODE)
    }

    /// Resume a process that was started suspended, by delivering SIGCONT.
    pub async fn resume(&self) -> Result<(), LifecycleError> {
        let pid = self.pid()?;
        self.inner
            .dispatcher
            .signal(&self.inner.target, pid, Signal::Cont)
            .await?;
        Ok(())
    }

    /// Graduated destruction: SIGTERM, a bounded grace wait, then SIGKILL.
    ///
    /// Idempotent; concurrent calls collapse into one protocol run.
    /// `Unsupported` from the dispatcher is swallowed, so targets without
    /// signal delivery still get their streams closed and state settled.
    pub async fn destroy(&self) {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(target: "nexec.lifecycle", target = %self.inner.target, "destroying process");
        self.inner.cancel.cancel();

        let wait = self.inner.launcher.pre_destroy_wait();
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        if self.inner.state.get().is_terminal() {
            return;
        }
        let Some(&pid) = self.inner.pid.get() else {
            // Startup has not discovered a PID; the tripped cancel token
            // aborts the bootstrap read and settles the state.
            return;
        };

        self.send_swallowing(pid, Signal::Term).await;
        let mut rx = self.inner.done_rx.clone();
        let graceful = tokio::time::timeout(self.inner.config.destroy_grace, rx.wait_for(|d| *d))
            .await
            .is_ok();
        if graceful {
            return;
        }
        warn!(target: "nexec.lifecycle", pid, "grace window elapsed, escalating to SIGKILL");
        self.send_swallowing(pid, Signal::Kill).await;
    }

    async fn send_swallowing(&self, pid: u32, signal: Signal) {
        match self
            .inner
            .dispatcher
            .signal(&self.inner.target, pid, signal)
            .await
        {
            Ok(()) => {}
            Err(SignalError::Unsupported) => {
                debug!(target: "nexec.lifecycle", pid, signal = %signal, "dispatcher does not support this target");
            }
            Err(err) => {
                debug!(target: "nexec.lifecycle", pid, signal = %signal, error = %err, "signal delivery failed");
            }
        }
    }
}

/// Assembles a [`ProcessSpec`] with its collaborators and launches it.
pub struct ProcessBuilder {
    spec: ProcessSpec,
    host_info: Arc<dyn HostInfoProvider>,
    transport: Option<Arc<dyn ChannelTransport>>,
    dispatcher: Arc<dyn SignalDispatcher>,
    helpers: HelperPaths,
    config: LifecycleConfig,
    ext_providers: Vec<Arc<dyn ExtendedInfoProvider>>,
}

impl ProcessBuilder {
    /// A builder with local defaults: local host probing, `kill(1)` signal
    /// delivery, no transport, no helpers.
    pub fn new(spec: ProcessSpec) -> Self {
        Self {
            spec,
            host_info: Arc::new(LocalHostInfoProvider),
            transport: None,
            dispatcher: Arc::new(ShellSignalDispatcher),
            helpers: HelperPaths::default(),
            config: LifecycleConfig::default(),
            ext_providers: Vec::new(),
        }
    }

    /// Replace the host-info provider.
    pub fn host_info_provider(mut self, provider: Arc<dyn HostInfoProvider>) -> Self {
        self.host_info = provider;
        self
    }

    /// Install a transport for remote targets.
    pub fn transport(mut self, transport: Arc<dyn ChannelTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the signal dispatcher.
    pub fn dispatcher(mut self, dispatcher: Arc<dyn SignalDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Configure helper binaries (pty helper, trampoline, terminal).
    pub fn helpers(mut self, helpers: HelperPaths) -> Self {
        self.helpers = helpers;
        self
    }

    /// Replace the timing configuration.
    pub fn config(mut self, config: LifecycleConfig) -> Self {
        self.config = config;
        self
    }

    /// Install the extended-info provider chain.
    pub fn extended_info_providers(
        mut self,
        providers: Vec<Arc<dyn ExtendedInfoProvider>>,
    ) -> Self {
        self.ext_providers = providers;
        self
    }

    /// Launch the process. Infallible by contract: any failure is folded
    /// into the returned handle's `Error` state and stderr stream.
    pub async fn start(self) -> NativeProcess {
        let target = self.spec.target().clone();
        let (done_tx, done_rx) = watch::channel(false);

        // The launcher is finalized below once host info is known; start
        // from the shell default so a failed probe still yields a handle.
        let mut inner = Inner {
            target: target.clone(),
            state: StateCell::new(),
            pid: OnceLock::new(),
            tty: OnceLock::new(),
            exit_code: Mutex::new(None),
            io: ProcessIo::new(),
            info: ProcessInfoBag::new(),
            cancel: CancelToken::new(),
            destroyed: AtomicBool::new(false),
            dispatcher: self.dispatcher.clone(),
            config: self.config.clone(),
            launcher: Launcher::LocalShell,
            done_tx,
            done_rx,
        };
        inner.state.set(ProcessState::Starting);

        let host = match self.host_info.host_info(&target).await {
            Ok(host) => host,
            Err(err) => {
                debug!(target: "nexec.lifecycle", %target, error = %err, "host probe failed");
                let process = NativeProcess {
                    inner: Arc::new(inner),
                };
                fail(
                    &process,
                    &LifecycleError::HostInfoUnavailable(target.to_key()),
                );
                return process;
            }
        };

        let launcher = Launcher::select(&self.spec, &host, &self.helpers);
        inner.launcher = launcher;
        let process = NativeProcess {
            inner: Arc::new(inner),
        };

        let created = launch::create(
            launcher,
            &self.spec,
            &host,
            &self.helpers,
            self.transport.as_ref(),
            &self.config,
            &process.inner.cancel,
        )
        .await;

        let created = match created {
            Ok(created) => created,
            Err(LifecycleError::Interrupted) => {
                process.inner.record_exit(UNKNOWN_EXIT_CODE);
                process.inner.state.set(ProcessState::Cancelled);
                process.inner.mark_done();
                return process;
            }
            Err(err) => {
                fail(&process, &err);
                return process;
            }
        };

        let Created {
            pid,
            stdin,
            stdout,
            stderr,
            waiter,
            tty,
            report,
        } = created;

        let _ = process.inner.pid.set(pid);
        process.inner.io.install(stdin, stdout, stderr);
        if let Some(tty) = tty {
            process.inner.info.put("tty", tty.as_str());
            let _ = process.inner.tty.set(tty);
        }
        process.inner.state.set(ProcessState::Running);
        info!(target: "nexec.lifecycle", %target, pid, strategy = launcher.name(), "process running");

        spawn_wait_task(process.inner.clone(), waiter, report);
        if !self.ext_providers.is_empty() {
            spawn_extended_info_task(process.inner.clone(), self.ext_providers, pid);
        }
        process
    }
}

/// Settle a handle that never got a live process behind it.
fn fail(process: &NativeProcess, err: &LifecycleError) {
    warn!(target: "nexec.lifecycle", target = %process.inner.target, error = %err, "startup failed");
    // Trip the latch so nothing launch-adjacent can keep blocking.
    process.inner.cancel.cancel();
    process.inner.io.append_stderr_text(format!("{err}\n"));
    process.inner.record_exit(STARTUP_FAILURE_CODE);
    process.inner.state.set(ProcessState::Error);
    process.inner.mark_done();
}

/// Supervise the process to completion and record its result.
fn spawn_wait_task(inner: Arc<Inner>, waiter: Waiter, report: Option<String>) {
    // Only the remote shell trampoline reserves the cd-failure exit value;
    // every other strategy's exit codes propagate verbatim.
    let remote_shell = matches!(waiter, Waiter::Channel(_));
    tokio::spawn(async move {
        let outcome = match waiter {
            Waiter::Child(mut child) => match child.wait().await {
                Ok(status) => Ok(status.code().unwrap_or(UNKNOWN_EXIT_CODE)),
                Err(err) => Err(err),
            },
            Waiter::Channel(control) => {
                while control.is_connected() {
                    tokio::time::sleep(inner.config.channel_poll).await;
                }
                Ok(control.exit_status().unwrap_or(UNKNOWN_EXIT_CODE))
            }
            Waiter::PidWatch => {
                let pid = inner.pid.get().copied().unwrap_or(0);
                while inner.dispatcher.is_alive(&inner.target, pid).await {
                    tokio::time::sleep(inner.config.channel_poll).await;
                }
                // The detached session's real exit code is unknowable.
                Ok(UNKNOWN_EXIT_CODE)
            }
        };
        settle(&inner, outcome, remote_shell, report).await;
    });
}

/// Record the wait outcome and drive the handle to its terminal state.
///
/// A failed wait is a supervision defect: the code is synthesized and the
/// terminal state is `Error`, not `Finished`. The reserved cd-failure exit
/// is rewritten only for the remote shell trampoline.
async fn settle(
    inner: &Arc<Inner>,
    outcome: Result<i32, std::io::Error>,
    remote_shell: bool,
    report: Option<String>,
) {
    inner.state.set(ProcessState::Finishing);

    let (code, wait_failed) = match outcome {
        Ok(code) => (code, false),
        Err(err) => {
            warn!(target: "nexec.lifecycle", error = %err, "wait failed");
            (UNKNOWN_EXIT_CODE, true)
        }
    };

    let code = if remote_shell && code == STARTUP_FAILURE_EXIT {
        // The bootstrap script's reserved exit: the cd failed on a
        // target whose filesystem could not be pre-checked.
        inner
            .io
            .append_stderr_text("working directory is unusable on the target\n".into());
        UNKNOWN_EXIT_CODE
    } else {
        code
    };
    if code == STATUS_DLL_NOT_FOUND {
        inner.io.append_stderr_text(
            "process exited with STATUS_DLL_NOT_FOUND: a required library is missing\n".into(),
        );
    }

    if let Some(path) = report {
        ingest_report(inner, &path).await;
    }

    inner.record_exit(code);
    let terminal = if wait_failed {
        ProcessState::Error
    } else if inner.cancel.is_cancelled() {
        ProcessState::Cancelled
    } else {
        ProcessState::Finished
    };
    inner.state.set(terminal);
    debug!(target: "nexec.lifecycle", code, state = %terminal, "process over");
    inner.mark_done();
}

/// Read and delete the trampoline's status report, folding its entries
/// into the handle's info bag.
async fn ingest_report(inner: &Inner, path: &str) {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => {
            let block = crate::bootstrap::HeaderBlock::parse_text(&text);
            for (name, value) in block.entries() {
                inner.info.put(name.clone(), value.clone());
            }
            if let Err(err) = tokio::fs::remove_file(path).await {
                debug!(target: "nexec.lifecycle", path, error = %err, "could not remove status report");
            }
        }
        Err(err) => {
            debug!(target: "nexec.lifecycle", path, error = %err, "could not read status report");
        }
    }
}

/// Resolve richer process info in the background and fold it into the bag.
fn spawn_extended_info_task(
    inner: Arc<Inner>,
    providers: Vec<Arc<dyn ExtendedInfoProvider>>,
    pid: u32,
) {
    tokio::spawn(async move {
        let info =
            first_extended_info(&providers, &inner.target, pid, inner.info.created_at()).await;
        inner.info.put("started_at", info.started_at.to_rfc3339());
        for (name, value) in info.attrs {
            inner.info.put(name, value);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ProcessSpec;
    use nexec_core::RecordingDispatcher;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn spec_for(exe: &str, args: &[&str]) -> ProcessSpec {
        let mut spec = ProcessSpec::new(ExecutionTarget::local());
        spec.set_executable(exe).expect("exe");
        spec.set_arguments(args.iter().copied()).expect("args");
        spec
    }

    fn bare_inner() -> Arc<Inner> {
        let (done_tx, done_rx) = watch::channel(false);
        Arc::new(Inner {
            target: ExecutionTarget::local(),
            state: StateCell::new(),
            pid: OnceLock::new(),
            tty: OnceLock::new(),
            exit_code: Mutex::new(None),
            io: ProcessIo::new(),
            info: ProcessInfoBag::new(),
            cancel: CancelToken::new(),
            destroyed: AtomicBool::new(false),
            dispatcher: Arc::new(RecordingDispatcher::new()),
            config: LifecycleConfig::default(),
            launcher: Launcher::LocalShell,
            done_tx,
            done_rx,
        })
    }

    #[tokio::test]
    async fn failed_wait_settles_in_error_not_finished() {
        let inner = bare_inner();
        inner.state.set(ProcessState::Running);
        settle(
            &inner,
            Err(std::io::Error::other("wait channel torn down")),
            false,
            None,
        )
        .await;
        assert_eq!(inner.state.get(), ProcessState::Error);
        assert_eq!(inner.exit_code(), Some(-1));
        assert!(*inner.done_rx.borrow());
    }

    #[tokio::test]
    async fn remote_cd_sentinel_is_rewritten_with_a_diagnostic() {
        let inner = bare_inner();
        inner.state.set(ProcessState::Running);
        settle(&inner, Ok(STARTUP_FAILURE_EXIT), true, None).await;
        assert_eq!(inner.exit_code(), Some(-1));
        assert_eq!(inner.state.get(), ProcessState::Finished);

        let mut err = String::new();
        inner
            .io
            .take_stderr()
            .read_to_string(&mut err)
            .await
            .expect("stderr");
        assert!(err.contains("working directory"), "stderr was: {err}");
    }

    #[tokio::test]
    async fn local_exit_matching_the_sentinel_is_not_rewritten() {
        let inner = bare_inner();
        inner.state.set(ProcessState::Running);
        settle(&inner, Ok(STARTUP_FAILURE_EXIT), false, None).await;
        assert_eq!(inner.exit_code(), Some(STARTUP_FAILURE_EXIT));
        assert_eq!(inner.state.get(), ProcessState::Finished);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reserved_cd_exit_value_propagates_for_local_processes() {
        let process = ProcessBuilder::new(spec_for("/bin/sh", &["-c", "exit 184"]))
            .start()
            .await;
        assert_eq!(process.wait_for().await, 184);
        assert_eq!(process.state(), ProcessState::Finished);

        let mut err = String::new();
        process
            .take_stderr()
            .read_to_string(&mut err)
            .await
            .expect("stderr");
        assert!(err.is_empty(), "stderr was: {err}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn echo_finishes_cleanly_with_its_output() {
        let process = ProcessBuilder::new(spec_for("/bin/echo", &["hello"]))
            .start()
            .await;
        assert!(process.pid().expect("pid") > 0);

        let code = process.wait_for().await;
        assert_eq!(code, 0);
        assert_eq!(process.state(), ProcessState::Finished);

        let mut out = String::new();
        process
            .take_stdout()
            .read_to_string(&mut out)
            .await
            .expect("stdout");
        assert_eq!(out, "hello\n");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_working_directory_fails_the_handle_not_the_caller() {
        let mut spec = spec_for("/bin/echo", &["hi"]);
        spec.set_working_directory("/no/such/dir");
        let process = ProcessBuilder::new(spec).start().await;

        assert_eq!(process.wait_for().await, STARTUP_FAILURE_CODE);
        assert_eq!(process.state(), ProcessState::Error);
        assert!(matches!(process.pid(), Err(LifecycleError::PidUnavailable)));

        let mut err = String::new();
        process
            .take_stderr()
            .read_to_string(&mut err)
            .await
            .expect("stderr");
        assert!(err.contains("/no/such/dir"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn destruction_escalates_term_then_kill() {
        let recorder = Arc::new(RecordingDispatcher::new());
        let config = LifecycleConfig {
            destroy_grace: Duration::from_millis(100),
            ..LifecycleConfig::default()
        };
        let process = ProcessBuilder::new(spec_for("/bin/sleep", &["30"]))
            .dispatcher(recorder.clone())
            .config(config)
            .start()
            .await;
        let pid = process.pid().expect("pid");

        process.destroy().await;

        let calls = recorder.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].signal, Signal::Term);
        assert_eq!(calls[1].signal, Signal::Kill);
        assert!(calls[1].at.duration_since(calls[0].at) >= Duration::from_millis(100));

        // The recorder delivered nothing; reap the sleep for real.
        ShellSignalDispatcher
            .signal(&ExecutionTarget::local(), pid, Signal::Kill)
            .await
            .expect("cleanup kill");
        assert_eq!(process.wait_for().await, -1);
        assert_eq!(process.state(), ProcessState::Cancelled);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn concurrent_destroys_collapse_into_one_protocol_run() {
        let recorder = Arc::new(RecordingDispatcher::new());
        let config = LifecycleConfig {
            destroy_grace: Duration::from_millis(50),
            ..LifecycleConfig::default()
        };
        let process = ProcessBuilder::new(spec_for("/bin/sleep", &["30"]))
            .dispatcher(recorder.clone())
            .config(config)
            .start()
            .await;
        let pid = process.pid().expect("pid");

        let mut tasks = Vec::new();
        for _ in 0..4 {
            let p = process.clone();
            tasks.push(tokio::spawn(async move { p.destroy().await }));
        }
        for task in tasks {
            task.await.expect("destroy task");
        }

        let terms = recorder
            .calls()
            .iter()
            .filter(|c| c.signal == Signal::Term)
            .count();
        assert_eq!(terms, 1);

        ShellSignalDispatcher
            .signal(&ExecutionTarget::local(), pid, Signal::Kill)
            .await
            .expect("cleanup kill");
        process.wait_for().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn real_destruction_terminates_a_stubborn_sleeper() {
        let process = ProcessBuilder::new(spec_for("/bin/sleep", &["30"]))
            .start()
            .await;
        process.destroy().await;
        assert_eq!(process.wait_for().await, -1);
        assert_eq!(process.state(), ProcessState::Cancelled);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn subscribers_ride_the_state_machine_to_a_closed_channel() {
        let process = ProcessBuilder::new(spec_for("/bin/echo", &["x"]))
            .start()
            .await;
        let mut rx = process.subscribe();
        process.wait_for().await;

        assert_eq!(*rx.borrow_and_update(), ProcessState::Finished);
        assert!(rx.changed().await.is_err());
    }

    #[tokio::test]
    async fn unprobeable_host_fails_fast() {
        let remote = ExecutionTarget::create("u", "far.example.com", 22);
        let mut spec = ProcessSpec::new(remote);
        spec.set_executable("/bin/ls").expect("exe");

        // Local provider refuses remote targets; no transport either.
        let process = ProcessBuilder::new(spec).start().await;
        assert_eq!(process.state(), ProcessState::Error);
        assert_eq!(process.wait_for().await, STARTUP_FAILURE_CODE);
    }
}
