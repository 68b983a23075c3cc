// SPDX-License-Identifier: MIT OR Apache-2.0
//! Launch strategies: the closed set of ways a process comes to life.
//!
//! Every strategy honours the same contract: consume a resolved command and
//! environment, populate the PID and the three I/O streams, or fail with a
//! [`LifecycleError`]. The strategy is selected once, at handle
//! construction, from (target locality × pty-requested × terminal-requested);
//! the lifecycle engine holds a strategy value, not a subclass hierarchy.

use crate::bootstrap::{self, HeaderBlock};
use crate::cancel::CancelToken;
use crate::config::LifecycleConfig;
use crate::error::LifecycleError;
use crate::io::{InputWriter, OutputReader, empty_reader, sink_writer};
use crate::spec::ProcessSpec;
use nexec_core::{HostInfo, OsFamily};
use nexec_transport::{ChannelControl, ChannelKind, ChannelTransport, TransportError, open_with_retry};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

/// Exit value the bootstrap script reserves for a failed `cd` into the
/// working directory. Mapped to -1 when the wait task records the result.
pub(crate) const STARTUP_FAILURE_EXIT: i32 = 184;

/// Environment variables stripped before delegating to the pty helper, so
/// preload-style instrumentation does not leak into an interactive
/// terminal.
const PRELOAD_VARS: &[&str] = &["LD_PRELOAD", "LD_PRELOAD_64", "DYLD_INSERT_LIBRARIES"];

/// External-terminal launch description: the emulator argv (the real
/// command is appended) and the PID file the emulator's bootstrap writes.
#[derive(Clone, Debug)]
pub struct TerminalSpec {
    /// Terminal emulator argv prefix.
    pub argv: Vec<String>,
    /// PID file polled after the emulator starts.
    pub pid_file: PathBuf,
}

/// Paths to the cooperating helper binaries. All optional; a strategy that
/// needs a missing helper fails fast at `start()`.
#[derive(Clone, Debug, Default)]
pub struct HelperPaths {
    /// Helper that allocates a pseudo-terminal and execs the real command.
    pub pty_helper: Option<PathBuf>,
    /// Fixed-contract trampoline launcher binary.
    pub trampoline: Option<PathBuf>,
    /// External terminal emulator description.
    pub terminal: Option<TerminalSpec>,
}

/// The closed set of launch strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Launcher {
    /// POSIX shell trampoline over local pipes.
    LocalShell,
    /// Direct argv spawn — the Windows path, no shell involved.
    DirectSpawn,
    /// Shell trampoline written over an acquired transport channel.
    Remote,
    /// Pty helper wrapping LocalShell or Remote.
    Pty,
    /// Trampoline launcher binary with a parsed startup header.
    Trampoline,
    /// Interactively-spawned terminal emulator plus PID-file discovery.
    ExternalTerminal,
}

impl Launcher {
    /// Pick the strategy for a spec. Decided once per handle.
    pub(crate) fn select(spec: &ProcessSpec, host: &HostInfo, helpers: &HelperPaths) -> Launcher {
        if helpers.terminal.is_some() {
            return Launcher::ExternalTerminal;
        }
        if helpers.trampoline.is_some() {
            return Launcher::Trampoline;
        }
        if spec.pty_mode() {
            return Launcher::Pty;
        }
        if !spec.target().is_local() {
            return Launcher::Remote;
        }
        if host.os == OsFamily::Windows {
            return Launcher::DirectSpawn;
        }
        Launcher::LocalShell
    }

    /// Seconds a destroyer should wait before starting the termination
    /// escalation. Default: terminate immediately.
    pub(crate) fn pre_destroy_wait(self) -> std::time::Duration {
        std::time::Duration::ZERO
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::LocalShell => "local-shell",
            Self::DirectSpawn => "direct-spawn",
            Self::Remote => "remote",
            Self::Pty => "pty",
            Self::Trampoline => "trampoline",
            Self::ExternalTerminal => "external-terminal",
        }
    }
}

/// What the wait task blocks on.
pub(crate) enum Waiter {
    /// A locally spawned child.
    Child(Child),
    /// A remote channel's connected state plus its exit status.
    Channel(ChannelControl),
    /// Liveness polling of a detached pid (external terminal).
    PidWatch,
}

/// Result of a successful `create()`.
pub(crate) struct Created {
    pub(crate) pid: u32,
    pub(crate) stdin: InputWriter,
    pub(crate) stdout: OutputReader,
    pub(crate) stderr: OutputReader,
    pub(crate) waiter: Waiter,
    pub(crate) tty: Option<String>,
    pub(crate) report: Option<String>,
}

impl std::fmt::Debug for Created {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Created")
            .field("pid", &self.pid)
            .field("tty", &self.tty)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

/// Dispatch `create()` for the selected strategy.
pub(crate) async fn create(
    launcher: Launcher,
    spec: &ProcessSpec,
    host: &HostInfo,
    helpers: &HelperPaths,
    transport: Option<&Arc<dyn ChannelTransport>>,
    config: &LifecycleConfig,
    cancel: &CancelToken,
) -> Result<Created, LifecycleError> {
    debug!(target: "nexec.launch", strategy = launcher.name(), target = %spec.target(), "creating process");
    match launcher {
        Launcher::LocalShell => create_local_shell(spec, host, cancel).await,
        Launcher::DirectSpawn => create_direct(spec).await,
        Launcher::Remote => create_remote(spec, transport, cancel).await,
        Launcher::Pty => create_pty(spec, host, helpers, transport, cancel).await,
        Launcher::Trampoline => create_trampoline(spec, helpers, cancel).await,
        Launcher::ExternalTerminal => {
            create_external_terminal(spec, helpers, config, cancel).await
        }
    }
}

/// The bootstrap script both shell-backed strategies write to their shell.
///
/// `echo $$` first, so the PID of the shell (and, after `exec`, of the
/// command itself) comes back before anything else; then the environment
/// overlay, the `cd` (with the reserved failure exit), the cooperative
/// suspend loop, the stderr redirect, and finally the `exec`.
pub(crate) fn build_bootstrap_script(spec: &ProcessSpec) -> Result<String, LifecycleError> {
    let mut script = String::from("echo $$\n");
    for (key, value) in spec.env().pairs() {
        match value {
            Some(v) => {
                let quoted = v.replace('\'', "'\\''");
                let _ = writeln!(script, "export {key}='{quoted}'");
            }
            None => {
                let _ = writeln!(script, "unset {key}");
            }
        }
    }
    if let Some(dir) = spec.working_directory() {
        let quoted = dir.replace('\'', "'\\''");
        let _ = writeln!(script, "cd '{quoted}' || exit {STARTUP_FAILURE_EXIT}");
    }
    if spec.suspend_on_start() {
        script.push_str("nx_cont=0\ntrap 'nx_cont=1' CONT\nwhile [ $nx_cont -eq 0 ]; do sleep 0.2; done\n");
    }
    if spec.redirect_error() {
        script.push_str("exec 2>&1\n");
    }
    let _ = writeln!(script, "exec {}", spec.command_line_for_shell()?);
    Ok(script)
}

fn check_local_working_dir(spec: &ProcessSpec) -> Result<(), LifecycleError> {
    if let Some(dir) = spec.working_directory() {
        if !Path::new(&dir).is_dir() {
            return Err(LifecycleError::WorkingDirectoryMissing(dir));
        }
    }
    Ok(())
}

fn stdio_error(what: &str) -> LifecycleError {
    LifecycleError::Spawn(std::io::Error::other(format!("{what} unavailable")))
}

async fn create_local_shell(
    spec: &ProcessSpec,
    host: &HostInfo,
    cancel: &CancelToken,
) -> Result<Created, LifecycleError> {
    if !host.shell.is_file() {
        return Err(LifecycleError::ShellNotFound(
            host.shell.display().to_string(),
        ));
    }
    check_local_working_dir(spec)?;
    let script = build_bootstrap_script(spec)?;

    let mut child = Command::new(&host.shell)
        .arg("-s")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(LifecycleError::Spawn)?;

    let mut stdin = child.stdin.take().ok_or_else(|| stdio_error("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| stdio_error("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| stdio_error("stderr"))?;

    stdin
        .write_all(script.as_bytes())
        .await
        .map_err(LifecycleError::Bootstrap)?;
    stdin.flush().await.map_err(LifecycleError::Bootstrap)?;

    let mut reader = BufReader::new(stdout);
    let pid = bootstrap::read_pid_line(&mut reader, cancel).await?;

    Ok(Created {
        pid,
        stdin: Box::new(stdin),
        stdout: Box::new(reader),
        stderr: Box::new(stderr),
        waiter: Waiter::Child(child),
        tty: None,
        report: None,
    })
}

/// Direct argv spawn. Used where the launcher cannot go through a POSIX
/// shell (Windows); the PID comes straight from the OS handle, and an
/// unresolvable PID is fatal rather than silently faked.
async fn create_direct(spec: &ProcessSpec) -> Result<Created, LifecycleError> {
    check_local_working_dir(spec)?;
    let argv = spec.command()?;

    let mut command = Command::new(&argv[0]);
    command
        .args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = spec.working_directory() {
        command.current_dir(dir);
    }
    for (key, value) in spec.env().pairs() {
        match value {
            Some(v) => {
                command.env(key, v);
            }
            None => {
                command.env_remove(key);
            }
        }
    }

    let mut child = command.spawn().map_err(LifecycleError::Spawn)?;
    let pid = child.id().ok_or(LifecycleError::PidMissing)?;
    let stdin = child.stdin.take().ok_or_else(|| stdio_error("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| stdio_error("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| stdio_error("stderr"))?;

    Ok(Created {
        pid,
        stdin: Box::new(stdin),
        stdout: Box::new(stdout),
        stderr: Box::new(stderr),
        waiter: Waiter::Child(child),
        tty: None,
        report: None,
    })
}

/// Shell trampoline over an acquired transport channel. Identical script
/// to the local strategy; the working directory cannot be pre-checked, so
/// a failed `cd` surfaces through the reserved exit value instead.
async fn create_remote(
    spec: &ProcessSpec,
    transport: Option<&Arc<dyn ChannelTransport>>,
    cancel: &CancelToken,
) -> Result<Created, LifecycleError> {
    let target = spec.target();
    let transport = transport.ok_or_else(|| {
        LifecycleError::Transport(TransportError::NoSession(target.to_key()))
    })?;
    let script = build_bootstrap_script(spec)?;

    let channel = open_with_retry(transport.as_ref(), target, ChannelKind::Shell).await?;
    let control = channel.control();
    let (mut input, output, error, _) = channel.into_parts();

    input
        .write_all(script.as_bytes())
        .await
        .map_err(LifecycleError::Bootstrap)?;
    input.flush().await.map_err(LifecycleError::Bootstrap)?;

    let mut reader = BufReader::new(output);
    let pid = bootstrap::read_pid_line(&mut reader, cancel).await?;

    Ok(Created {
        pid,
        stdin: input,
        stdout: Box::new(reader),
        stderr: error,
        waiter: Waiter::Channel(control),
        tty: None,
        report: None,
    })
}

/// Pty helper: rewrite the spec to invoke the helper around the real
/// command, strip preload-style variables, delegate to the local or remote
/// shell strategy, then consume the two-line `PID=`/`TTY=` header before
/// handing the rest of the stream through as terminal output.
async fn create_pty(
    spec: &ProcessSpec,
    host: &HostInfo,
    helpers: &HelperPaths,
    transport: Option<&Arc<dyn ChannelTransport>>,
    cancel: &CancelToken,
) -> Result<Created, LifecycleError> {
    let helper = helpers
        .pty_helper
        .as_ref()
        .ok_or(LifecycleError::HelperMissing("pty helper"))?;

    let mut rewritten = spec.clone();
    for var in PRELOAD_VARS {
        rewritten.env_mut().remove(*var);
    }
    let argv = spec.command()?;
    rewritten.rewrite_command(helper.display().to_string(), argv);

    let mut created = if spec.target().is_local() {
        create_local_shell(&rewritten, host, cancel).await?
    } else {
        create_remote(&rewritten, transport, cancel).await?
    };

    let mut reader = BufReader::new(created.stdout);
    let header = HeaderBlock::read_keyed(&mut reader, &["PID", "TTY"], cancel).await?;
    created.pid = header.pid()?;
    created.tty = header.get("TTY").map(str::to_string);
    created.stdout = Box::new(reader);
    Ok(created)
}

/// Trampoline launcher: a longer argv with flags for the working
/// directory, pty mode, cooperative suspend, status reporting, and
/// environment injection; the real PID arrives in the parsed startup
/// header.
async fn create_trampoline(
    spec: &ProcessSpec,
    helpers: &HelperPaths,
    cancel: &CancelToken,
) -> Result<Created, LifecycleError> {
    let launcher = helpers
        .trampoline
        .as_ref()
        .ok_or(LifecycleError::HelperMissing("trampoline launcher"))?;
    check_local_working_dir(spec)?;

    let mut args: Vec<String> = Vec::new();
    if let Some(dir) = spec.working_directory() {
        args.push("--dir".into());
        args.push(dir);
    }
    args.push(if spec.pty_mode() { "--pty" } else { "--no-pty" }.into());
    if spec.suspend_on_start() {
        args.push("--wait".into());
    }
    if spec.unbuffered() {
        args.push("--unbuffer".into());
    }
    if spec.extended_status() {
        args.push("--report".into());
    }
    for (key, value) in spec.env().pairs() {
        match value {
            Some(v) => {
                args.push("--env".into());
                args.push(format!("{key}={v}"));
            }
            None => {
                args.push("--unset".into());
                args.push(key.to_string());
            }
        }
    }
    args.push("--".into());
    args.extend(spec.command()?);

    // Unlike the shell strategies, the launcher does not exit on stdin
    // EOF; a failed bootstrap must not leave it running detached.
    let mut child = Command::new(launcher)
        .args(&args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(LifecycleError::Spawn)?;

    let stdin = child.stdin.take().ok_or_else(|| stdio_error("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| stdio_error("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| stdio_error("stderr"))?;

    let mut reader = BufReader::new(stdout);
    let header = HeaderBlock::read(&mut reader, cancel).await?;
    let pid = header.pid()?;

    Ok(Created {
        pid,
        stdin: Box::new(stdin),
        stdout: Box::new(reader),
        stderr: Box::new(stderr),
        waiter: Waiter::Child(child),
        tty: header.get("TTY").map(str::to_string),
        report: header.get("REPORT").map(str::to_string),
    })
}

/// External terminal: spawn the emulator argv with the real command
/// appended, then poll for the PID file its bootstrap writes. The
/// terminal owns the console, so the handle's streams stay placeholders.
async fn create_external_terminal(
    spec: &ProcessSpec,
    helpers: &HelperPaths,
    config: &LifecycleConfig,
    cancel: &CancelToken,
) -> Result<Created, LifecycleError> {
    let terminal = helpers
        .terminal
        .as_ref()
        .ok_or(LifecycleError::HelperMissing("terminal"))?;
    check_local_working_dir(spec)?;

    let mut argv = terminal.argv.clone();
    argv.extend(spec.command()?);
    if argv.is_empty() {
        return Err(LifecycleError::HelperMissing("terminal"));
    }

    let mut emulator = Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(LifecycleError::Spawn)?;

    let pid = match bootstrap::poll_pid_file(
        &terminal.pid_file,
        config.pidfile_poll,
        config.pidfile_deadline,
        cancel,
    )
    .await
    {
        Ok(pid) => pid,
        Err(err) => {
            // No PID file means no trackable process; take the emulator
            // down with the failed launch instead of leaving it detached.
            if let Err(kill_err) = emulator.kill().await {
                warn!(target: "nexec.launch", error = %kill_err, "could not kill terminal emulator");
            }
            return Err(err);
        }
    };

    // Reap the emulator when it exits; the process we track is the one
    // the PID file names, not the emulator itself.
    tokio::spawn(async move {
        if let Err(err) = emulator.wait().await {
            warn!(target: "nexec.launch", error = %err, "terminal emulator wait failed");
        }
    });

    Ok(Created {
        pid,
        stdin: sink_writer(),
        stdout: empty_reader(),
        stderr: empty_reader(),
        waiter: Waiter::PidWatch,
        tty: None,
        report: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexec_core::ExecutionTarget;

    fn host() -> HostInfo {
        HostInfo {
            shell: PathBuf::from("/bin/sh"),
            os: OsFamily::current(),
            tmp_dir: std::env::temp_dir(),
            env_file: None,
        }
    }

    fn spec_for(exe: &str, args: &[&str]) -> ProcessSpec {
        let mut spec = ProcessSpec::new(ExecutionTarget::local());
        spec.set_executable(exe).expect("exe");
        spec.set_arguments(args.iter().copied()).expect("args");
        spec
    }

    #[test]
    fn bootstrap_script_orders_its_sections() {
        let mut spec = spec_for("/bin/echo", &["hi"]);
        spec.env_mut().put("A", "x'y");
        spec.env_mut().remove("LD_PRELOAD");
        spec.set_working_directory("/tmp");
        spec.set_suspend_on_start(true);
        spec.set_redirect_error(true);

        let script = build_bootstrap_script(&spec).expect("script");
        let lines: Vec<&str> = script.lines().collect();
        assert_eq!(lines[0], "echo $$");
        assert_eq!(lines[1], "export A='x'\\''y'");
        assert_eq!(lines[2], "unset LD_PRELOAD");
        assert_eq!(lines[3], "cd '/tmp' || exit 184");
        assert!(lines[4..].iter().any(|l| l.contains("trap 'nx_cont=1' CONT")));
        let redirect = lines.iter().position(|l| *l == "exec 2>&1").expect("redirect");
        let exec = lines.iter().position(|l| l.starts_with("exec /bin/echo")).expect("exec");
        assert!(redirect < exec);
    }

    #[test]
    fn strategy_selection_is_decided_by_locality_pty_and_terminal() {
        let helpers = HelperPaths::default();
        let local = spec_for("/bin/ls", &[]);
        assert_eq!(
            Launcher::select(&local, &host(), &helpers),
            if cfg!(windows) {
                Launcher::DirectSpawn
            } else {
                Launcher::LocalShell
            }
        );

        let mut pty = spec_for("/bin/ls", &[]);
        pty.set_pty_mode(true);
        assert_eq!(Launcher::select(&pty, &host(), &helpers), Launcher::Pty);

        let remote = {
            let mut s = ProcessSpec::new(ExecutionTarget::create("u", "far.example.com", 22));
            s.set_executable("/bin/ls").expect("exe");
            s
        };
        assert_eq!(Launcher::select(&remote, &host(), &helpers), Launcher::Remote);

        let with_trampoline = HelperPaths {
            trampoline: Some(PathBuf::from("/opt/nexec/launcher")),
            ..HelperPaths::default()
        };
        assert_eq!(
            Launcher::select(&local, &host(), &with_trampoline),
            Launcher::Trampoline
        );

        let with_terminal = HelperPaths {
            terminal: Some(TerminalSpec {
                argv: vec!["xterm".into(), "-e".into()],
                pid_file: PathBuf::from("/tmp/term.pid"),
            }),
            ..HelperPaths::default()
        };
        assert_eq!(
            Launcher::select(&local, &host(), &with_terminal),
            Launcher::ExternalTerminal
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn local_shell_create_discovers_the_pid() {
        let spec = spec_for("/bin/sleep", &["5"]);
        let created = create_local_shell(&spec, &host(), &CancelToken::new())
            .await
            .expect("create");
        assert!(created.pid > 0);
        // Cleanup: the sleep is still running.
        if let Waiter::Child(mut child) = created.waiter {
            child.kill().await.expect("kill");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_working_directory_fails_before_spawn() {
        let mut spec = spec_for("/bin/echo", &["hi"]);
        spec.set_working_directory("/no/such/dir");
        let err = create_local_shell(&spec, &host(), &CancelToken::new())
            .await
            .expect_err("must fail");
        assert!(matches!(err, LifecycleError::WorkingDirectoryMissing(d) if d.contains("/no/such/dir")));
    }
}
