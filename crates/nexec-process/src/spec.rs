// SPDX-License-Identifier: MIT OR Apache-2.0
//! Process specifications: what to run, where, and with which flags.

use crate::error::SpecError;
use nexec_core::ExecutionTarget;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Characters that get a backslash in the executable segment of a shell
/// line. `!` joins them on non-Windows targets.
const EXECUTABLE_ESCAPES: &[char] = &[' ', '&', '"', '\'', '(', ')'];

/// Expands macros (`${PLATFORM}`-style placeholders) in executable paths,
/// arguments, and working directories. The default is a passthrough.
pub trait MacroExpander: Send + Sync {
    /// Expand `value` for `target`.
    fn expand(&self, target: &ExecutionTarget, value: &str) -> String;
}

/// Passthrough expander used when no macro map is installed.
#[derive(Debug, Default)]
struct NullExpander;

impl MacroExpander for NullExpander {
    fn expand(&self, _target: &ExecutionTarget, value: &str) -> String {
        value.to_string()
    }
}

/// Ordered environment overlay applied on top of the inherited process
/// environment.
///
/// Supports remove-and-reset semantics: `remove(key)` records an explicit
/// unset, and a later `put(key, ...)` resets the same slot. The overlay
/// only ever holds caller-provided entries, so the "user-defined" view is
/// the overlay itself minus removals.
#[derive(Clone, Debug, Default)]
pub struct EnvOverlay {
    entries: Vec<(String, Option<String>)>,
}

impl EnvOverlay {
    /// Set a variable, replacing an earlier entry for the same key in place.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = Some(value.into());
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Bulk [`EnvOverlay::put`].
    pub fn put_all<K, V>(&mut self, vars: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (k, v) in vars {
            self.put(k, v);
        }
    }

    /// Record an explicit unset for `key`. The entry stays in the overlay
    /// so the bootstrap script emits an `unset`, negating an inherited
    /// value.
    pub fn remove(&mut self, key: impl Into<String>) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = None,
            None => self.entries.push((key, None)),
        }
    }

    /// Value of `key`, if set (and not removed).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Caller-provided variables, excluding removals and anything inherited
    /// from the parent process environment.
    pub fn user_defined(&self) -> Vec<(&str, &str)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
            .collect()
    }

    /// All entries in insertion order; `None` marks a removal.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    /// `true` when the overlay carries no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug)]
enum CommandSlot {
    Empty,
    Executable { executable: String, args: Vec<String> },
    CommandLine(String),
}

/// A mutable builder describing what to run.
///
/// Exactly one of {raw command line, executable+arguments} may be active;
/// setting one after the other fails with a [`SpecError`] rather than
/// silently overwriting. Cloning yields an independent copy, which is how
/// wrapper strategies (pty) derive a rewritten spec without mutating the
/// caller's.
#[derive(Clone)]
pub struct ProcessSpec {
    target: Arc<ExecutionTarget>,
    command: CommandSlot,
    working_dir: Option<String>,
    env: EnvOverlay,
    encoding: String,
    unbuffered: bool,
    redirect_error: bool,
    x11_forwarding: bool,
    suspend_on_start: bool,
    pty_mode: bool,
    expand_macros: bool,
    extended_status: bool,
    expander: Arc<dyn MacroExpander>,
}

impl fmt::Debug for ProcessSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessSpec")
            .field("target", &self.target.to_key())
            .field("command", &self.command)
            .field("working_dir", &self.working_dir)
            .field("env", &self.env)
            .field("pty_mode", &self.pty_mode)
            .finish_non_exhaustive()
    }
}

impl ProcessSpec {
    /// Start an empty spec for `target`.
    pub fn new(target: Arc<ExecutionTarget>) -> Self {
        Self {
            target,
            command: CommandSlot::Empty,
            working_dir: None,
            env: EnvOverlay::default(),
            encoding: "UTF-8".into(),
            unbuffered: false,
            redirect_error: false,
            x11_forwarding: false,
            suspend_on_start: false,
            pty_mode: false,
            expand_macros: true,
            extended_status: false,
            expander: Arc::new(NullExpander),
        }
    }

    /// Where the process will run.
    pub fn target(&self) -> &Arc<ExecutionTarget> {
        &self.target
    }

    /// Set the executable path. Fails if a raw command line was set.
    pub fn set_executable(&mut self, executable: impl Into<String>) -> Result<&mut Self, SpecError> {
        match &mut self.command {
            CommandSlot::CommandLine(_) => Err(SpecError::CommandLineAlreadySet),
            CommandSlot::Executable { executable: e, .. } => {
                *e = executable.into();
                Ok(self)
            }
            CommandSlot::Empty => {
                self.command = CommandSlot::Executable {
                    executable: executable.into(),
                    args: Vec::new(),
                };
                Ok(self)
            }
        }
    }

    /// Replace the argument list. Fails if a raw command line was set.
    pub fn set_arguments<I, S>(&mut self, arguments: I) -> Result<&mut Self, SpecError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let arguments: Vec<String> = arguments.into_iter().map(Into::into).collect();
        match &mut self.command {
            CommandSlot::CommandLine(_) => Err(SpecError::CommandLineAlreadySet),
            CommandSlot::Executable { args, .. } => {
                *args = arguments;
                Ok(self)
            }
            CommandSlot::Empty => {
                self.command = CommandSlot::Executable {
                    executable: String::new(),
                    args: arguments,
                };
                Ok(self)
            }
        }
    }

    /// Append one argument. Fails if a raw command line was set.
    pub fn add_argument(&mut self, argument: impl Into<String>) -> Result<&mut Self, SpecError> {
        match &mut self.command {
            CommandSlot::CommandLine(_) => Err(SpecError::CommandLineAlreadySet),
            CommandSlot::Executable { args, .. } => {
                args.push(argument.into());
                Ok(self)
            }
            CommandSlot::Empty => {
                self.command = CommandSlot::Executable {
                    executable: String::new(),
                    args: vec![argument.into()],
                };
                Ok(self)
            }
        }
    }

    /// Legacy convenience: set a raw shell command line. Fails if an
    /// executable or arguments were set.
    ///
    /// On a locally-Windows target the line is pre-split into
    /// executable+arguments, because the process launcher there cannot
    /// accept a single command line.
    pub fn set_command_line(&mut self, line: impl Into<String>) -> Result<&mut Self, SpecError> {
        if !matches!(self.command, CommandSlot::Empty) {
            return match self.command {
                CommandSlot::CommandLine(_) => Err(SpecError::CommandLineAlreadySet),
                _ => Err(SpecError::ExecutableAlreadySet),
            };
        }
        let line = line.into();
        if self.target.is_local() && cfg!(windows) {
            let mut parts = line.split_whitespace().map(str::to_string);
            let executable = parts.next().unwrap_or_default();
            self.command = CommandSlot::Executable {
                executable,
                args: parts.collect(),
            };
        } else {
            self.command = CommandSlot::CommandLine(line);
        }
        Ok(self)
    }

    /// Set the working directory (macro-expandable).
    pub fn set_working_directory(&mut self, dir: impl Into<String>) -> &mut Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Macro-expanded working directory, if one was set.
    pub fn working_directory(&self) -> Option<String> {
        self.working_dir.as_deref().map(|d| self.expand(d))
    }

    /// Environment overlay, read-only.
    pub fn env(&self) -> &EnvOverlay {
        &self.env
    }

    /// Environment overlay, mutable.
    pub fn env_mut(&mut self) -> &mut EnvOverlay {
        &mut self.env
    }

    /// Character encoding label for the process streams.
    pub fn charset(&self) -> &str {
        &self.encoding
    }

    /// Set the character encoding label.
    pub fn set_charset(&mut self, charset: impl Into<String>) -> &mut Self {
        self.encoding = charset.into();
        self
    }

    /// Request unbuffered output from cooperating launchers.
    pub fn set_unbuffered(&mut self, on: bool) -> &mut Self {
        self.unbuffered = on;
        self
    }

    /// Whether unbuffered output was requested.
    pub fn unbuffered(&self) -> bool {
        self.unbuffered
    }

    /// Redirect the child's stderr into stdout.
    pub fn set_redirect_error(&mut self, on: bool) -> &mut Self {
        self.redirect_error = on;
        self
    }

    /// Whether stderr is redirected into stdout.
    pub fn redirect_error(&self) -> bool {
        self.redirect_error
    }

    /// Request X11 forwarding on the transport channel.
    pub fn set_x11_forwarding(&mut self, on: bool) -> &mut Self {
        self.x11_forwarding = on;
        self
    }

    /// Whether X11 forwarding was requested.
    pub fn x11_forwarding(&self) -> bool {
        self.x11_forwarding
    }

    /// Start the process suspended until a continue signal arrives.
    pub fn set_suspend_on_start(&mut self, on: bool) -> &mut Self {
        self.suspend_on_start = on;
        self
    }

    /// Whether the process starts suspended.
    pub fn suspend_on_start(&self) -> bool {
        self.suspend_on_start
    }

    /// Run the process under a pseudo-terminal.
    pub fn set_pty_mode(&mut self, on: bool) -> &mut Self {
        self.pty_mode = on;
        self
    }

    /// Whether a pty was requested.
    pub fn pty_mode(&self) -> bool {
        self.pty_mode
    }

    /// Toggle macro expansion.
    pub fn set_macro_expansion(&mut self, on: bool) -> &mut Self {
        self.expand_macros = on;
        self
    }

    /// Request extended status reporting from the trampoline launcher.
    pub fn set_extended_status(&mut self, on: bool) -> &mut Self {
        self.extended_status = on;
        self
    }

    /// Whether extended status was requested.
    pub fn extended_status(&self) -> bool {
        self.extended_status
    }

    /// Install a macro expander.
    pub fn set_macro_expander(&mut self, expander: Arc<dyn MacroExpander>) -> &mut Self {
        self.expander = expander;
        self
    }

    /// Expand macros in `value` if expansion is enabled.
    pub fn expand(&self, value: &str) -> String {
        if self.expand_macros {
            self.expander.expand(&self.target, value)
        } else {
            value.to_string()
        }
    }

    /// Resolved argv: the macro-expanded executable (locally resolved to an
    /// absolute path when possible) followed by macro-expanded,
    /// quote-normalized arguments.
    ///
    /// In raw-command-line mode the line is whitespace-split; callers that
    /// need shell semantics use [`ProcessSpec::command_line_for_shell`].
    pub fn command(&self) -> Result<Vec<String>, SpecError> {
        match &self.command {
            CommandSlot::Empty => Err(SpecError::NothingToRun),
            CommandSlot::CommandLine(line) => {
                let line = self.expand(line);
                let argv: Vec<String> = line.split_whitespace().map(str::to_string).collect();
                if argv.is_empty() {
                    Err(SpecError::NothingToRun)
                } else {
                    Ok(argv)
                }
            }
            CommandSlot::Executable { executable, args } => {
                if executable.is_empty() {
                    return Err(SpecError::NothingToRun);
                }
                let mut argv = Vec::with_capacity(args.len() + 1);
                argv.push(self.resolve_executable(&self.expand(executable)));
                argv.extend(args.iter().map(|a| normalize_quotes(&self.expand(a))));
                Ok(argv)
            }
        }
    }

    /// A single shell-ready command string, used when execution trampolines
    /// through a shell (local or remote).
    pub fn command_line_for_shell(&self) -> Result<String, SpecError> {
        match &self.command {
            CommandSlot::Empty => Err(SpecError::NothingToRun),
            CommandSlot::CommandLine(line) => Ok(self.expand(line)),
            CommandSlot::Executable { executable, args } => {
                if executable.is_empty() {
                    return Err(SpecError::NothingToRun);
                }
                let windows = self.target.is_local() && cfg!(windows);
                let mut out = escape_executable(&self.expand(executable), windows);
                for arg in args {
                    out.push(' ');
                    out.push_str(&escape_argument(&self.expand(arg)));
                }
                Ok(out)
            }
        }
    }

    /// Replace the command outright, bypassing the exclusivity check.
    /// Wrapper strategies use this to derive a helper invocation from an
    /// already-validated spec.
    pub(crate) fn rewrite_command(&mut self, executable: String, args: Vec<String>) {
        self.command = CommandSlot::Executable { executable, args };
    }

    /// Probe for the executable on the local filesystem: the path as given,
    /// then relative to the working directory, then the same two with an
    /// `.exe` suffix on Windows. The first existing file wins; otherwise
    /// the original string passes through unresolved.
    fn resolve_executable(&self, executable: &str) -> String {
        if !self.target.is_local() {
            return executable.to_string();
        }
        let mut candidates: Vec<PathBuf> = Vec::new();
        candidates.push(PathBuf::from(executable));
        if let Some(dir) = self.working_directory() {
            candidates.push(Path::new(&dir).join(executable));
        }
        if cfg!(windows) {
            let with_exe = format!("{executable}.exe");
            candidates.push(PathBuf::from(&with_exe));
            if let Some(dir) = self.working_directory() {
                candidates.push(Path::new(&dir).join(&with_exe));
            }
        }
        for candidate in candidates {
            if candidate.is_file() {
                return candidate.to_string_lossy().into_owned();
            }
        }
        executable.to_string()
    }
}

/// Strip one pair of matching outer quotes, if present.
fn normalize_quotes(arg: &str) -> String {
    let bytes = arg.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return arg[1..arg.len() - 1].to_string();
        }
    }
    arg.to_string()
}

fn is_quoted(arg: &str) -> bool {
    let bytes = arg.as_bytes();
    bytes.len() >= 2 && bytes[0] == bytes[bytes.len() - 1] && (bytes[0] == b'"' || bytes[0] == b'\'')
}

/// Backslash-escape the executable segment of a shell line.
fn escape_executable(executable: &str, windows: bool) -> String {
    let mut out = String::with_capacity(executable.len());
    for ch in executable.chars() {
        if EXECUTABLE_ESCAPES.contains(&ch) || (!windows && ch == '!') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Quote an argument for the shell line. Arguments containing neither a
/// space nor `$` pass through verbatim so flags like `--login` stay
/// untouched; already-quoted arguments are trusted as-is.
fn escape_argument(arg: &str) -> String {
    if !arg.contains(' ') && !arg.contains('$') {
        return arg.to_string();
    }
    if is_quoted(arg) {
        return arg.to_string();
    }
    let escaped = arg.replace('"', "\\\"").replace('$', "\\$");
    format!("\"{escaped}\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_spec() -> ProcessSpec {
        ProcessSpec::new(ExecutionTarget::local())
    }

    #[test]
    fn command_line_rejects_later_arguments() {
        let mut spec = local_spec();
        spec.set_command_line("ls -la /tmp").expect("command line");
        assert_eq!(
            spec.set_arguments(["-l"]).expect_err("must conflict"),
            SpecError::CommandLineAlreadySet
        );
        assert_eq!(
            spec.set_executable("/bin/ls").expect_err("must conflict"),
            SpecError::CommandLineAlreadySet
        );
    }

    #[test]
    fn executable_rejects_later_command_line() {
        let mut spec = local_spec();
        spec.set_executable("/bin/ls").expect("executable");
        assert_eq!(
            spec.set_command_line("ls -la").expect_err("must conflict"),
            SpecError::ExecutableAlreadySet
        );
    }

    #[test]
    fn empty_spec_has_nothing_to_run() {
        assert_eq!(
            local_spec().command().expect_err("empty"),
            SpecError::NothingToRun
        );
    }

    #[test]
    fn overlay_remove_then_put_resets_the_slot() {
        let mut env = EnvOverlay::default();
        env.put("PATH", "/opt/bin");
        env.remove("PATH");
        assert_eq!(env.get("PATH"), None);
        env.put("PATH", "/usr/bin");
        assert_eq!(env.get("PATH"), Some("/usr/bin"));
        // Still a single slot.
        assert_eq!(env.pairs().count(), 1);
    }

    #[test]
    fn user_defined_view_skips_removals() {
        let mut env = EnvOverlay::default();
        env.put("A", "1");
        env.remove("LD_PRELOAD");
        assert_eq!(env.user_defined(), vec![("A", "1")]);
    }

    #[test]
    fn shell_line_escapes_the_executable_segment() {
        let mut spec = local_spec();
        spec.set_executable("/opt/my tools/run(x)").expect("exe");
        let line = spec.command_line_for_shell().expect("line");
        assert_eq!(line, "/opt/my\\ tools/run\\(x\\)");
    }

    #[test]
    fn plain_flags_pass_through_verbatim() {
        let mut spec = local_spec();
        spec.set_executable("/bin/bash").expect("exe");
        spec.set_arguments(["--login", "-c"]).expect("args");
        let line = spec.command_line_for_shell().expect("line");
        assert_eq!(line, "/bin/bash --login -c");
    }

    #[test]
    fn arguments_with_spaces_or_dollars_are_quoted() {
        let mut spec = local_spec();
        spec.set_executable("/bin/echo").expect("exe");
        spec.set_arguments(["hello world", "cost=$HOME"]).expect("args");
        let line = spec.command_line_for_shell().expect("line");
        assert_eq!(line, "/bin/echo \"hello world\" \"cost=\\$HOME\"");
    }

    #[test]
    fn already_quoted_arguments_are_trusted() {
        let mut spec = local_spec();
        spec.set_executable("/bin/sh").expect("exe");
        spec.set_arguments(["'echo $x'"]).expect("args");
        let line = spec.command_line_for_shell().expect("line");
        assert_eq!(line, "/bin/sh 'echo $x'");
    }

    #[test]
    fn argv_normalizes_quoted_arguments() {
        let mut spec = local_spec();
        spec.set_executable("/bin/echo").expect("exe");
        spec.set_arguments(["\"hello\"", "plain"]).expect("args");
        let argv = spec.command().expect("argv");
        assert_eq!(argv[1], "hello");
        assert_eq!(argv[2], "plain");
    }

    #[cfg(unix)]
    #[test]
    fn executable_resolution_probes_the_working_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let exe = dir.path().join("tool");
        std::fs::write(&exe, b"#!/bin/sh\n").expect("write");

        let mut spec = local_spec();
        spec.set_working_directory(dir.path().to_string_lossy().into_owned());
        spec.set_executable("tool").expect("exe");
        let argv = spec.command().expect("argv");
        assert_eq!(argv[0], exe.to_string_lossy());
    }

    #[test]
    fn unresolvable_executable_passes_through() {
        let mut spec = local_spec();
        spec.set_executable("definitely-not-a-real-binary").expect("exe");
        let argv = spec.command().expect("argv");
        assert_eq!(argv[0], "definitely-not-a-real-binary");
    }

    #[test]
    fn remote_specs_never_touch_the_local_filesystem() {
        let remote = ExecutionTarget::create("u", "build.example.com", 22);
        let mut spec = ProcessSpec::new(remote);
        spec.set_executable("/bin/ls").expect("exe");
        let argv = spec.command().expect("argv");
        assert_eq!(argv[0], "/bin/ls");
    }
}
