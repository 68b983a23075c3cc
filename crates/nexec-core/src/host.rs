// SPDX-License-Identifier: MIT OR Apache-2.0
//! Host capability probing: shell path, OS family, temp directory.

use crate::target::ExecutionTarget;
use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;

/// Operating-system family of an execution target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OsFamily {
    /// Linux distributions.
    Linux,
    /// macOS.
    MacOs,
    /// Solaris / illumos.
    SunOs,
    /// Windows.
    Windows,
    /// Anything the probe could not classify.
    Unknown,
}

impl OsFamily {
    /// `true` for the POSIX families that run the shell trampoline.
    pub fn is_unix(self) -> bool {
        matches!(self, Self::Linux | Self::MacOs | Self::SunOs)
    }

    /// Family of the machine this code was compiled for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Self::Linux
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else if cfg!(target_os = "solaris") || cfg!(target_os = "illumos") {
            Self::SunOs
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::SunOs => "sunos",
            Self::Windows => "windows",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Capabilities of an execution target, resolved once before launch.
///
/// Absence of host info (a failed or impossible probe) makes a subsequent
/// `start()` fail fast; the probe failure itself is never propagated.
#[derive(Clone, Debug)]
pub struct HostInfo {
    /// Path to the POSIX shell used for the bootstrap trampoline.
    pub shell: PathBuf,
    /// OS family of the target.
    pub os: OsFamily,
    /// Temp directory on the target.
    pub tmp_dir: PathBuf,
    /// Optional path to a dumped environment file on the target.
    pub env_file: Option<PathBuf>,
}

/// Resolves [`HostInfo`] for a target. Injected into the lifecycle engine;
/// remote implementations typically probe over the transport.
#[async_trait]
pub trait HostInfoProvider: Send + Sync {
    /// Probe the target's capabilities.
    async fn host_info(&self, target: &ExecutionTarget) -> std::io::Result<HostInfo>;
}

/// Probes the machine this process runs on.
#[derive(Debug, Default)]
pub struct LocalHostInfoProvider;

#[async_trait]
impl HostInfoProvider for LocalHostInfoProvider {
    async fn host_info(&self, target: &ExecutionTarget) -> std::io::Result<HostInfo> {
        if !target.is_local() {
            return Err(std::io::Error::other(format!(
                "cannot probe remote target {target} locally"
            )));
        }
        Ok(HostInfo {
            shell: local_shell(),
            os: OsFamily::current(),
            tmp_dir: std::env::temp_dir(),
            env_file: None,
        })
    }
}

/// Hands out a fixed, pre-resolved [`HostInfo`] for any target. Useful for
/// tests and for callers that cache probe results themselves.
#[derive(Clone, Debug)]
pub struct StaticHostInfoProvider(pub HostInfo);

#[async_trait]
impl HostInfoProvider for StaticHostInfoProvider {
    async fn host_info(&self, _target: &ExecutionTarget) -> std::io::Result<HostInfo> {
        Ok(self.0.clone())
    }
}

fn local_shell() -> PathBuf {
    if cfg!(windows) {
        return std::env::var_os("ComSpec")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cmd.exe"));
    }
    // A POSIX sh is what the bootstrap trampoline expects; $SHELL may be
    // an interactive shell with different syntax, so it is only a fallback.
    let sh = PathBuf::from("/bin/sh");
    if sh.exists() {
        return sh;
    }
    match std::env::var_os("SHELL") {
        Some(sh) if !sh.is_empty() => PathBuf::from(sh),
        _ => PathBuf::from("sh"),
    }
}
