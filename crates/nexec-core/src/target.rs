// SPDX-License-Identifier: MIT OR Apache-2.0
//! Execution targets — where a process runs — and their interning registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

/// Hostname spellings that always resolve to the shared local target.
const LOOPBACK_FORMS: &[&str] = &["localhost", "127.0.0.1", "::1", "[::1]"];

/// Default SSH port used when a remote target is created with port `0`.
const DEFAULT_REMOTE_PORT: u16 = 22;

/// Identifies where a process runs: the local host, or `user@host:port`
/// reachable over an authenticated transport.
///
/// Port `0` is the sentinel for "no transport needed" — i.e. the local
/// machine. Targets are interned: [`ExecutionTarget::local`] and
/// [`ExecutionTarget::from_key`] hand out shared `Arc`s, so repeated
/// deserialization of the same key yields pointer-equal instances in
/// addition to value equality.
#[derive(Debug, Eq)]
pub struct ExecutionTarget {
    user: String,
    host: String,
    port: u16,
}

impl PartialEq for ExecutionTarget {
    fn eq(&self, other: &Self) -> bool {
        if self.is_local() && other.is_local() {
            return true;
        }
        self.user == other.user && self.host == other.host && self.port == other.port
    }
}

impl std::hash::Hash for ExecutionTarget {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        if self.is_local() {
            0u16.hash(state);
        } else {
            self.user.hash(state);
            self.host.hash(state);
            self.port.hash(state);
        }
    }
}

impl ExecutionTarget {
    /// The single shared local target.
    pub fn local() -> Arc<ExecutionTarget> {
        static LOCAL: OnceLock<Arc<ExecutionTarget>> = OnceLock::new();
        LOCAL
            .get_or_init(|| {
                Arc::new(ExecutionTarget {
                    user: current_os_user(),
                    host: "localhost".into(),
                    port: 0,
                })
            })
            .clone()
    }

    /// Create (or fetch the interned copy of) a target.
    ///
    /// An empty `user` is normalized to the current OS user and an empty
    /// `host` to the loopback name. A zero `port` on a loopback host yields
    /// the shared local target; on any other host it defaults to the SSH
    /// port. IPv6 hosts are bracket-normalized.
    pub fn create(user: &str, host: &str, port: u16) -> Arc<ExecutionTarget> {
        let host = normalize_host(host);
        if port == 0 && is_loopback(&host) {
            return Self::local();
        }
        let user = if user.is_empty() {
            current_os_user()
        } else {
            user.to_string()
        };
        let port = if port == 0 { DEFAULT_REMOTE_PORT } else { port };
        intern(ExecutionTarget { user, host, port })
    }

    /// `true` when no transport is needed to reach this target.
    pub fn is_local(&self) -> bool {
        self.port == 0
    }

    /// Login user on the target.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Hostname, bracket-normalized for IPv6.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Transport port; `0` for the local target.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Canonical string form used for persistence: `user@host:port`, or
    /// `"localhost"` for the local target.
    pub fn to_key(&self) -> String {
        if self.is_local() {
            "localhost".into()
        } else {
            format!("{}@{}:{}", self.user, self.host, self.port)
        }
    }

    /// Deserialize a key produced by [`ExecutionTarget::to_key`].
    ///
    /// All loopback spellings return the shared local target. Results are
    /// memoized, so deserializing the same key twice yields the same
    /// instance.
    pub fn from_key(key: &str) -> Arc<ExecutionTarget> {
        if is_loopback(key) {
            return Self::local();
        }
        if let Some(found) = registry_get(key) {
            return found;
        }

        let (user, rest) = match key.split_once('@') {
            Some((u, r)) => (u.to_string(), r),
            None => (current_os_user(), key),
        };
        let (host, port) = split_host_port(rest);
        Self::create(&user, &host, port)
    }
}

impl fmt::Display for ExecutionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

fn registry() -> &'static RwLock<HashMap<String, Arc<ExecutionTarget>>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, Arc<ExecutionTarget>>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

fn registry_get(key: &str) -> Option<Arc<ExecutionTarget>> {
    let guard = match registry().read() {
        Ok(g) => g,
        Err(p) => p.into_inner(),
    };
    guard.get(key).cloned()
}

fn intern(target: ExecutionTarget) -> Arc<ExecutionTarget> {
    let key = target.to_key();
    let mut guard = match registry().write() {
        Ok(g) => g,
        Err(p) => p.into_inner(),
    };
    guard
        .entry(key)
        .or_insert_with(|| Arc::new(target))
        .clone()
}

fn current_os_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".into())
}

fn normalize_host(host: &str) -> String {
    if host.is_empty() {
        return "localhost".into();
    }
    // Bare IPv6 literals get brackets so `host:port` stays parseable.
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

fn is_loopback(host: &str) -> bool {
    LOOPBACK_FORMS.contains(&host)
}

/// Split `host[:port]`, honoring bracketed IPv6 literals. A missing or
/// unparseable port yields `0` (which `create` then defaults).
fn split_host_port(rest: &str) -> (String, u16) {
    if let Some(end) = rest.find(']') {
        let host = rest[..=end].to_string();
        let port = rest[end + 1..]
            .strip_prefix(':')
            .and_then(|p| p.parse().ok())
            .unwrap_or(0);
        return (host, port);
    }
    match rest.rsplit_once(':') {
        Some((host, port)) => (host.to_string(), port.parse().unwrap_or(0)),
        None => (rest.to_string(), 0),
    }
}
