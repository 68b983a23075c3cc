// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-process info bags and the pluggable extended-info provider chain.

use crate::target::ExecutionTarget;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Write-once key/value bag attached to every process handle.
///
/// Entries are write-once-per-key, read-many: the first writer of a key
/// wins and later writes are rejected. Typical entries are discovered
/// facts such as the TTY name of a pty session.
#[derive(Debug)]
pub struct ProcessInfoBag {
    created_at: DateTime<Utc>,
    entries: RwLock<BTreeMap<String, String>>,
}

impl ProcessInfoBag {
    /// Create an empty bag stamped with the current time.
    pub fn new() -> Self {
        Self {
            created_at: Utc::now(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// When the owning process handle was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Record a fact. Returns `false` if the key was already set.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let mut guard = match self.entries.write() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        match guard.entry(key.into()) {
            std::collections::btree_map::Entry::Vacant(e) => {
                e.insert(value.into());
                true
            }
            std::collections::btree_map::Entry::Occupied(_) => false,
        }
    }

    /// Look up a previously recorded fact.
    pub fn get(&self, key: &str) -> Option<String> {
        let guard = match self.entries.read() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        guard.get(key).cloned()
    }

    /// Snapshot of all recorded facts.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let guard = match self.entries.read() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        guard.clone()
    }
}

impl Default for ProcessInfoBag {
    fn default() -> Self {
        Self::new()
    }
}

/// Richer process description resolved after launch by a provider chain.
///
/// When no provider recognises the process, the minimal fallback carries
/// only the handle's creation timestamp.
#[derive(Clone, Debug)]
pub struct ExtendedProcessInfo {
    /// Process start time, when a provider could determine it; otherwise
    /// the handle creation timestamp.
    pub started_at: DateTime<Utc>,
    /// Provider-specific attributes (resource usage, session name, ...).
    pub attrs: BTreeMap<String, String>,
}

impl ExtendedProcessInfo {
    /// Minimal fallback used when no provider matched.
    pub fn minimal(created_at: DateTime<Utc>) -> Self {
        Self {
            started_at: created_at,
            attrs: BTreeMap::new(),
        }
    }
}

/// A source of [`ExtendedProcessInfo`], keyed by (target, pid).
#[async_trait]
pub trait ExtendedInfoProvider: Send + Sync {
    /// Return richer info for the process, or `None` if this provider does
    /// not recognise it.
    async fn extended_info(
        &self,
        target: &ExecutionTarget,
        pid: u32,
    ) -> Option<ExtendedProcessInfo>;
}

/// Ask `providers` in order; the first `Some` wins. An empty chain (or no
/// match) yields [`ExtendedProcessInfo::minimal`].
pub async fn first_extended_info(
    providers: &[std::sync::Arc<dyn ExtendedInfoProvider>],
    target: &ExecutionTarget,
    pid: u32,
    created_at: DateTime<Utc>,
) -> ExtendedProcessInfo {
    for provider in providers {
        if let Some(info) = provider.extended_info(target, pid).await {
            return info;
        }
    }
    ExtendedProcessInfo::minimal(created_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct Fixed(&'static str);

    #[async_trait]
    impl ExtendedInfoProvider for Fixed {
        async fn extended_info(
            &self,
            _target: &ExecutionTarget,
            _pid: u32,
        ) -> Option<ExtendedProcessInfo> {
            let mut attrs = BTreeMap::new();
            attrs.insert("source".into(), self.0.to_string());
            Some(ExtendedProcessInfo {
                started_at: Utc::now(),
                attrs,
            })
        }
    }

    struct Never;

    #[async_trait]
    impl ExtendedInfoProvider for Never {
        async fn extended_info(
            &self,
            _target: &ExecutionTarget,
            _pid: u32,
        ) -> Option<ExtendedProcessInfo> {
            None
        }
    }

    #[test]
    fn info_bag_is_write_once_per_key() {
        let bag = ProcessInfoBag::new();
        assert!(bag.put("tty", "/dev/pts/3"));
        assert!(!bag.put("tty", "/dev/pts/9"));
        assert_eq!(bag.get("tty").as_deref(), Some("/dev/pts/3"));
    }

    #[tokio::test]
    async fn first_non_null_provider_wins() {
        let chain: Vec<Arc<dyn ExtendedInfoProvider>> =
            vec![Arc::new(Never), Arc::new(Fixed("a")), Arc::new(Fixed("b"))];
        let info =
            first_extended_info(&chain, &ExecutionTarget::local(), 42, Utc::now()).await;
        assert_eq!(info.attrs.get("source").map(String::as_str), Some("a"));
    }

    #[tokio::test]
    async fn empty_chain_falls_back_to_creation_timestamp() {
        let created = Utc::now();
        let info = first_extended_info(&[], &ExecutionTarget::local(), 42, created).await;
        assert_eq!(info.started_at, created);
        assert!(info.attrs.is_empty());
    }
}
