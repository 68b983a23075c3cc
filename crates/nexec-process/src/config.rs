// SPDX-License-Identifier: MIT OR Apache-2.0
//! Tunables for the lifecycle engine.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing knobs for launch strategies and the destruction protocol.
///
/// Owned at the composition root and handed to each builder by value;
/// there is no process-wide configuration singleton.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Grace window between SIGTERM and SIGKILL during `destroy()`.
    #[serde(with = "duration_millis")]
    pub destroy_grace: Duration,
    /// Poll interval for a remote channel's connected state.
    #[serde(with = "duration_millis")]
    pub channel_poll: Duration,
    /// Poll interval for an external terminal's PID file.
    #[serde(with = "duration_millis")]
    pub pidfile_poll: Duration,
    /// How long to keep polling for the PID file before giving up.
    #[serde(with = "duration_millis")]
    pub pidfile_deadline: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            destroy_grace: Duration::from_secs(5),
            channel_poll: Duration::from_millis(200),
            pidfile_poll: Duration::from_millis(200),
            pidfile_deadline: Duration::from_secs(30),
        }
    }
}

/// Serde helper — `Duration` as integer milliseconds.
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(val: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        val.as_millis().serialize(ser)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        let ms: u64 = u64::deserialize(de)?;
        Ok(Duration::from_millis(ms))
    }
}
