// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! nexec-core
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod host;
pub mod info;
pub mod signal;
pub mod target;

pub use host::{HostInfo, HostInfoProvider, LocalHostInfoProvider, OsFamily, StaticHostInfoProvider};
pub use info::{ExtendedInfoProvider, ExtendedProcessInfo, ProcessInfoBag, first_extended_info};
pub use signal::{
    RecordedSignal, RecordingDispatcher, ShellSignalDispatcher, Signal, SignalDispatcher,
    SignalError,
};
pub use target::ExecutionTarget;
