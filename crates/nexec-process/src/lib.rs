// SPDX-License-Identifier: MIT OR Apache-2.0
#![doc = include_str!("../README.md")]
//! nexec-process
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bootstrap;
pub mod cancel;
pub mod config;
pub mod error;
pub mod io;
pub mod launch;
pub mod lifecycle;
pub mod spec;
pub mod state;

pub use bootstrap::HeaderBlock;
pub use cancel::CancelToken;
pub use config::LifecycleConfig;
pub use error::{LifecycleError, SpecError};
pub use io::{InputWriter, OutputReader};
pub use launch::{HelperPaths, TerminalSpec};
pub use lifecycle::{NativeProcess, ProcessBuilder};
pub use spec::{EnvOverlay, MacroExpander, ProcessSpec};
pub use state::{ProcessState, StateCell};
