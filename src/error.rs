// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Errors raised by a verification run.
//!
//! A value mismatch is not here: it is a `Verdict::Failed` outcome.

use crate::identity::IdentityError;
use std::process::ExitStatus;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("failed to launch {role} '{program}': {source}")]
    Launch {
        role: &'static str,
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("debug port {port} is already in use: {source}")]
    PortInUse {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("emulator debug listener on port {port} not ready after {waited_ms} ms")]
    ListenerNotReady { port: u16, waited_ms: u64 },

    #[error("emulator exited before the debugger attached ({status})")]
    EmulatorExited { status: ExitStatus },

    #[error("debugger session did not finish within {timeout_secs} s")]
    ProtocolTimeout { timeout_secs: u64 },

    #[error("failed to send script to debugger: {0}")]
    Script(#[source] std::io::Error),

    #[error("failed to capture debugger output: {0}")]
    Capture(String),
}

pub type RunResult<T> = Result<T, RunError>;
