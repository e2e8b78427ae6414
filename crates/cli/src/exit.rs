// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Process exit codes.
//!
//! 0 = verification passed / command succeeded, 1 = negative result
//! (value mismatch, digest never recorded), 2 = fatal setup or IO error.

use std::process::ExitCode;

pub const EXIT_FATAL: u8 = 2;

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Negative,
}

impl Status {
    pub fn code(self) -> u8 {
        match self {
            Status::Success => 0,
            Status::Negative => 1,
        }
    }
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        ExitCode::from(status.code())
    }
}
