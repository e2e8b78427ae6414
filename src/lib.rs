// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.

//! riscv-attest: deterministic-execution certification for a RISC-V artifact.
//!
//! A run boots the artifact in an emulator halted at entry, drives a debugger
//! over the emulator's remote-debug listener until the program finishes, reads
//! one 64-bit word back and compares it against the expected value. An
//! append-only ledger binds the artifact's SHA-256 identity to the time it
//! was recorded.

pub mod config;
pub mod debugger;
pub mod emulator;
pub mod error;
#[cfg(unix)]
pub mod fixtures;
pub mod identity;
pub mod ledger;
pub mod transcript;
pub mod verify;

pub use config::{MatchMode, SettleStrategy, VerifierConfig};
pub use error::{RunError, RunResult};
pub use identity::{ArtifactIdentity, IdentityError};
pub use ledger::{Ledger, LedgerEntry, LedgerError};
pub use transcript::Verdict;
pub use verify::{VerificationOutcome, Verifier};
