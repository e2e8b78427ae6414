// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! riscv-attest command line: live verification and the audit ledger.

pub mod commands;
pub mod exit;
pub mod options;
pub mod telemetry;
