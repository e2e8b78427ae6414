// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::exit::Status;
use anyhow::Context;
use riscv_attest::{identity, Ledger, VerifierConfig};

/// Audit flow: hash the artifact and append one ledger entry.
pub fn run(cfg: &VerifierConfig) -> anyhow::Result<Status> {
    let id = identity::hash_file(&cfg.artifact)
        .with_context(|| format!("Failed to hash {}", cfg.artifact.display()))?;
    println!("ELF SHA256: {id}");

    let ledger = Ledger::from_config(cfg);
    let entry = ledger
        .append(&id)
        .with_context(|| format!("Failed to append to {}", ledger.path().display()))?;

    println!("\nRecorded in {}:\n", ledger.path().display());
    print!("{}", entry.render());
    Ok(Status::Success)
}
