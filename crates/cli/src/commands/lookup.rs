// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::commands::entry_table;
use crate::exit::Status;
use anyhow::Context;
use riscv_attest::{identity, ledger, VerifierConfig};

/// Was this exact artifact content ever recorded, and when?
pub fn run(cfg: &VerifierConfig) -> anyhow::Result<Status> {
    let id = identity::hash_file(&cfg.artifact)
        .with_context(|| format!("Failed to hash {}", cfg.artifact.display()))?;
    let entries = ledger::read_all(&cfg.ledger_path)
        .with_context(|| format!("Failed to read ledger {}", cfg.ledger_path.display()))?;

    let hits = ledger::find_by_digest(&entries, &id);
    if hits.is_empty() {
        println!("\n❌ NOT RECORDED\n");
        println!("SHA256: {id}");
        println!("No entry in {} matches this artifact.\n", cfg.ledger_path.display());
        return Ok(Status::Negative);
    }

    println!("\n✅ RECORDED {} time(s)\n", hits.len());
    println!("SHA256: {id}\n");
    println!("{}\n", entry_table(hits));
    Ok(Status::Success)
}
