// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::commands::entry_table;
use crate::exit::Status;
use anyhow::Context;
use riscv_attest::{ledger, VerifierConfig};

pub fn run(cfg: &VerifierConfig) -> anyhow::Result<Status> {
    let entries = ledger::read_all(&cfg.ledger_path)
        .with_context(|| format!("Failed to read ledger {}", cfg.ledger_path.display()))?;

    if entries.is_empty() {
        println!("\nLedger {} has no entries.\n", cfg.ledger_path.display());
        return Ok(Status::Success);
    }

    // Entries are in append order; a timestamp going backwards means the
    // recording host's clock moved, not that the ledger was reordered.
    if entries.windows(2).any(|w| w[1].timestamp < w[0].timestamp) {
        println!("\n⚠️  WARNING: timestamps are not monotonic. Showing append order.\n");
    }

    println!("\nAudit Ledger ({} entries)\n", entries.len());
    println!("{}\n", entry_table(&entries));
    Ok(Status::Success)
}
