// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::exit::Status;
use anyhow::Context;
use riscv_attest::{Ledger, Verifier, VerifierConfig};

/// Live verification. With `record`, a passing run is also written to the ledger.
pub fn run(cfg: &VerifierConfig, record: bool) -> anyhow::Result<Status> {
    println!("=== RISC-V VERIFIABLE COMPUTE CHECK ===");
    println!("Artifact:   {}", cfg.artifact.display());
    println!("Address:    {:#x}", cfg.inspection_address);
    println!("Expected:   {}", cfg.expected_literal());
    println!("Running emulator + debugger...");

    let verifier = Verifier::new(cfg.clone());
    let outcome = verifier.run().context("Verification run failed")?;

    println!("ELF SHA256: {}", outcome.identity);
    println!("\nDebugger output:");
    println!("{}", outcome.transcript);

    if !outcome.passed() {
        println!("❌ VERIFICATION FAILED");
        println!("Expected: {}", cfg.expected_literal());
        match outcome.observed {
            Some(v) => println!("Observed: {v:#018x}"),
            None => println!("Observed: no read of {:#x} in output", cfg.inspection_address),
        }
        if record {
            println!("Not recording a failed run.");
        }
        return Ok(Status::Negative);
    }

    println!("✅ VERIFICATION PASSED");
    println!("Deterministic execution confirmed.");

    if record {
        let ledger = Ledger::from_config(cfg);
        let entry = ledger
            .append(&outcome.identity)
            .with_context(|| format!("Failed to append to {}", ledger.path().display()))?;
        println!("\nRecorded in {}:\n", ledger.path().display());
        print!("{}", entry.render());
    }

    Ok(Status::Success)
}
