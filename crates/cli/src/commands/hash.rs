// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::exit::Status;
use anyhow::Context;
use riscv_attest::{identity, VerifierConfig};

pub fn run(cfg: &VerifierConfig) -> anyhow::Result<Status> {
    let id = identity::hash_file(&cfg.artifact)
        .with_context(|| format!("Failed to hash {}", cfg.artifact.display()))?;
    println!("{}  {}", id, cfg.artifact.display());
    Ok(Status::Success)
}
