// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![cfg(unix)]

use riscv_attest::fixtures::{self, MISMATCH_TRANSCRIPT, PASSING_TRANSCRIPT};
use riscv_attest::{identity, ledger, VerifierConfig};
use riscv_attest_cli::commands::{hash, lookup, record, timeline, verify};
use riscv_attest_cli::exit::Status;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

const ARTIFACT: &[u8] = b"\x7fELF\x02\x01\x01\0cli fixture";

fn setup(dir: &Path, transcript: &str) -> VerifierConfig {
    let artifact = fixtures::write_artifact(dir, ARTIFACT).unwrap();
    let emu = fixtures::write_stub_emulator(dir).unwrap();
    let dbg = fixtures::write_stub_debugger(dir, transcript, 100).unwrap();
    fixtures::stub_config(dir, &artifact, &emu.program, &dbg.program)
}

#[test]
fn test_verify_and_record_workflow() {
    let dir = tempdir().unwrap();
    let cfg = setup(dir.path(), PASSING_TRANSCRIPT);

    assert_eq!(verify::run(&cfg, true).unwrap(), Status::Success);
    assert_eq!(record::run(&cfg).unwrap(), Status::Success);

    let entries = ledger::read_all(&cfg.ledger_path).unwrap();
    assert_eq!(entries.len(), 2);
    let digest = identity::hash_file(&cfg.artifact).unwrap();
    assert!(entries.iter().all(|e| e.sha256 == digest));

    assert_eq!(lookup::run(&cfg).unwrap(), Status::Success);
    assert_eq!(timeline::run(&cfg).unwrap(), Status::Success);
    assert_eq!(hash::run(&cfg).unwrap(), Status::Success);
}

#[test]
fn test_failed_run_is_not_recorded() {
    let dir = tempdir().unwrap();
    let cfg = setup(dir.path(), MISMATCH_TRANSCRIPT);

    assert_eq!(verify::run(&cfg, true).unwrap(), Status::Negative);
    assert!(ledger::read_all(&cfg.ledger_path).unwrap().is_empty());
    assert_eq!(lookup::run(&cfg).unwrap(), Status::Negative);
}

#[test]
fn test_lookup_misses_modified_artifact() {
    let dir = tempdir().unwrap();
    let cfg = setup(dir.path(), PASSING_TRANSCRIPT);
    record::run(&cfg).unwrap();

    let mut tampered = ARTIFACT.to_vec();
    tampered[9] ^= 0xff;
    std::fs::write(&cfg.artifact, tampered).unwrap();
    assert_eq!(lookup::run(&cfg).unwrap(), Status::Negative);
}

#[test]
fn test_fatal_errors_propagate() {
    let dir = tempdir().unwrap();
    let mut cfg = setup(dir.path(), PASSING_TRANSCRIPT);
    cfg.artifact = dir.path().join("missing.elf");

    assert!(verify::run(&cfg, false).is_err());
    assert!(record::run(&cfg).is_err());
    assert!(hash::run(&cfg).is_err());
}

fn cli(cfg: &VerifierConfig, subcommand: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_riscv-attest"))
        .arg("--artifact")
        .arg(&cfg.artifact)
        .arg("--ledger")
        .arg(&cfg.ledger_path)
        .args(["--emulator", cfg.emulator.program.as_str()])
        .args(["--debugger", cfg.debugger.program.as_str()])
        .args(["--label", "fixture.elf", "--settle-delay-ms", "50"])
        .arg("--port")
        .arg(cfg.gdb_port.to_string())
        .args(subcommand)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to spawn riscv-attest")
}

#[test]
fn test_exit_codes() {
    let dir = tempdir().unwrap();
    let cfg = setup(dir.path(), PASSING_TRANSCRIPT);

    let out = cli(&cfg, &["verify", "--record"]);
    assert_eq!(out.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    assert!(String::from_utf8_lossy(&out.stdout).contains("VERIFICATION PASSED"));
    assert_eq!(ledger::read_all(&cfg.ledger_path).unwrap().len(), 1);

    assert_eq!(cli(&cfg, &["lookup"]).status.code(), Some(0));

    let mismatch_dir = tempdir().unwrap();
    let mismatch = setup(mismatch_dir.path(), MISMATCH_TRANSCRIPT);
    let out = cli(&mismatch, &["verify"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("VERIFICATION FAILED"));
    assert_eq!(cli(&mismatch, &["lookup"]).status.code(), Some(1));

    let mut broken = cfg.clone();
    broken.artifact = dir.path().join("missing.elf");
    let out = cli(&broken, &["verify"]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("error:"));
}
