// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Verification run.
//!
//! launch -> settle -> attach -> capture -> decide -> teardown, strictly in
//! that order, one attempt, no retries. Teardown is the emulator guard going
//! out of scope, which also covers every early `?` return.

use crate::config::VerifierConfig;
use crate::debugger;
use crate::emulator::EmulatorGuard;
use crate::error::RunResult;
use crate::identity::{self, ArtifactIdentity};
use crate::transcript::{self, Verdict};

#[derive(Debug, Clone)]
pub struct VerificationOutcome {
    pub verdict: Verdict,
    pub identity: ArtifactIdentity,
    /// Combined debugger output, verbatim.
    pub transcript: String,
    pub expected: u64,
    pub observed: Option<u64>,
    /// PID of the emulator this run launched and reaped.
    pub emulator_pid: u32,
}

impl VerificationOutcome {
    pub fn passed(&self) -> bool {
        self.verdict.is_pass()
    }
}

pub struct Verifier {
    cfg: VerifierConfig,
}

impl Verifier {
    pub fn new(cfg: VerifierConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.cfg
    }

    pub fn run(&self) -> RunResult<VerificationOutcome> {
        let cfg = &self.cfg;
        let identity = identity::hash_file(&cfg.artifact)?;
        tracing::info!(artifact = %cfg.artifact.display(), sha256 = %identity, "starting verification");

        let mut emulator = EmulatorGuard::launch(cfg)?;
        let emulator_pid = emulator.pid();
        emulator.wait_ready(cfg.gdb_port, cfg.settle)?;

        let text = debugger::run_session(cfg)?;

        let decision = transcript::decide(
            &text,
            cfg.inspection_address,
            cfg.expected_value,
            cfg.match_mode,
        );
        match decision.observed {
            Some(observed) => tracing::info!(
                verdict = %decision.verdict,
                observed = %format!("{observed:#018x}"),
                expected = %cfg.expected_literal(),
                "decision"
            ),
            None => tracing::info!(
                verdict = %decision.verdict,
                expected = %cfg.expected_literal(),
                mode = ?cfg.match_mode,
                "decision"
            ),
        }

        drop(emulator);

        Ok(VerificationOutcome {
            verdict: decision.verdict,
            identity,
            transcript: text,
            expected: cfg.expected_value,
            observed: decision.observed,
            emulator_pid,
        })
    }
}
