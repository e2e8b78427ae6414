// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Global options layered over the default (or a JSON file) configuration.

use anyhow::{Context, Result};
use clap::Args;
use riscv_attest::config::{MatchMode, SettleStrategy, VerifierConfig};
use std::path::PathBuf;

#[derive(Args, Debug, Default, Clone)]
pub struct ConfigArgs {
    /// JSON config file. Flags below override its values.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Artifact to certify
    #[arg(long, global = true)]
    pub artifact: Option<PathBuf>,

    /// Label written to the ledger's artifact= field
    #[arg(long, global = true)]
    pub label: Option<String>,

    /// Ledger file
    #[arg(long, global = true)]
    pub ledger: Option<PathBuf>,

    /// Emulator executable
    #[arg(long, global = true)]
    pub emulator: Option<String>,

    /// Debugger executable
    #[arg(long, global = true)]
    pub debugger: Option<String>,

    /// Loopback port for the emulator's remote-debug listener
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Give up on the debugger session after this many seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Sleep this long instead of probing the debug listener
    #[arg(long, global = true)]
    pub settle_delay_ms: Option<u64>,

    /// structured | substring
    #[arg(long, global = true)]
    pub match_mode: Option<MatchMode>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<VerifierConfig> {
        let mut cfg = match &self.config {
            Some(path) => VerifierConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => VerifierConfig::default(),
        };

        if let Some(artifact) = &self.artifact {
            cfg.artifact = artifact.clone();
        }
        if let Some(label) = &self.label {
            cfg.artifact_label = label.clone();
        }
        if let Some(ledger) = &self.ledger {
            cfg.ledger_path = ledger.clone();
        }
        if let Some(emulator) = &self.emulator {
            cfg.emulator.program = emulator.clone();
        }
        if let Some(debugger) = &self.debugger {
            cfg.debugger.program = debugger.clone();
        }
        if let Some(port) = self.port {
            cfg.gdb_port = port;
        }
        if let Some(secs) = self.timeout_secs {
            cfg.execution_timeout_secs = secs;
        }
        if let Some(delay_ms) = self.settle_delay_ms {
            cfg.settle = SettleStrategy::FixedDelay { delay_ms };
        }
        if let Some(mode) = self.match_mode {
            cfg.match_mode = mode;
        }

        cfg.validate().context("Invalid configuration")?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_is_default() {
        let cfg = ConfigArgs::default().resolve().unwrap();
        assert_eq!(cfg, VerifierConfig::default());
    }

    #[test]
    fn test_flags_override() {
        let args = ConfigArgs {
            port: Some(4444),
            settle_delay_ms: Some(700),
            match_mode: Some(MatchMode::Substring),
            label: Some("other.elf".into()),
            ..Default::default()
        };
        let cfg = args.resolve().unwrap();
        assert_eq!(cfg.gdb_port, 4444);
        assert_eq!(cfg.settle, SettleStrategy::FixedDelay { delay_ms: 700 });
        assert_eq!(cfg.match_mode, MatchMode::Substring);
        assert_eq!(cfg.artifact_label, "other.elf");
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let args = ConfigArgs {
            timeout_secs: Some(0),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
