// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Verification configuration.
//!
//! One artifact, one inspection address, one expected value. The production
//! constants live in `Default`; tests and operators build their own values
//! and hand them to [`crate::verify::Verifier`] and [`crate::ledger::Ledger`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Address the certified program writes its result to.
pub const OUTPUT_ADDR: u64 = 0x8000_1000;

/// 21 * (3 + 7 + 11 + 19) = 840.
pub const EXPECTED_VALUE: u64 = 0x348;

pub const DEFAULT_GDB_PORT: u16 = 1234;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// How the run waits for the emulator's debug listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum SettleStrategy {
    /// Retry a loopback connect until it succeeds or the budget runs out.
    Poll { budget_ms: u64, interval_ms: u64 },
    /// Sleep and hope the listener is up.
    FixedDelay { delay_ms: u64 },
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::Poll {
            budget_ms: 5_000,
            interval_ms: 50,
        }
    }
}

/// How the captured transcript is turned into a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Parse `address: value` memory-read lines and compare the value. Falls
    /// back to the literal search when no read of the address is present.
    #[default]
    Structured,
    /// Look for the zero-padded hex literal anywhere in the text.
    Substring,
}

impl std::str::FromStr for MatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s {
            "structured" => Ok(MatchMode::Structured),
            "substring" => Ok(MatchMode::Substring),
            other => Err(ConfigError::Invalid(format!("unknown match mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmulatorConfig {
    pub program: String,
    pub machine: String,
    pub extra_args: Vec<String>,
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            program: "qemu-system-riscv64".to_string(),
            machine: "virt".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebuggerConfig {
    pub program: String,
    pub extra_args: Vec<String>,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            program: "gdb-multiarch".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub artifact: PathBuf,
    /// Name written to the ledger's `artifact=` field.
    pub artifact_label: String,
    pub ledger_path: PathBuf,
    pub inspection_address: u64,
    pub expected_value: u64,
    pub emulator: EmulatorConfig,
    pub debugger: DebuggerConfig,
    pub gdb_port: u16,
    pub settle: SettleStrategy,
    pub execution_timeout_secs: u64,
    pub match_mode: MatchMode,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            artifact: PathBuf::from("data/riscv_verify.elf"),
            artifact_label: "riscv_verify.elf".to_string(),
            ledger_path: PathBuf::from("audit_ledger.log"),
            inspection_address: OUTPUT_ADDR,
            expected_value: EXPECTED_VALUE,
            emulator: EmulatorConfig::default(),
            debugger: DebuggerConfig::default(),
            gdb_port: DEFAULT_GDB_PORT,
            settle: SettleStrategy::default(),
            execution_timeout_secs: 30,
            match_mode: MatchMode::default(),
        }
    }
}

impl VerifierConfig {
    /// Load a JSON config. Missing fields fall back to the defaults.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.gdb_port == 0 {
            return Err(ConfigError::Invalid("gdb_port must be non-zero".into()));
        }
        if self.execution_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "execution_timeout_secs must be non-zero".into(),
            ));
        }
        if self.emulator.program.trim().is_empty() || self.debugger.program.trim().is_empty() {
            return Err(ConfigError::Invalid("program names must not be empty".into()));
        }
        if self.artifact_label.is_empty() || self.artifact_label.contains(['\n', '\r']) {
            return Err(ConfigError::Invalid(
                "artifact_label must be a single non-empty line".into(),
            ));
        }
        if let SettleStrategy::Poll { interval_ms: 0, .. } = self.settle {
            return Err(ConfigError::Invalid("poll interval must be non-zero".into()));
        }
        Ok(())
    }

    pub fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.execution_timeout_secs)
    }

    /// `0x` followed by 16 lowercase hex digits, as the debugger prints a giant word.
    pub fn expected_literal(&self) -> String {
        format!("{:#018x}", self.expected_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_matches_certified_program() {
        let cfg = VerifierConfig::default();
        assert_eq!(cfg.inspection_address, 0x8000_1000);
        assert_eq!(cfg.expected_value, 840);
        assert_eq!(cfg.expected_literal(), "0x0000000000000348");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_load_partial_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attest.json");
        std::fs::write(
            &path,
            r#"{ "gdb_port": 4321, "match_mode": "substring",
                 "debugger": { "program": "riscv64-elf-gdb" },
                 "settle": { "kind": "fixed_delay", "delay_ms": 10 } }"#,
        )
        .unwrap();

        let cfg = VerifierConfig::load(&path).unwrap();
        assert_eq!(cfg.gdb_port, 4321);
        assert_eq!(cfg.match_mode, MatchMode::Substring);
        assert_eq!(cfg.settle, SettleStrategy::FixedDelay { delay_ms: 10 });
        assert_eq!(cfg.expected_value, EXPECTED_VALUE);
        assert_eq!(cfg.emulator.machine, "virt");
        assert_eq!(cfg.debugger.program, "riscv64-elf-gdb");
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("attest.json");
        std::fs::write(&path, r#"{ "execution_timeout_secs": 0 }"#).unwrap();
        assert!(matches!(VerifierConfig::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(VerifierConfig::load(&path), Err(ConfigError::Parse { .. })));

        let missing = dir.path().join("missing.json");
        assert!(matches!(VerifierConfig::load(&missing), Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_label_must_be_single_line() {
        let mut cfg = VerifierConfig::default();
        cfg.artifact_label = "two\nlines".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_match_mode_from_str() {
        assert_eq!("structured".parse::<MatchMode>().unwrap(), MatchMode::Structured);
        assert_eq!("substring".parse::<MatchMode>().unwrap(), MatchMode::Substring);
        assert!("regex".parse::<MatchMode>().is_err());
    }
}
