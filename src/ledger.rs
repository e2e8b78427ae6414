// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Append-only audit ledger.
//!
//! - Entries are only ever appended; nothing here truncates or rewrites
//! - Each entry is rendered in full and written with one `write_all`
//! - An exclusive advisory lock serialises appends across processes
//! - `sync_data` before returning
//!
//! # File Format
//! ```text
//! artifact=<label>
//! sha256=<64 hex chars>
//! timestamp=<unix seconds>
//! ---
//! ```

use crate::config::VerifierConfig;
use crate::identity::ArtifactIdentity;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const DELIMITER: &str = "---";

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("cannot open ledger {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot lock ledger {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("append to ledger {path} failed: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot read ledger {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt ledger block {block}: {reason}")]
    Corrupt { block: usize, reason: String },

    #[error("invalid artifact label {0:?}")]
    InvalidLabel(String),

    #[error("system clock is before the unix epoch: {0}")]
    Clock(#[source] std::time::SystemTimeError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub artifact: String,
    pub sha256: ArtifactIdentity,
    pub timestamp: u64,
}

impl LedgerEntry {
    /// The full text block, delimiter included.
    pub fn render(&self) -> String {
        format!(
            "artifact={}\nsha256={}\ntimestamp={}\n{DELIMITER}\n",
            self.artifact, self.sha256, self.timestamp
        )
    }
}

pub struct Ledger {
    path: PathBuf,
    label: String,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
        }
    }

    pub fn from_config(cfg: &VerifierConfig) -> Self {
        Self::new(cfg.ledger_path.clone(), cfg.artifact_label.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry stamped with the current wall-clock time.
    pub fn append(&self, identity: &ArtifactIdentity) -> LedgerResult<LedgerEntry> {
        let timestamp = unix_seconds(SystemTime::now())?;
        self.append_at(identity, timestamp)
    }

    pub fn append_at(&self, identity: &ArtifactIdentity, timestamp: u64) -> LedgerResult<LedgerEntry> {
        if self.label.is_empty() || self.label.contains(['\n', '\r']) {
            return Err(LedgerError::InvalidLabel(self.label.clone()));
        }
        let entry = LedgerEntry {
            artifact: self.label.clone(),
            sha256: identity.clone(),
            timestamp,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.path)
            .map_err(|source| LedgerError::Open {
                path: self.path.clone(),
                source,
            })?;
        FileExt::lock_exclusive(&file).map_err(|source| LedgerError::Lock {
            path: self.path.clone(),
            source,
        })?;

        let result = self.write_locked(&mut file, &entry);
        if let Err(e) = FileExt::unlock(&file) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release ledger lock");
        }
        result?;

        tracing::info!(
            path = %self.path.display(),
            artifact = %entry.artifact,
            sha256 = %entry.sha256,
            timestamp = entry.timestamp,
            "ledger entry appended"
        );
        Ok(entry)
    }

    fn write_locked(&self, file: &mut File, entry: &LedgerEntry) -> LedgerResult<()> {
        let write_err = |source| LedgerError::Write {
            path: self.path.clone(),
            source,
        };

        let mut record = String::new();
        // A torn tail from an earlier crash must not swallow our first line.
        if !ends_with_newline(file).map_err(write_err)? {
            tracing::warn!(path = %self.path.display(), "ledger has a torn tail");
            record.push('\n');
        }
        record.push_str(&entry.render());

        file.write_all(record.as_bytes()).map_err(write_err)?;
        file.sync_data().map_err(write_err)?;
        Ok(())
    }

    pub fn entries(&self) -> LedgerResult<Vec<LedgerEntry>> {
        read_all(&self.path)
    }
}

fn unix_seconds(now: SystemTime) -> LedgerResult<u64> {
    match now.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => Ok(elapsed.as_secs()),
        Err(e) => {
            tracing::warn!(error = %e, "refusing to record a pre-epoch timestamp");
            Err(LedgerError::Clock(e))
        }
    }
}

/// True for an empty file or one whose last byte is `\n`.
fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Read every complete entry in append order. A missing ledger is empty.
pub fn read_all(path: impl AsRef<Path>) -> LedgerResult<Vec<LedgerEntry>> {
    let path = path.as_ref();
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(LedgerError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse(&text)
}

/// Raw fields of the block being read. Values are only validated once the
/// delimiter arrives, so a torn fragment never counts as corruption.
#[derive(Default)]
struct PartialEntry {
    artifact: Option<String>,
    sha256: Option<String>,
    timestamp: Option<String>,
    stray: Option<String>,
}

impl PartialEntry {
    fn is_empty(&self) -> bool {
        self.artifact.is_none()
            && self.sha256.is_none()
            && self.timestamp.is_none()
            && self.stray.is_none()
    }

    fn finish(self, block: usize) -> LedgerResult<LedgerEntry> {
        let corrupt = |reason: String| LedgerError::Corrupt { block, reason };

        if let Some(line) = self.stray {
            return Err(corrupt(format!("unrecognised line {line:?}")));
        }
        let (Some(artifact), Some(sha256), Some(timestamp)) =
            (self.artifact, self.sha256, self.timestamp)
        else {
            return Err(corrupt("missing field before delimiter".into()));
        };
        let sha256 = ArtifactIdentity::parse(&sha256)
            .ok_or_else(|| corrupt(format!("bad digest {sha256:?}")))?;
        let timestamp = timestamp
            .parse::<u64>()
            .map_err(|_| corrupt(format!("bad timestamp {timestamp:?}")))?;

        Ok(LedgerEntry {
            artifact,
            sha256,
            timestamp,
        })
    }
}

/// Parse ledger text.
///
/// Unterminated fragments (a torn write followed by later appends, or a torn
/// final block) are skipped with a warning. A delimited block that is missing
/// a field or carries a malformed value is corruption.
pub fn parse(text: &str) -> LedgerResult<Vec<LedgerEntry>> {
    let mut entries = Vec::new();
    let mut current = PartialEntry::default();

    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        let block = entries.len() + 1;

        if line == DELIMITER {
            entries.push(std::mem::take(&mut current).finish(block)?);
            continue;
        }

        let Some((key, value)) = line.split_once('=') else {
            current.stray.get_or_insert_with(|| line.to_string());
            continue;
        };
        match key {
            "artifact" => {
                if !current.is_empty() {
                    tracing::warn!(block, "discarding unterminated ledger fragment");
                    current = PartialEntry::default();
                }
                current.artifact = Some(value.to_string());
            }
            "sha256" => current.sha256 = Some(value.to_string()),
            "timestamp" => current.timestamp = Some(value.to_string()),
            other => tracing::debug!(block, key = other, "ignoring unknown ledger field"),
        }
    }

    if !current.is_empty() {
        tracing::warn!(complete = entries.len(), "ignoring torn ledger tail");
    }
    Ok(entries)
}

/// Every entry that recorded this exact artifact content.
pub fn find_by_digest<'a>(entries: &'a [LedgerEntry], digest: &ArtifactIdentity) -> Vec<&'a LedgerEntry> {
    entries.iter().filter(|e| &e.sha256 == digest).collect()
}
