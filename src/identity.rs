// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Content-addressed artifact identity.
//!
//! The identity is the lowercase hex SHA-256 of the artifact's full byte
//! content. Both the verification run and the ledger key off it.

use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("cannot open artifact {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read failed while hashing {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type IdentityResult<T> = Result<T, IdentityError>;

/// 64 lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactIdentity(String);

impl ArtifactIdentity {
    pub fn from_digest(digest: [u8; 32]) -> Self {
        Self(hex::encode(digest))
    }

    /// Accepts a hex digest read back from the ledger. Uppercase input is
    /// normalised so comparisons stay byte-exact.
    pub fn parse(hex_str: &str) -> Option<Self> {
        let mut raw = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut raw).ok()?;
        Some(Self::from_digest(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stream the file through SHA-256.
///
/// The handle is dropped on every exit path; a failed read returns an error
/// and no digest.
pub fn hash_file(path: impl AsRef<Path>) -> IdentityResult<ArtifactIdentity> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| IdentityError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(IdentityError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        hasher.update(&buf[..n]);
    }

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&hasher.finalize());
    let identity = ArtifactIdentity::from_digest(digest);
    tracing::debug!(path = %path.display(), sha256 = %identity, "hashed artifact");
    Ok(identity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_known_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        std::fs::write(&path, b"abc").unwrap();

        let id = hash_file(&path).unwrap();
        assert_eq!(
            id.as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_empty_file_digest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.bin");
        std::fs::write(&path, b"").unwrap();

        let id = hash_file(&path).unwrap();
        assert_eq!(
            id.as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_deterministic_and_sensitive_to_one_byte() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.elf");
        let b = dir.path().join("b.elf");
        let mut content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&a, &content).unwrap();
        content[150_000] ^= 0x01;
        std::fs::write(&b, &content).unwrap();

        assert_eq!(hash_file(&a).unwrap(), hash_file(&a).unwrap());
        assert_ne!(hash_file(&a).unwrap(), hash_file(&b).unwrap());
    }

    #[test]
    fn test_missing_file_is_open_error() {
        let dir = tempdir().unwrap();
        let err = hash_file(dir.path().join("nope.elf")).unwrap_err();
        assert!(matches!(err, IdentityError::Open { .. }));
    }

    #[test]
    fn test_parse_normalises_case() {
        let upper = "BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD";
        let id = ArtifactIdentity::parse(upper).unwrap();
        assert_eq!(id.as_str(), upper.to_ascii_lowercase());
        assert!(ArtifactIdentity::parse("abc").is_none());
        assert!(ArtifactIdentity::parse(&"zz".repeat(32)).is_none());
    }
}
