// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Debugger transcript parsing and the pass/fail decision.
//!
//! The debugger prints a memory read as
//!
//! ```text
//! (gdb) 0x80001000:	0x0000000000000348
//! (gdb) 0x80001000 <result>:	0x0000000000000348
//! ```
//!
//! Grammar for one line: `("(gdb)" ws)* hex-address ws [ "<" symbol ">" ] ":" ws hex-value`.
//! Everything else in the transcript (banners, warnings, stop reasons) is ignored.

use crate::config::MatchMode;
use serde::Serialize;
use std::fmt;

const PROMPT: &str = "(gdb)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        self == Verdict::Passed
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Passed => f.write_str("PASSED"),
            Verdict::Failed => f.write_str("FAILED"),
        }
    }
}

/// One `address: value` line lifted out of the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRead {
    pub address: u64,
    pub value: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub verdict: Verdict,
    /// Value found at the inspection address. `None` when the literal rule decided.
    pub observed: Option<u64>,
}

/// Decide the run from the captured text.
///
/// In structured mode the last read of `address` wins. When no read of
/// `address` parses, the substring rule decides instead. Substring mode
/// passes iff the zero-padded literal of `expected` occurs anywhere.
pub fn decide(text: &str, address: u64, expected: u64, mode: MatchMode) -> Decision {
    match mode {
        MatchMode::Structured => {
            let observed = parse_memory_reads(text)
                .into_iter()
                .filter(|r| r.address == address)
                .last()
                .map(|r| r.value);
            match observed {
                Some(v) => Decision {
                    verdict: if v == expected {
                        Verdict::Passed
                    } else {
                        Verdict::Failed
                    },
                    observed,
                },
                None => {
                    tracing::debug!(address, "no memory read parsed, falling back to literal match");
                    decide_by_literal(text, expected)
                }
            }
        }
        MatchMode::Substring => decide_by_literal(text, expected),
    }
}

fn decide_by_literal(text: &str, expected: u64) -> Decision {
    let verdict = if contains_literal(text, expected) {
        Verdict::Passed
    } else {
        Verdict::Failed
    };
    Decision {
        verdict,
        observed: None,
    }
}

pub fn contains_literal(text: &str, expected: u64) -> bool {
    text.contains(&format!("{:#018x}", expected))
}

pub fn parse_memory_reads(text: &str) -> Vec<MemoryRead> {
    text.lines().filter_map(parse_line).collect()
}

fn parse_line(line: &str) -> Option<MemoryRead> {
    let mut rest = line.trim_start();
    while let Some(after) = rest.strip_prefix(PROMPT) {
        rest = after.trim_start();
    }

    let (address, after_addr) = take_hex(rest)?;
    let mut rest = after_addr.trim_start();

    if let Some(sym) = rest.strip_prefix('<') {
        let end = sym.find('>')?;
        rest = sym[end + 1..].trim_start();
    }

    rest = rest.strip_prefix(':')?;
    // A bare address line with nothing after the colon is not a read.
    let (value, _) = take_hex(rest.trim_start())?;

    Some(MemoryRead { address, value })
}

/// `0x` followed by 1..=16 hex digits, terminated by a non-hex character.
fn take_hex(s: &str) -> Option<(u64, &str)> {
    let body = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    let end = body
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(body.len());
    if end == 0 || end > 16 {
        return None;
    }
    let value = u64::from_str_radix(&body[..end], 16).ok()?;
    Some((value, &body[end..]))
}
