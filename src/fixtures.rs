// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Test doubles for the emulator and the debugger.
//!
//! Each stub is a small shell script written into a scratch directory. The
//! emulator stub records its PID and sleeps; the debugger stubs record the
//! script they were fed and then print a canned transcript, fail, or hang.

use crate::config::{SettleStrategy, VerifierConfig};
use std::fs;
use std::io;
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// What the certified program leaves at the inspection address.
pub const PASSING_TRANSCRIPT: &str = "\
Reading symbols from riscv_verify.elf...
(gdb) Remote debugging using :1234
0x0000000000001000 in ?? ()
(gdb) Continuing.

Program received signal SIGTRAP, Trace/breakpoint trap.
0x0000000080000040 in _start ()
(gdb) 0x80001000:\t0x0000000000000348
(gdb) A debugging session is active.
";

pub const MISMATCH_TRANSCRIPT: &str = "\
(gdb) Remote debugging using :1234
(gdb) Continuing.
(gdb) 0x80001000:\t0x0000000000000347
";

pub struct StubEmulator {
    pub program: PathBuf,
    pub pid_file: PathBuf,
}

impl StubEmulator {
    /// PID the stub recorded, once it has started.
    pub fn recorded_pid(&self) -> Option<u32> {
        fs::read_to_string(&self.pid_file).ok()?.trim().parse().ok()
    }
}

pub struct StubDebugger {
    pub program: PathBuf,
    pub stdin_file: PathBuf,
}

impl StubDebugger {
    pub fn received_script(&self) -> io::Result<String> {
        fs::read_to_string(&self.stdin_file)
    }
}

pub fn write_artifact(dir: &Path, content: &[u8]) -> io::Result<PathBuf> {
    let path = dir.join("fixture.elf");
    fs::write(&path, content)?;
    Ok(path)
}

/// Records `$$` then becomes a long sleep, so the recorded PID is the
/// process the guard has to kill.
pub fn write_stub_emulator(dir: &Path) -> io::Result<StubEmulator> {
    let pid_file = dir.join("emulator.pid");
    let body = format!("echo $$ > '{}'\nexec sleep 60\n", pid_file.display());
    let program = write_script(dir, "stub-emulator", &body)?;
    Ok(StubEmulator { program, pid_file })
}

/// An emulator that dies straight away.
pub fn write_crashing_emulator(dir: &Path) -> io::Result<PathBuf> {
    write_script(dir, "crashing-emulator", "exit 3\n")
}

/// Drains stdin, waits `delay_ms`, prints `transcript` on stdout and a
/// diagnostic on stderr.
pub fn write_stub_debugger(dir: &Path, transcript: &str, delay_ms: u64) -> io::Result<StubDebugger> {
    let stdin_file = dir.join("debugger.stdin");
    let transcript_file = dir.join("debugger.transcript");
    fs::write(&transcript_file, transcript)?;
    let body = format!(
        "cat > '{stdin}'\nsleep {delay}\ncat '{transcript}'\necho 'warning: stub debugger' >&2\n",
        stdin = stdin_file.display(),
        delay = delay_ms as f64 / 1000.0,
        transcript = transcript_file.display(),
    );
    let program = write_script(dir, "stub-debugger", &body)?;
    Ok(StubDebugger { program, stdin_file })
}

/// Drains stdin and then never returns, like `continue` on a program that
/// never halts.
pub fn write_hanging_debugger(dir: &Path) -> io::Result<StubDebugger> {
    let stdin_file = dir.join("debugger.stdin");
    let body = format!("cat > '{}'\nexec sleep 60\n", stdin_file.display());
    let program = write_script(dir, "hanging-debugger", &body)?;
    Ok(StubDebugger { program, stdin_file })
}

fn write_script(dir: &Path, name: &str, body: &str) -> io::Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}"))?;
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
    Ok(path)
}

/// A config that runs entirely inside `dir` against the given stubs.
///
/// Uses a short fixed settle delay and a fresh loopback port; tests that
/// poll the listener override `settle` themselves.
pub fn stub_config(dir: &Path, artifact: &Path, emulator: &Path, debugger: &Path) -> VerifierConfig {
    let mut cfg = VerifierConfig::default();
    if let Ok(port) = free_port() {
        cfg.gdb_port = port;
    }
    cfg.artifact = artifact.to_path_buf();
    cfg.artifact_label = "fixture.elf".to_string();
    cfg.ledger_path = dir.join("audit_ledger.log");
    cfg.emulator.program = emulator.to_string_lossy().into_owned();
    cfg.debugger.program = debugger.to_string_lossy().into_owned();
    cfg.settle = SettleStrategy::FixedDelay { delay_ms: 50 };
    cfg.execution_timeout_secs = 10;
    cfg
}

/// A loopback port nothing is listening on (at the time of the call).
pub fn free_port() -> io::Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// `kill -0`: true while the PID names a live (or unreaped) process.
pub fn process_alive(pid: u32) -> bool {
    Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
