// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Scripted debugger session.
//!
//! The debugger is started against the artifact for symbol context and fed a
//! fixed command script on stdin. Its stdout and stderr are drained by helper
//! threads while the calling thread waits on the child with a deadline.

use crate::config::VerifierConfig;
use crate::error::{RunError, RunResult};
use std::io::{Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

/// How long to wait for pipe readers after the debugger has been killed.
const READER_JOIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Connect, run the program to its end state, read one giant word, leave.
pub fn render_script(cfg: &VerifierConfig) -> String {
    format!(
        "target remote :{port}\ncontinue\nx/gx {addr:#x}\nquit\n",
        port = cfg.gdb_port,
        addr = cfg.inspection_address,
    )
}

pub fn debugger_args(cfg: &VerifierConfig) -> Vec<String> {
    let mut args = vec!["--quiet".to_string()];
    args.extend(cfg.debugger.extra_args.iter().cloned());
    args.push(cfg.artifact.to_string_lossy().into_owned());
    args
}

/// Run the session and return stdout followed by stderr as one text buffer.
///
/// The debugger is expected to exit on its own after `quit`. If it is still
/// running when the execution timeout expires it is killed and the run fails
/// with [`RunError::ProtocolTimeout`].
pub fn run_session(cfg: &VerifierConfig) -> RunResult<String> {
    let mut child = Command::new(&cfg.debugger.program)
        .args(debugger_args(cfg))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| RunError::Launch {
            role: "debugger",
            program: cfg.debugger.program.clone(),
            source,
        })?;
    tracing::info!(pid = child.id(), program = %cfg.debugger.program, "debugger attached");

    let stdout = child.stdout.take().map(spawn_reader);
    let stderr = child.stderr.take().map(spawn_reader);

    if let Some(mut stdin) = child.stdin.take() {
        let script = render_script(cfg);
        if let Err(e) = stdin.write_all(script.as_bytes()) {
            drop(stdin);
            abort_session(child, stdout, stderr);
            return Err(RunError::Script(e));
        }
        // stdin drops here, closing the pipe so the debugger sees EOF after quit.
    }

    let timeout = cfg.execution_timeout();
    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) => {
            tracing::warn!(timeout_secs = cfg.execution_timeout_secs, "debugger session timed out");
            abort_session(child, stdout, stderr);
            return Err(RunError::ProtocolTimeout {
                timeout_secs: cfg.execution_timeout_secs,
            });
        }
        Err(e) => {
            abort_session(child, stdout, stderr);
            return Err(RunError::Capture(format!("failed to wait for debugger: {e}")));
        }
    };
    if status.success() {
        tracing::debug!(%status, "debugger exited");
    } else {
        // The transcript still decides the verdict.
        tracing::warn!(%status, "debugger exited with failure status");
    }

    let mut combined = join_bounded(stdout)?;
    combined.extend(join_bounded(stderr)?);
    let text = String::from_utf8_lossy(&combined).into_owned();
    tracing::info!(bytes = text.len(), "transcript captured");
    Ok(text)
}

fn spawn_reader<R: Read + Send + 'static>(mut pipe: R) -> Reader {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

/// Join a reader thread, giving up after [`READER_JOIN_TIMEOUT`] when a
/// descendant of the debugger still holds the pipe open.
fn join_bounded(handle: Option<Reader>) -> RunResult<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    let deadline = Instant::now() + READER_JOIN_TIMEOUT;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return Err(RunError::Capture("output pipe still open after debugger exit".into()));
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    match handle.join() {
        Ok(Ok(buf)) => Ok(buf),
        Ok(Err(e)) => Err(RunError::Capture(e.to_string())),
        Err(_) => Err(RunError::Capture("output reader panicked".into())),
    }
}

type Reader = JoinHandle<std::io::Result<Vec<u8>>>;

/// Kill the debugger and collect whatever its readers got before the pipes
/// closed. Returns the partial stdout then stderr.
fn abort_session(mut child: Child, stdout: Option<Reader>, stderr: Option<Reader>) -> Vec<u8> {
    kill_and_reap(&mut child);
    drop(child);
    let mut partial = Vec::new();
    for reader in [stdout, stderr] {
        match join_bounded(reader) {
            Ok(buf) => partial.extend(buf),
            Err(e) => tracing::warn!(error = %e, "abandoned debugger output reader"),
        }
    }
    tracing::debug!(bytes = partial.len(), "partial debugger output discarded");
    partial
}

fn kill_and_reap(child: &mut Child) {
    if let Err(e) = child.kill() {
        tracing::warn!(error = %e, "failed to kill debugger");
    }
    let _ = child.wait();
}
