// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Emulator process lifecycle.
//!
//! The emulator boots the artifact halted at entry with a remote-debug
//! listener on a loopback port. [`EmulatorGuard`] owns the child: dropping it
//! kills and reaps the process, so no exit path of a run can leak one.

use crate::config::{SettleStrategy, VerifierConfig};
use crate::error::{RunError, RunResult};
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

const CONNECT_ATTEMPT_TIMEOUT: Duration = Duration::from_millis(200);

/// Argument vector for the emulator, without the program name.
pub fn emulator_args(cfg: &VerifierConfig) -> Vec<String> {
    let mut args = vec![
        "-machine".to_string(),
        cfg.emulator.machine.clone(),
        "-nographic".to_string(),
        "-kernel".to_string(),
        cfg.artifact.to_string_lossy().into_owned(),
        // Halt the CPU at entry until the debugger says continue.
        "-S".to_string(),
        "-gdb".to_string(),
        format!("tcp::{}", cfg.gdb_port),
    ];
    args.extend(cfg.emulator.extra_args.iter().cloned());
    args
}

pub struct EmulatorGuard {
    child: Child,
    pid: u32,
}

impl EmulatorGuard {
    pub fn launch(cfg: &VerifierConfig) -> RunResult<Self> {
        ensure_port_free(cfg.gdb_port)?;
        let child = Command::new(&cfg.emulator.program)
            .args(emulator_args(cfg))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| RunError::Launch {
                role: "emulator",
                program: cfg.emulator.program.clone(),
                source,
            })?;
        let pid = child.id();
        tracing::info!(pid, program = %cfg.emulator.program, port = cfg.gdb_port, "emulator launched");
        Ok(Self { child, pid })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Block until the debug listener can take a connection.
    pub fn wait_ready(&mut self, port: u16, strategy: SettleStrategy) -> RunResult<()> {
        match strategy {
            SettleStrategy::FixedDelay { delay_ms } => {
                tracing::debug!(delay_ms, "fixed settle delay");
                std::thread::sleep(Duration::from_millis(delay_ms));
                self.ensure_running()
            }
            SettleStrategy::Poll {
                budget_ms,
                interval_ms,
            } => self.poll_listener(port, budget_ms, interval_ms),
        }
    }

    fn poll_listener(&mut self, port: u16, budget_ms: u64, interval_ms: u64) -> RunResult<()> {
        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
        let started = Instant::now();
        let deadline = started + Duration::from_millis(budget_ms);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match TcpStream::connect_timeout(&addr, CONNECT_ATTEMPT_TIMEOUT) {
                Ok(stream) => {
                    drop(stream);
                    // Whoever accepted must be the emulator we launched.
                    self.ensure_running()?;
                    tracing::info!(
                        attempts,
                        waited_ms = started.elapsed().as_millis() as u64,
                        "debug listener ready"
                    );
                    return Ok(());
                }
                Err(e) => tracing::trace!(attempts, error = %e, "listener not ready"),
            }

            self.ensure_running()?;

            if Instant::now() >= deadline {
                return Err(RunError::ListenerNotReady {
                    port,
                    waited_ms: started.elapsed().as_millis() as u64,
                });
            }
            std::thread::sleep(Duration::from_millis(interval_ms));
        }
    }

    fn ensure_running(&mut self) -> RunResult<()> {
        match self.child.try_wait() {
            Ok(Some(status)) => Err(RunError::EmulatorExited { status }),
            Ok(None) => Ok(()),
            // Status unknown; let the debugger find out.
            Err(e) => {
                tracing::warn!(error = %e, "could not poll emulator status");
                Ok(())
            }
        }
    }
}

/// Fails if something already listens on the debug port. The emulator would
/// not be able to bind it, and the debugger would attach to the wrong process.
fn ensure_port_free(port: u16) -> RunResult<()> {
    match TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port))) {
        Ok(listener) => {
            drop(listener);
            Ok(())
        }
        Err(source) => {
            tracing::error!(port, error = %source, "debug port already taken");
            Err(RunError::PortInUse { port, source })
        }
    }
}

impl Drop for EmulatorGuard {
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(pid = self.pid, %status, "emulator already exited");
                return;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(pid = self.pid, error = %e, "could not poll emulator"),
        }
        if let Err(e) = self.child.kill() {
            tracing::warn!(pid = self.pid, error = %e, "failed to kill emulator");
        }
        match self.child.wait() {
            Ok(status) => tracing::info!(pid = self.pid, %status, "emulator terminated"),
            Err(e) => tracing::warn!(pid = self.pid, error = %e, "failed to reap emulator"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_emulator_args() {
        let mut cfg = VerifierConfig::default();
        cfg.artifact = PathBuf::from("data/riscv_verify.elf");
        cfg.emulator.extra_args = vec!["-m".into(), "128M".into()];

        assert_eq!(
            emulator_args(&cfg),
            vec![
                "-machine", "virt", "-nographic", "-kernel", "data/riscv_verify.elf", "-S", "-gdb",
                "tcp::1234", "-m", "128M",
            ]
        );
    }

    #[test]
    fn test_taken_port_refuses_launch() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let mut cfg = VerifierConfig::default();
        cfg.gdb_port = listener.local_addr().unwrap().port();
        cfg.emulator.program = "/nonexistent/qemu-system-riscv64".into();

        // Checked before spawning, so the missing program is never reached.
        match EmulatorGuard::launch(&cfg) {
            Err(RunError::PortInUse { port, .. }) => assert_eq!(port, cfg.gdb_port),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("launch should fail"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_listener_accepted_only_while_emulator_runs() {
        let dir = tempfile::tempdir().unwrap();
        let crashing = crate::fixtures::write_crashing_emulator(dir.path()).unwrap();
        let mut cfg = VerifierConfig::default();
        cfg.artifact = dir.path().join("fixture.elf");
        cfg.emulator.program = crashing.to_string_lossy().into_owned();
        cfg.gdb_port = crate::fixtures::free_port().unwrap();

        let mut guard = EmulatorGuard::launch(&cfg).unwrap();
        guard.child.wait().unwrap();

        // Someone else answers on the port after the emulator died.
        let foreign = TcpListener::bind(("127.0.0.1", cfg.gdb_port)).unwrap();
        let strategy = SettleStrategy::Poll {
            budget_ms: 1_000,
            interval_ms: 20,
        };
        match guard.wait_ready(cfg.gdb_port, strategy) {
            Err(RunError::EmulatorExited { status }) => assert_eq!(status.code(), Some(3)),
            other => panic!("unexpected result: {:?}", other.err()),
        }
        drop(foreign);
    }

    #[test]
    fn test_missing_emulator_is_launch_error() {
        let mut cfg = VerifierConfig::default();
        cfg.emulator.program = "/nonexistent/qemu-system-riscv64".into();
        cfg.gdb_port = TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .unwrap()
            .port();
        match EmulatorGuard::launch(&cfg) {
            Err(RunError::Launch { role, .. }) => assert_eq!(role, "emulator"),
            Err(e) => panic!("unexpected error: {e}"),
            Ok(_) => panic!("launch should fail"),
        }
    }
}
