// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use clap::{Parser, Subcommand};
use riscv_attest_cli::commands::{hash, lookup, record, timeline, verify};
use riscv_attest_cli::exit::EXIT_FATAL;
use riscv_attest_cli::options::ConfigArgs;
use riscv_attest_cli::telemetry;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "riscv-attest")]
#[command(version, about = "Deterministic-execution check and audit ledger for a RISC-V artifact", long_about = None)]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Boot the artifact under the emulator, run it to completion and check
    /// the inspected memory word. Exit 0 on pass, 1 on mismatch.
    Verify {
        /// Append a ledger entry when the run passes
        #[arg(long)]
        record: bool,
    },
    /// Append a ledger entry for the artifact's current content
    Record,
    /// Print the artifact's SHA-256 identity
    Hash,
    /// List every ledger entry in append order
    Timeline,
    /// Show when the artifact's exact content was recorded. Exit 1 if never.
    Lookup,
}

fn main() -> ExitCode {
    telemetry::init_telemetry();
    let cli = Cli::parse();

    let result = cli.config.resolve().and_then(|cfg| match cli.command {
        Commands::Verify { record } => verify::run(&cfg, record),
        Commands::Record => record::run(&cfg),
        Commands::Hash => hash::run(&cfg),
        Commands::Timeline => timeline::run(&cfg),
        Commands::Lookup => lookup::run(&cfg),
    });

    match result {
        Ok(status) => status.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}
