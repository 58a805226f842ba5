//! `modcache`: apply data mods to a cached store, or check it against a
//! server snapshot.
//!
//! Usage:
//!   modcache apply '<data-mods-array-json>' [--policy skip|abort]
//!   modcache check <project> --server <snapshot.json>
//!
//! The store document is read from stdin (blank input means an empty store)
//! and the resulting store is written to stdout. Reports and logs go to
//! stderr; set `RUST_LOG` to control log verbosity.

use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use modcache::cli::{apply_data_mods, check_project, CliError};
use modcache::data_mods::{ApplyOptions, BatchPolicy};

#[derive(Debug, Parser)]
#[command(name = "modcache", version, about = "Apply data mods and check project cache coherency")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Apply a data-mods array to the store read from stdin.
    Apply {
        /// JSON array of `{"key_path", "mode", "value"}` objects.
        mods: String,
        /// What to do with the rest of the batch after a failed mod.
        #[arg(long, default_value = "skip")]
        policy: BatchPolicy,
    },
    /// Reload a project from a server snapshot if its mod_count is stale.
    Check {
        project: String,
        /// JSON file shaped like `{"projects": {...}}`.
        #[arg(long)]
        server: PathBuf,
    },
}

fn run(cli: Cli) -> Result<(String, String), CliError> {
    let mut store = String::new();
    io::stdin().read_to_string(&mut store)?;

    match cli.command {
        Command::Apply { mods, policy } => {
            let (out, report) = apply_data_mods(&store, &mods, &ApplyOptions { policy })?;
            Ok((out, serde_json::to_string(&report)?))
        }
        Command::Check { project, server } => {
            let snapshot = std::fs::read_to_string(&server)?;
            let (out, freshness) = check_project(&store, &project, &snapshot)?;
            Ok((out, serde_json::to_string(&freshness)?))
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok((out, report)) => {
            let mut stdout = io::stdout().lock();
            if writeln!(stdout, "{out}").is_err() {
                return ExitCode::FAILURE;
            }
            eprintln!("{report}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}
