// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Command-line front end: opens a datastore, runs one command, shuts down.
//!
//! Usage:
//!   voxdag --data-dir ./vox datasets new
//!   voxdag --data-dir ./vox dataset 3f8c new voxels grayscale BlockSize=32
//!   voxdag --data-dir ./vox node 3f8c lock
//!   voxdag --memory help

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

use voxdag::datastore::{Datastore, DatastoreConfig};
use voxdag::server::{Request, RpcConnection};
use voxdag::storage::DurabilityMode;

/// Versioned datastore for chunked image volumes.
#[derive(Parser, Debug)]
#[command(name = "voxdag", version, about)]
struct Args {
    /// RocksDB data directory. Created if missing.
    #[arg(long, default_value = "voxdag.db", conflicts_with = "memory")]
    data_dir: PathBuf,

    /// Use a volatile in-memory datastore instead of --data-dir.
    #[arg(long, default_value_t = false)]
    memory: bool,

    /// Fsync every write instead of relying on the write-ahead log.
    #[arg(long, default_value_t = false)]
    fsync: bool,

    /// Default log filter when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Command tokens, e.g. `node 3f8c branch`. `key=value` tokens are
    /// passed as settings.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

fn initialize_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &Args) -> DatastoreConfig {
    let config = if args.memory {
        DatastoreConfig::memory()
    } else {
        DatastoreConfig::rocksdb(&args.data_dir)
    };
    let durability = if args.fsync {
        DurabilityMode::FsyncEveryWrite
    } else {
        DurabilityMode::WalOnly
    };
    config.with_durability(durability)
}

fn run(args: &Args) -> anyhow::Result<()> {
    let store = Datastore::open_with_config(&build_config(args))?;

    let request = if args.command.is_empty() {
        Request::new(["help"])
    } else {
        Request::new(args.command.iter().cloned())
    };

    let result = RpcConnection::new(&store).dispatch(&request);
    store.shutdown()?;

    let response = result?;
    print!("{}", response.text);
    if !response.text.ends_with('\n') {
        println!();
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    initialize_tracing(&args.log_level);
    info!(memory = args.memory, data_dir = %args.data_dir.display(), "starting voxdag");

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
