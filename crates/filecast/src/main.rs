//! filecast - distribute one file across a process group
//!
//! Entry point for the local launcher: runs every member of the group
//! in-process, one task per rank, each against the local disk.

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use filecast::comm::MemoryGroup;
use filecast::store::DiskStore;
use filecast::{CastConfig, CliArgs, RunOutcome, Session, EXIT_FAILURE, EXIT_SUCCESS};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<u8> {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Setup logging
    setup_logging(args.verbose)?;

    if args.np < 2 {
        println!("filecast: nothing to do with a group of size {}", args.np);
        return Ok(0);
    }

    // Validate and create config
    let config = CastConfig::from_args(&args).context("Invalid configuration")?;
    config
        .validate(args.np)
        .context("Invalid configuration")?;

    // Every member shares this machine's disk
    if !config.is_rank_specific() {
        bail!(
            "path '{}' is the same for every rank; include {{rank}} in it so members do not share a file",
            config.path.display()
        );
    }

    info!(
        members = args.np,
        strategy = %config.strategy,
        chunk_size = config.chunk_size,
        "starting local group"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let outcomes = runtime.block_on(launch(config, args.np))?;

    let code = outcomes
        .iter()
        .map(RunOutcome::exit_code)
        .find(|code| *code != EXIT_SUCCESS)
        .unwrap_or(EXIT_SUCCESS);

    Ok(u8::try_from(code).unwrap_or(EXIT_FAILURE as u8))
}

/// Spawn one session per rank and wait for all of them.
async fn launch(config: CastConfig, members: usize) -> Result<Vec<RunOutcome>> {
    let handles: Vec<_> = MemoryGroup::new(members)
        .into_iter()
        .map(|comm| {
            let session = Session::new(comm, DiskStore::new(), config.clone());
            tokio::spawn(async move { session.execute().await })
        })
        .collect();

    let mut outcomes = Vec::with_capacity(members);
    for handle in handles {
        outcomes.push(handle.await.context("Member task failed")?);
    }
    Ok(outcomes)
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("filecast=debug,filecast_comm=debug,filecast_store=debug,warn")
    } else {
        EnvFilter::new("filecast=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}
