use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::task;

use crate::jobs;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run an internal job
    #[command(subcommand)]
    Job(JobCommand),
}

#[derive(Debug, Subcommand)]
pub enum JobCommand {
    /// Writes an uploadable sample modpack archive
    SampleModpack {
        /// Where to write the archive
        #[arg(short, long, default_value = "test_modpack.zip")]
        output: PathBuf,
    },
}

/// Runs the requested job, if any. Returns `true` when the server should not start.
pub async fn maybe_cli() -> anyhow::Result<bool> {
    run(Args::parse()).await
}

async fn run(cli: Args) -> anyhow::Result<bool> {
    if let Some(c) = cli.command {
        return match c {
            Commands::Job(job) => match job {
                JobCommand::SampleModpack { output } => {
                    task::spawn_blocking(move || jobs::sample_modpack::create(&output)).await??;
                    Ok(true)
                }
            },
        };
    }
    Ok(false)
}
