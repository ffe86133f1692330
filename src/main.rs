mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use log::info;
use progress_logger::ProgressLogger;
use progress_logger::core::scheduler::TokioScheduler;
use std::io;
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> io::Result<()> {
    let config = cli::load_config(&cli)?;
    if matches!(cli.command, Commands::Config) {
        return cli::handle_config_command(&cli, &config);
    }

    let logger = ProgressLogger::builder()
        .config(config)
        .scheduler(Arc::new(TokioScheduler::new()?))
        .build()?;

    tokio::select! {
        result = cli::run_command(&cli, &logger) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Interrupted, stopping all trackers");
        }
    }

    logger.stop_all();
    Ok(())
}
