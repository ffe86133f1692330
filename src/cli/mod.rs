use clap::{Parser, Subcommand};
use log::info;
use progress_logger::core::formatter;
use progress_logger::{ConfigService, LoggerConfig, Progress, ProgressLogger};
use std::io;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Parser)]
#[command(name = "progress-logger")]
#[command(about = "Demo workloads for the live progress table.", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Track progress without drawing anything
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Milliseconds between table refreshes
    #[arg(long, value_name = "MS", global = true)]
    pub interval_ms: Option<u64>,

    /// Sets a custom config file
    #[arg(long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Milliseconds of simulated work per step
    #[arg(long, value_name = "MS", default_value_t = 50, global = true)]
    pub step_ms: u64,
}

#[derive(Subcommand)]
pub enum Commands {
    /// One task counting up to its total
    Basic {
        #[arg(long, default_value_t = 100)]
        total: i64,
    },
    /// Three tasks running side by side at different speeds
    Multi,
    /// A task that is paused twice on its way
    PauseResume,
    /// A task that also counts errors, warnings and skipped items
    Counters,
    /// Fetch, validate and save phases over the same records
    Batch {
        #[arg(long, default_value_t = 1000)]
        records: i64,
    },
    /// The basic workload with output suppressed, followed by a summary
    Quiet,
    /// Show the effective configuration
    Config,
}

impl Cli {
    fn step(&self) -> Duration {
        Duration::from_millis(self.step_ms)
    }
}

/// Config file (explicit or default), then environment, then flags
pub fn load_config(cli: &Cli) -> io::Result<LoggerConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigService::load_config(path)?.with_env_overrides(),
        None => ConfigService::load_default(),
    };

    if cli.quiet {
        config.quiet = true;
    }
    if let Some(ms) = cli.interval_ms {
        config.set_refresh_interval(Duration::from_millis(ms))?;
    }
    Ok(config)
}

pub fn handle_config_command(cli: &Cli, config: &LoggerConfig) -> io::Result<()> {
    let content = toml::to_string(config).map_err(io::Error::other)?;

    println!("Current Configuration:");
    println!("======================");
    print!("{content}");
    println!();
    match cli.config.clone().or_else(ConfigService::default_config_path) {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none)"),
    }
    Ok(())
}

pub async fn run_command(cli: &Cli, logger: &ProgressLogger) -> io::Result<()> {
    let step = cli.step();
    match &cli.command {
        Commands::Basic { total } => handle_basic_command(logger, *total, step).await?,
        Commands::Multi => handle_multi_command(logger, step).await?,
        Commands::PauseResume => handle_pause_resume_command(logger, step).await?,
        Commands::Counters => handle_counters_command(logger, step).await?,
        Commands::Batch { records } => handle_batch_command(logger, *records, step).await?,
        Commands::Quiet => handle_quiet_command(logger, step).await?,
        Commands::Config => {
            return handle_config_command(cli, &logger.config());
        }
    }

    // Last frame, so the final state is on screen even between ticks
    logger.render();
    Ok(())
}

async fn count_to(task: &Progress, total: i64, by: i64, step: Duration) {
    let mut done = 0;
    while done < total {
        let by = by.min(total - done);
        task.increment(by);
        done += by;
        sleep(step).await;
    }
}

pub async fn handle_basic_command(
    logger: &ProgressLogger,
    total: i64,
    step: Duration,
) -> io::Result<()> {
    let task = logger.get("downloading-files");
    task.set_total(total)?;
    count_to(&task, total, 1, step).await;

    println!("\n✅ Download complete!");
    Ok(())
}

pub async fn handle_multi_command(logger: &ProgressLogger, step: Duration) -> io::Result<()> {
    let fetch = logger.get("fetching-data");
    let process = logger.get("processing-items");
    let upload = logger.get("uploading-results");
    fetch.set_total(50)?;
    process.set_total(200)?;
    upload.set_total(150)?;

    tokio::join!(
        count_to(&fetch, 50, 2, step),
        count_to(&process, 200, 1, step.mul_f32(1.5)),
        count_to(&upload, 150, 1, step * 2),
    );

    println!("\n✅ All tasks complete!");
    Ok(())
}

pub async fn handle_pause_resume_command(
    logger: &ProgressLogger,
    step: Duration,
) -> io::Result<()> {
    let task = logger.get("rate-limited-task");
    task.set_total(100)?;

    for i in 1..=100 {
        task.increment(1);

        let pause = match i {
            30 => Some(("rate limit", 30)),
            60 => Some(("system resources", 20)),
            _ => None,
        };
        if let Some((reason, steps)) = pause {
            println!("\n⏸️  Pausing for {reason}...");
            task.pause();
            sleep(step * steps).await;
            println!("▶️  Resuming...\n");
            task.resume();
        }

        sleep(step).await;
    }

    println!("\n✅ Processing complete!");
    Ok(())
}

pub async fn handle_counters_command(logger: &ProgressLogger, step: Duration) -> io::Result<()> {
    let task = logger.get("processing");
    task.set_total(100)?;

    for i in 0..100 {
        if i % 10 == 9 {
            task.count("errors", 1);
        }
        if i % 3 == 0 {
            task.count("warnings", 2);
        }
        if i % 7 == 0 {
            task.count("skipped", 1);
        }
        task.increment(1);
        sleep(step).await;
    }

    println!("\nProcessing complete!");
    task.done();
    Ok(())
}

pub async fn handle_batch_command(
    logger: &ProgressLogger,
    records: i64,
    step: Duration,
) -> io::Result<()> {
    println!("Starting batch process...\n");

    for phase in ["fetch-records", "validate-records", "save-to-db"] {
        let task = logger.get(phase);
        task.set_total(records)?;
        for i in 0..records {
            task.increment(1);
            if i % 50 == 0 {
                sleep(step).await;
            }
        }
        info!("Phase {phase} finished");
    }

    println!("\n✅ Batch process complete!");
    println!("Processed {} records", formatter::number(records));
    Ok(())
}

pub async fn handle_quiet_command(logger: &ProgressLogger, step: Duration) -> io::Result<()> {
    logger.set_quiet(true);

    let task = logger.get("silent-task");
    task.set_total(100)?;
    count_to(&task, 100, 1, step).await;

    let state = task.state();
    let metrics = task.metrics();
    println!(
        "{}: {}/{} ({}), {}% in {}",
        state.name,
        formatter::number(state.current),
        formatter::number(state.total.unwrap_or_default()),
        state.status,
        metrics.percentage,
        formatter::elapsed(metrics.elapsed)
    );
    Ok(())
}
