use crate::demo::{run_demo, DemoArgs};
use crate::report::{run_generate, run_stats, GenerateArgs, StatsArgs};
use bulletin_engine::config::AppConfig;
use bulletin_engine::error::AppError;
use bulletin_engine::telemetry;
use clap::{Parser, Subcommand};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "bulletins",
    about = "Compute term averages and generate report-card bulletins from a gradebook export",
    version
)]
struct Cli {
    /// Override the worker thread count (BULLETIN_WORKERS); 0 uses every core
    #[arg(long, global = true)]
    workers: Option<usize>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate draft bulletins for a class or a list of students
    Generate(GenerateArgs),
    /// Print cohort statistics and ranking for one class without storing anything
    Stats(StatsArgs),
    /// Run the whole pipeline against a built-in sample class (default command)
    Demo(DemoArgs),
}

pub(crate) fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let mut config = AppConfig::load()?;
    if let Some(workers) = cli.workers {
        config.engine.workers = workers;
    }

    telemetry::init(&config.telemetry)?;
    debug!(?config.environment, workers = config.engine.workers, "configuration loaded");

    let command = cli
        .command
        .unwrap_or_else(|| Command::Demo(DemoArgs::default()));

    match command {
        Command::Generate(args) => run_generate(args, config.engine),
        Command::Stats(args) => run_stats(args),
        Command::Demo(args) => run_demo(args, config.engine),
    }
}
