mod cli;
mod demo;
mod infra;
mod report;

use bulletin_engine::error::AppError;

pub fn run() -> Result<(), AppError> {
    cli::run()
}
