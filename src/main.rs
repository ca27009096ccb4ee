mod cli;
mod collectors;
mod config;
mod engine;
mod error;
mod insights;
mod output;

use std::process::ExitCode;

use clap::Parser;
use cli::Cli;
use error::PipelensError;
use log::info;

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    output::print_banner();

    let cli = Cli::parse();
    info!("Starting pipelens - DevOps & MLOps issue detection");

    match cli.execute().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {e:#}", console::style("error:").red().bold());
            let code = e
                .chain()
                .find_map(|cause| cause.downcast_ref::<PipelensError>())
                .map_or(2, PipelensError::exit_code);
            ExitCode::from(code)
        }
    }
}
