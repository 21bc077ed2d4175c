use clap::Parser;

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::Cli;
use ecg_link::LinkConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let config = match cli.config.as_deref() {
        Some(path) => match LinkConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(exit_codes::INVALID_INPUT);
            }
        },
        None => LinkConfig::default(),
    };

    let exit_code = match cli.command {
        cli::Command::Validate(args) => commands::validate::execute(args),
        cli::Command::Monitor(args) => commands::monitor::execute(args, &config).await,
        cli::Command::Record(args) => commands::record::execute(args, &config).await,
        cli::Command::ModelInfo(args) => commands::model_info::execute(args, &config).await,
    };

    std::process::exit(exit_code);
}
