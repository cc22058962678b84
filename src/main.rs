mod cli;
mod engine;
mod metrics;
mod model;
mod orchestrator;
mod plugin;
mod storage;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;
mod viewer;
mod volume;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

/// `warn` by default, raised by each `-v`; `RUST_LOG` overrides both.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();
    init_logging(args.verbose);
    let is_silent = args.silent;

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            if is_silent {
                eprintln!("{e:#}");
                std::process::exit(1);
            } else {
                Err(e)
            }
        }
    }
}
