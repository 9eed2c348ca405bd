pub mod bonita;
pub mod cli;
pub mod config;
pub mod data;
pub mod document;
pub mod header;
pub mod import;
pub mod io_utils;
pub mod mapper;
pub mod prompt;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

/// Log level chosen on the command line; `RUST_LOG` still wins when set.
pub fn level_for(talkative: bool, quiet: bool) -> LevelFilter {
    if talkative {
        LevelFilter::Trace
    } else if quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Info
    }
}

fn init_logging(level: LevelFilter) {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("bonita_importfile", level);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(level_for(cli.talkative, cli.quiet));
    match cli.command {
        Commands::Import(args) => import::execute(&args),
        Commands::Map(args) => import::execute_map(&args),
        Commands::Processes(args) => import::execute_processes(&args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flags_pick_level() {
        assert_eq!(level_for(false, false), LevelFilter::Info);
        assert_eq!(level_for(true, false), LevelFilter::Trace);
        assert_eq!(level_for(false, true), LevelFilter::Error);
    }
}
