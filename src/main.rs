mod app;
mod cli;
mod config;
mod db;
mod http;
mod paths;

use std::env;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

const LOG_ENV: &str = "PODCASTER_LOG";

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose);
    app::run(cli)
}

fn init_logging(verbose: u8) {
    let mut builder = colog::default_builder();
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    builder.filter(None, level);
    if let Ok(filters) = env::var(LOG_ENV) {
        builder.parse_filters(&filters);
    }
    builder.init();
}
