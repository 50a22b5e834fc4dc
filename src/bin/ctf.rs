//! Crytic trace to Foundry test

use std::{process, time};

use clap::{command, Parser};
use crytic2foundry::{config::Config, logger, splice::InsertionStrategy, Converter};
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the folder holding the test file, `ig` by default
    folder: Option<String>,
    /// the config file path
    #[arg(short, long)]
    config: Option<String>,
    /// the fuzzer trace file, overrides the config
    #[arg(short, long)]
    trace: Option<String>,
    /// how to find the end of the test contract, overrides the config
    #[arg(short, long, value_enum)]
    strategy: Option<InsertionStrategy>,
    /// dump the output of every rewrite pass
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    logger::init(args.verbose);

    let mut cfg = Config::load(args.config.as_deref()).expect("Failed to load config");
    if let Some(strategy) = args.strategy {
        cfg.trace.strategy = strategy;
    }
    let folder = args.folder.unwrap_or_else(|| cfg.trace.default_folder.clone());

    let mut converter = Converter::new(&cfg).expect("Failed to create converter");
    if let Some(trace) = &args.trace {
        converter = converter.with_trace_file(trace);
    }

    let now = time::Instant::now();
    match converter.gen(&folder) {
        Ok((output_path, fn_name)) => {
            info!("🎉 Done ({:?})! Output: {}, Function: {}", now.elapsed(), output_path, fn_name)
        }
        Err(e) => {
            error!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
