//! Deployed address book

use std::{process, time};

use clap::{command, Parser};
use crytic2foundry::{addressbook::AddressBook, config::Config, logger};
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Args {
    /// the chain id of the broadcast records
    chain_id: Option<u64>,
    /// the config file path
    #[arg(short, long)]
    config: Option<String>,
    /// the output file, overrides the config
    #[arg(short, long)]
    output: Option<String>,
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let args = Args::parse();
    logger::init(args.verbose);

    let cfg = Config::load(args.config.as_deref()).expect("Failed to load config");
    let chain_id = args.chain_id.unwrap_or_else(|| {
        warn!("Missing chain id parameter, using {}", cfg.addresses.default_chain_id);
        cfg.addresses.default_chain_id
    });
    let output = args.output.unwrap_or_else(|| cfg.addresses.output.clone());

    let now = time::Instant::now();
    match AddressBook::build(&cfg.addresses, chain_id).and_then(|book| book.write(&output).map(|_| book.len())) {
        Ok(count) => info!("🎉 Done ({:?})! Output: {}, Contracts: {}", now.elapsed(), output, count),
        Err(e) => {
            error!("Error: {:#}", e);
            process::exit(1);
        }
    }
}
