//! Wallet Ledger CLI
//!
//! Replays a CSV operation script against a fresh ledger and outputs the
//! final balance of every account.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > balances.csv
//! ```
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use std::env;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;
use wallet_ledger::{script, Ledger, LedgerError, Result};

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        return Err(LedgerError::MissingArgument);
    }

    let input_path = &args[1];
    let file = File::open(input_path)?;
    let reader = BufReader::new(file);

    let mut ledger = Ledger::new();
    let summary = script::replay_csv(&mut ledger, reader)?;
    log::info!(
        "Replayed {} operations ({} rejected)",
        summary.applied + summary.rejected,
        summary.rejected
    );

    let stdout = io::stdout();
    let handle = stdout.lock();
    script::write_balances(&ledger, handle)?;

    Ok(())
}
