//! Demonstration entry point.
//!
//! Writes a small school of fish into a store directory, reads them back and
//! prints the results. Usage: `jotdb [store-dir] [log-dir]`.
//!
//! When `log-dir` is given, rolling log files are written there.

use jotdb_core::{default_log_level, init_logging, Driver, StoreResult};
use serde::{Deserialize, Serialize};
use std::process::ExitCode;

const DEFAULT_STORE_DIR: &str = "./jotdb-demo";
const COLLECTION: &str = "fish";

#[derive(Debug, Serialize, Deserialize)]
struct Fish {
    name: String,
}

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    let store_dir = args
        .next()
        .unwrap_or_else(|| DEFAULT_STORE_DIR.to_string());

    if let Some(log_dir) = args.next() {
        let log_dir = match std::path::absolute(&log_dir) {
            Ok(path) => path,
            Err(err) => {
                eprintln!("error: cannot resolve log dir `{log_dir}`: {err}");
                return ExitCode::FAILURE;
            }
        };
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
        println!("logging level={} dir={}", default_log_level(), log_dir.display());
    }

    println!("jotdb_core version={}", jotdb_core::core_version());
    match run(&store_dir) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(store_dir: &str) -> StoreResult<()> {
    let driver = Driver::open_default(store_dir)?;
    println!("store root={}", driver.root().display());

    for name in ["onefish", "twofish", "redfish", "bluefish"] {
        driver.write(
            COLLECTION,
            name,
            &Fish {
                name: name.to_string(),
            },
        )?;
    }

    let onefish: Fish = driver.read(COLLECTION, "onefish")?;
    println!("read {COLLECTION}/onefish -> {}", onefish.name);

    let school: Vec<Fish> = driver.read_all_as(COLLECTION)?;
    let names: Vec<&str> = school.iter().map(|fish| fish.name.as_str()).collect();
    println!("read_all {COLLECTION} -> {}", names.join(", "));

    Ok(())
}
