//! Fan-in three Collatz generators, then fan-out to a worker pool.
//!
//! Run with: cargo run --bin p6_collatz_fan [config.toml]

use std::fmt;
use std::path::PathBuf;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

use chan_patterns::generator::recurrence::collatz_step;
use chan_patterns::{fan_in, fan_out, Generator, PipelineConfig};

const STARTS: [u64; 3] = [10, 20, 30];

/// A Collatz term; fan-out only needs it to be printable.
struct Hailstone(u64);

impl fmt::Display for Hailstone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn collatz_fan(config: &PipelineConfig) -> chan_patterns::Result<()> {
    let streams = STARTS
        .iter()
        .map(|&start| {
            Generator::new(start, |n: u64| collatz_step(n).map(Hailstone))
                .with_config(config)
                .start()
        })
        .collect::<chan_patterns::Result<Vec<_>>>()?;

    let merged = fan_in::merge_with(config, streams)?;
    let report = fan_out::distribute_with(config, merged, config.workers, |worker, term| {
        println!("'{}' from {}", term.to_string().magenta(), worker);
    })?;

    println!(
        "\n{} terms over {} workers: {:?}",
        report.total(),
        report.workers(),
        report.per_worker()
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let result = PipelineConfig::load(path.as_deref()).and_then(|config| {
        println!("=== Fan-In, Fan-Out ===\n");
        collatz_fan(&config)
    });
    if let Err(err) = result {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }

    println!("\n=== Key Points ===");
    println!("1. One relay per input copies values into the merged stream");
    println!("2. The merged stream closes after the last input closes");
    println!("3. Workers compete for values; each term is printed once");
    println!("4. distribute returns only after every worker has drained");
}
