//! A bounded generator: the first n + 1 Fibonacci numbers.
//!
//! Run with: cargo run --bin p3_bounded_fib [config.toml]

use std::path::PathBuf;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

use chan_patterns::generator::recurrence;
use chan_patterns::PipelineConfig;

const STEPS: usize = 10;

fn bounded_fibonacci(config: &PipelineConfig) -> chan_patterns::Result<()> {
    let handle = recurrence::fibonacci()
        .bounded(STEPS)
        .with_config(config)
        .spawn()?;

    for v in handle.stream() {
        println!("{}", v.to_string().cyan());
    }

    let reason = handle.join()?;
    println!("\ngenerator stopped: {:?}", reason);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let result = PipelineConfig::load(path.as_deref()).and_then(|config| {
        println!("=== Bounded Fibonacci Generator ===\n");
        bounded_fibonacci(&config)
    });
    if let Err(err) = result {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }

    println!("\n=== Key Points ===");
    println!("1. The generator owns its state on its own thread");
    println!("2. Each value waits for the reader (rendezvous hand-off)");
    println!("3. Reaching the bound closes the stream, ending the loop");
}
