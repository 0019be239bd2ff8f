//! The reader decides when to stop: it takes what it needs, then fires
//! the quit signal.
//!
//! Run with: cargo run --bin p4_quit_fib [config.toml]

use std::path::PathBuf;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

use chan_patterns::generator::recurrence;
use chan_patterns::{CancelSignal, PipelineConfig};

const WANTED: usize = 10;

fn quit_after_enough(config: &PipelineConfig) -> chan_patterns::Result<()> {
    let (quit, trigger) = CancelSignal::new();
    let handle = recurrence::fibonacci()
        .cancellable(quit)
        .with_config(config)
        .spawn()?;

    for v in handle.stream().iter().take(WANTED) {
        println!("{}", v.to_string().cyan());
    }
    trigger.trigger();
    println!("{}", "quit".yellow());

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
        println!("=== Quit Signal from the Reader ===\n");
        quit_after_enough(&config)
    });
    if let Err(err) = result {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }

    println!("\n=== Key Points ===");
    println!("1. The generator is unbounded and races each send against quit");
    println!("2. Firing quit closes the stream without emitting the pending value");
    println!("3. Firing it twice is harmless");
}
