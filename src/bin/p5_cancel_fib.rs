//! Cancellation from another thread after a deadline.
//!
//! Run with: cargo run --bin p5_cancel_fib [config.toml] [millis]

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use tracing_subscriber::EnvFilter;

use chan_patterns::generator::recurrence;
use chan_patterns::{CancelSignal, PipelineConfig, StopReason};

/// Reports a panicked canceller the way `main` reports errors.
fn canceller_finished(joined: thread::Result<()>) -> bool {
    match joined {
        Ok(()) => true,
        Err(_) => {
            eprintln!("{} canceller thread panicked", "error:".red().bold());
            false
        }
    }
}

/// Returns whether the canceller thread exited cleanly.
fn cancel_after(config: &PipelineConfig, deadline: Duration) -> chan_patterns::Result<bool> {
    let (signal, trigger) = CancelSignal::new();
    let handle = recurrence::fibonacci()
        .cancellable(signal)
        .with_config(config)
        .spawn()?;

    let canceller = thread::spawn(move || {
        thread::sleep(deadline);
        trigger.trigger();
    });

    let mut received = 0usize;
    for v in handle.stream() {
        println!("{}", v);
        received += 1;
    }

    let reason = handle.join()?;
    let canceller_ok = canceller_finished(canceller.join());

    let summary = match reason {
        StopReason::Cancelled => "cancelled".yellow(),
        StopReason::Finished => "ran out of u64 range".green(),
        other => format!("{:?}", other).normal(),
    };
    println!("\n{} values, generator {}", received, summary);
    Ok(canceller_ok)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let path = args.next().filter(|arg| arg != "-").map(PathBuf::from);
    let millis = args.next().and_then(|arg| arg.parse().ok()).unwrap_or(100);

    let result = PipelineConfig::load(path.as_deref()).and_then(|config| {
        println!("=== Cancelling a Generator ===\n");
        cancel_after(&config, Duration::from_millis(millis))
    });
    let canceller_ok = match result {
        Ok(ok) => ok,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    println!("\n=== Key Points ===");
    println!("1. One trigger can stop any number of generators");
    println!("2. Cancellation is a normal stop, not an error");
    println!("3. The stream closes within one step of the trigger");

    if !canceller_ok {
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canceller_panic_is_reported() {
        let joined = thread::spawn(|| panic!("canceller failed")).join();
        assert!(!canceller_finished(joined));
    }

    #[test]
    fn test_cancel_after_deadline() {
        let config = PipelineConfig {
            handoff_capacity: 4,
            ..PipelineConfig::default()
        };
        assert!(cancel_after(&config, Duration::from_millis(5)).unwrap());
        assert!(canceller_finished(thread::spawn(|| {}).join()));
    }
}
