//! Several senders and several receivers on one channel.
//!
//! Run with: cargo run --bin p2_senders_receivers [config.toml]

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use colored::Colorize;
use rand::Rng;
use tracing_subscriber::EnvFilter;

use chan_patterns::{fan_in, fan_out, Emitter, PipelineConfig};

const SENDERS: usize = 2;
const MESSAGES_PER_SENDER: usize = 3;
const RECEIVERS: usize = 2;

fn senders_and_receivers(config: &PipelineConfig) -> chan_patterns::Result<()> {
    let messages = fan_in::gather_with(config, SENDERS, |sender, out: &Emitter<String>| {
        for v in 0..MESSAGES_PER_SENDER {
            // Jitter so the senders interleave differently on each run.
            let jitter = rand::thread_rng().gen_range(0..20);
            thread::sleep(Duration::from_millis(jitter));
            if out.emit(format!("{} from sender {}", v, sender)).is_err() {
                return;
            }
        }
    })?;

    let report = fan_out::distribute_with(config, messages, RECEIVERS, |receiver, message| {
        println!("receive '{}' at receiver {}", message.green(), receiver);
    })?;

    println!(
        "\n{} messages received, per receiver: {:?}",
        report.total().to_string().bold(),
        report.per_worker()
    );
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = match PipelineConfig::load(path.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{} {}", "error:".red().bold(), err);
            std::process::exit(1);
        }
    };

    println!("=== Multiple Senders, Multiple Receivers ===\n");
    if let Err(err) = senders_and_receivers(&config) {
        eprintln!("{} {}", "error:".red().bold(), err);
        std::process::exit(1);
    }

    println!("\n=== Key Points ===");
    println!("1. Every sender holds a share of the same emitter");
    println!("2. The stream closes once the last sender returns");
    println!("3. Each message reaches exactly one receiver");
}
