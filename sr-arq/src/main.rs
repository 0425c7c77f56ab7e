//! Entry point for `sr-arq`.
//!
//! Runs the Selective-Repeat engine over the emulated lossy channel and prints
//! a statistics summary.  All protocol work is delegated to the library;
//! `main.rs` owns only process setup (logging, argument parsing).

use anyhow::{bail, Context, Result};
use clap::Parser;

use sr_arq::config::{self, Config, RetransmitPolicy};
use sr_arq::simulator::{Simulator, SimulatorConfig};

/// Selective-Repeat ARQ over an emulated unreliable channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Number of messages to send.
    #[arg(short = 'n', long, default_value_t = 20)]
    messages: usize,

    /// Packet loss probability.
    #[arg(short, long, default_value_t = 0.0)]
    loss: f64,

    /// Packet corruption probability.
    #[arg(short, long, default_value_t = 0.0)]
    corrupt: f64,

    /// Mean time between messages from the application.
    #[arg(short, long, default_value_t = 10.0)]
    interval: f64,

    /// Sender/receiver window size.
    #[arg(short, long, default_value_t = config::DEFAULT_WINDOW_SIZE)]
    window: usize,

    /// Sequence-space size (at least twice the window).
    #[arg(long, default_value_t = config::DEFAULT_SEQ_SPACE)]
    seq_space: u32,

    /// Retransmission timeout.
    #[arg(short, long, default_value_t = config::DEFAULT_TIMEOUT)]
    timeout: f64,

    /// On timeout, resend only the oldest unacknowledged packet.
    #[arg(long)]
    oldest_only: bool,

    /// RNG seed for the channel emulator.
    #[arg(short, long, default_value_t = 0x5EED)]
    seed: u64,

    /// Abandon the run after this much simulated time.
    #[arg(long, default_value_t = 1_000_000.0)]
    max_time: f64,

    /// Log every protocol event (same as RUST_LOG=debug).
    #[arg(long)]
    trace: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialise env_logger; RUST_LOG overrides the default filter.
    let default_filter = if cli.trace { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let policy = if cli.oldest_only {
        RetransmitPolicy::OldestOnly
    } else {
        RetransmitPolicy::AllUnacked
    };
    let engine = Config::new(cli.window, cli.seq_space, cli.timeout)
        .context("invalid protocol configuration")?
        .with_policy(policy);

    let sim = SimulatorConfig {
        messages: cli.messages,
        loss: cli.loss,
        corrupt: cli.corrupt,
        mean_interval: cli.interval,
        seed: cli.seed,
        max_time: cli.max_time,
    };

    log::info!(
        "Starting run: {} messages, window {}, seq space {}, timeout {}, loss {}, corrupt {}",
        sim.messages,
        engine.window_size(),
        engine.seq_space().size(),
        engine.timeout(),
        sim.loss,
        sim.corrupt
    );

    let report = Simulator::new(&engine, sim)
        .context("invalid emulator configuration")?
        .run();
    println!("{report}");

    if !report.in_order() {
        bail!(
            "delivered {} of {} messages in order",
            report.delivered.len(),
            report.generated.len()
        );
    }
    Ok(())
}
