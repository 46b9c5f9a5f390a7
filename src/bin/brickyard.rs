//! Brickyard simulation runner
//!
//! Usage:
//!   brickyard [options]
//!
//! The yard runs until Ctrl-C (or `--duration` seconds), then workers stop,
//! trucks drain what is left and a mass-balance report is printed. On unix,
//! SIGUSR1 makes every loading truck leave with what it has.

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brickyard::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "brickyard")]
#[command(version, about = "Workers, a bounded conveyor and the trucks that drain it")]
struct Args {
    /// Maximum number of bricks on the conveyor (K)
    #[arg(short = 'k', long, default_value_t = 10)]
    max_bricks: usize,

    /// Maximum total mass on the conveyor (M)
    #[arg(short = 'm', long, default_value_t = 20)]
    max_mass: u64,

    /// Mass a single truck can carry (C)
    #[arg(short = 'c', long, default_value_t = 8)]
    truck_capacity: u64,

    /// Number of trucks (N)
    #[arg(short = 'n', long, default_value_t = 3)]
    trucks: usize,

    /// Milliseconds a truck spends delivering a load (Ti)
    #[arg(short = 't', long, default_value_t = 1000)]
    delivery_ms: u64,

    /// Brick weight of each worker, comma separated
    #[arg(short = 'w', long, value_delimiter = ',', default_values_t = [1u32, 2, 3])]
    weights: Vec<u32>,

    /// Milliseconds a worker pauses between bricks
    #[arg(long, default_value_t = 100)]
    production_ms: u64,

    /// Stop production after this many seconds instead of waiting for Ctrl-C
    #[arg(short = 'd', long)]
    duration: Option<u64>,

    /// Log every delivered load
    #[arg(long)]
    log_loads: bool,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        SimulationConfig::new()
            .max_bricks(self.max_bricks)
            .max_mass(self.max_mass)
            .truck_capacity(self.truck_capacity)
            .truck_count(self.trucks)
            .delivery_interval(Duration::from_millis(self.delivery_ms))
            .worker_weights(self.weights.clone())
            .production_interval(Duration::from_millis(self.production_ms))
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "brickyard=info",
        1 => "brickyard=debug",
        _ => "brickyard=trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.config();
    let started = if args.log_loads {
        match Brickyard::with_sink(config, LogSink::with_prefix("depot")) {
            Ok(yard) => run(yard, args.duration).await,
            Err(e) => return Ok(setup_failed(e)),
        }
    } else {
        match Brickyard::new(config) {
            Ok(yard) => run(yard, args.duration).await,
            Err(e) => return Ok(setup_failed(e)),
        }
    };
    let report = started?;
    println!("{report}");

    if report.is_balanced() && report.is_clean() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn setup_failed(e: Error) -> ExitCode {
    eprintln!("brickyard: {e}");
    ExitCode::from(2)
}

async fn run<S>(mut yard: Brickyard<S>, duration: Option<u64>) -> Result<SimulationReport>
where
    S: Sink<Item = Load> + Clone + Send + 'static,
{
    yard.start()?;
    wait_for_stop(&yard, duration.map(Duration::from_secs)).await?;
    yard.stop();
    Ok(yard.join().await)
}

/// Block until Ctrl-C or the deadline, forwarding leave-early requests meanwhile
async fn wait_for_stop<S>(yard: &Brickyard<S>, duration: Option<Duration>) -> Result<()>
where
    S: Sink<Item = Load> + Clone + Send + 'static,
{
    let deadline = async {
        match duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    #[cfg(unix)]
    let mut leave_signal =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::user_defined1())
            .map_err(signal_error)?;
    let mut leave_open = cfg!(unix);

    loop {
        #[cfg(unix)]
        let leave = leave_signal.recv();
        #[cfg(not(unix))]
        let leave = std::future::pending::<Option<()>>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(signal_error)?;
                info!("interrupted, stopping production");
                return Ok(());
            }
            _ = &mut deadline => {
                info!("run time elapsed, stopping production");
                return Ok(());
            }
            received = leave, if leave_open => {
                if received.is_none() {
                    warn!("leave-early signal stream closed");
                    leave_open = false;
                    continue;
                }
                info!("leave-early requested for every truck");
                yard.leave_early_all();
            }
        }
    }
}

fn signal_error(e: std::io::Error) -> Error {
    Error::Shutdown(format!("signal handling failed: {e}"))
}
