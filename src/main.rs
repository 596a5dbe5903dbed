//! plotrecv - Plot image receiver
//!
//! Connects to a plot streaming server and saves every received image to disk.

use clap::Parser;
use colored::Colorize;
use plotrecv_client::{ClientError, FrameReceiver, ReceiverConfig, Termination};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit code for a normal or user-interrupted session.
const EXIT_OK: u8 = 0;

/// Exit code for a session that ended on a protocol violation or a dropped frame.
const EXIT_ABNORMAL: u8 = 2;

/// Exit code when a second Ctrl+C aborts the process.
const EXIT_FORCED: i32 = 130;

/// What to do when Ctrl+C arrives.
#[derive(Debug, PartialEq, Eq)]
enum SignalAction {
    /// Stop after the current read, keeping every saved image.
    Shutdown,
    /// Exit immediately.
    Abort,
}

fn signal_action(received: u32) -> SignalAction {
    if received <= 1 {
        SignalAction::Shutdown
    } else {
        SignalAction::Abort
    }
}

#[derive(Parser)]
#[command(name = "plotrecv")]
#[command(about = "Receive plot images from a streaming server and save them to disk")]
#[command(version)]
struct Cli {
    /// Server host name or IP address [default: 127.0.0.1]
    host: Option<String>,

    /// Server port [default: 9000]
    port: Option<u16>,

    /// Directory to save received images in [default: received_plots]
    output_dir: Option<PathBuf>,
}

impl Cli {
    /// Applies the positional arguments that were given on top of `config`.
    fn apply(self, mut config: ReceiverConfig) -> ReceiverConfig {
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match ReceiverConfig::load() {
        Ok(c) => cli.apply(c),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            return ExitCode::FAILURE;
        }
    };

    println!("{}", "plotrecv image receiver".bold());
    println!("{}", "=======================".bold());

    match run(&config).await {
        Ok(termination) => ExitCode::from(exit_status(&termination)),
        Err(e) => {
            eprintln!("{}: {}", "Error".red(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &ReceiverConfig) -> Result<Termination, ClientError> {
    println!("Connecting to {}...", config.server_addr());
    let receiver = FrameReceiver::connect(config).await?;
    println!("{} to {}", "Connected".green(), receiver.peer());

    // Spawn shutdown signal handler
    let shutdown = receiver.shutdown_handle();
    tokio::spawn(async move {
        let mut received = 0;
        while tokio::signal::ctrl_c().await.is_ok() {
            received += 1;
            tracing::debug!("Received Ctrl+C");
            match signal_action(received) {
                SignalAction::Shutdown => {
                    shutdown.shutdown();
                    eprintln!("{}", "Stopping; press Ctrl+C again to abort".yellow());
                }
                SignalAction::Abort => {
                    eprintln!("{}", "Aborted".red());
                    std::process::exit(EXIT_FORCED);
                }
            }
        }
    });

    let report = receiver.receive_all(&config.output_dir).await?;

    match report.termination {
        Termination::EndOfStream => println!("{}", report.termination),
        Termination::Interrupted => println!("\n{}", "Interrupted by user".yellow()),
        _ => eprintln!("{}: {}", "Stopped".yellow(), report.termination),
    }
    println!(
        "Connection closed ({} image(s) saved to {})",
        report.frames_saved,
        config.output_dir.display()
    );

    Ok(report.termination)
}

fn exit_status(termination: &Termination) -> u8 {
    if termination.is_clean() {
        EXIT_OK
    } else {
        EXIT_ABNORMAL
    }
}
