use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use voice_bridge::mailbox::{default_segment_dir, SEGMENT_NAME};
use voice_bridge::ProducerEndpoint;

/// Host-side tool for the speech mailbox.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory backing the shared segment.
    #[arg(long)]
    segment_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Post a job; dropped if the previous one was not picked up yet.
    Say {
        text: String,
        #[arg(short, long, default_value = "1")]
        voice: String,
        #[arg(short, long, default_value_t = 1.0)]
        speed: f32,
        /// Wait until the worker has finished speaking.
        #[arg(short, long)]
        wait: bool,
        /// Give up waiting after this many seconds.
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
    /// Print whether the worker is speaking.
    Status,
    /// Remove the shared segment.
    Release,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let path = args
        .segment_dir
        .unwrap_or_else(default_segment_dir)
        .join(SEGMENT_NAME);
    let bridge = ProducerEndpoint::open_or_create(&path);
    if !bridge.is_connected() {
        eprintln!("cannot attach to {}", path.display());
        return ExitCode::FAILURE;
    }

    match args.command {
        Command::Say {
            text,
            voice,
            speed,
            wait,
            timeout,
        } => {
            if !bridge.send(&text, &voice, speed) {
                eprintln!("worker busy, job dropped");
                return ExitCode::FAILURE;
            }
            if wait {
                let deadline = Instant::now() + Duration::from_secs(timeout);
                let waited = wait_while(deadline, || bridge.has_pending_job())
                    // The talking flag goes up just after pickup.
                    && {
                        std::thread::sleep(Duration::from_millis(50));
                        wait_while(deadline, || bridge.is_talking())
                    };
                if !waited {
                    eprintln!("timed out waiting for the worker");
                    return ExitCode::FAILURE;
                }
            }
        }
        Command::Status => {
            println!(
                "talking: {}, pending: {}",
                bridge.is_talking(),
                bridge.has_pending_job()
            );
        }
        Command::Release => {
            if let Err(e) = bridge.release() {
                eprintln!("cannot remove {}: {e}", path.display());
                return ExitCode::FAILURE;
            }
        }
    }
    ExitCode::SUCCESS
}

fn wait_while(deadline: Instant, mut busy: impl FnMut() -> bool) -> bool {
    while busy() {
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    true
}
