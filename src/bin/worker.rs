use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use clap::Parser;

use voice_bridge::engines::vits::{VitsEngine, VitsModelParams};
use voice_bridge::playback::RodioSink;
use voice_bridge::{logging, worker, WorkerConfig};

/// Speech worker: polls the shared mailbox and speaks every job.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// JSON configuration file.
    #[arg(short, long, default_value = "voice_bridge.json")]
    config: PathBuf,

    /// Model folder, overriding `tts_model_path`.
    #[arg(long)]
    model_dir: Option<PathBuf>,
}

fn main() {
    let args = Args::parse();
    let mut config = WorkerConfig::load_or_default(&args.config);
    if let Some(dir) = args.model_dir {
        config.tts_model_path = Some(dir);
    }
    logging::init(&config.log_file);

    let params = VitsModelParams {
        num_threads: Some(config.num_threads),
        ..Default::default()
    };

    // Runs until the process is terminated.
    let shutdown = AtomicBool::new(false);
    worker::script_main(&config, VitsEngine::new(), params, RodioSink, &shutdown);
}
