use std::fs::OpenOptions;
use std::path::Path;

use env_logger::{Builder, Env, Target};

/// Send log output to `path` (appending), falling back to stderr when the file
/// cannot be opened. The level defaults to `info` and honours `RUST_LOG`.
///
/// Only the first call installs a logger; later calls are ignored.
pub fn init(path: &Path) {
    let mut builder = Builder::from_env(Env::default().default_filter_or("info"));

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => {
            builder.target(Target::Pipe(Box::new(file)));
        }
        Err(e) => eprintln!("cannot open log file {}: {e}", path.display()),
    }

    if builder.try_init().is_ok() {
        log::info!("Logging to {}", path.display());
    }
}
