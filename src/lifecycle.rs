//! Attach/detach hooks for hosts that load the worker in-process.
//!
//! `attach` hands the entry point to a dedicated thread, the way a plugin
//! host invokes a registered script entry once on a thread it controls.
//! `detach` raises the shutdown flag and waits for the entry point to return,
//! at which point the worker has released its mailbox mapping and engine.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub struct WorkerHandle {
    shutdown: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

/// Run `entry` on a new worker thread. The entry point receives the shutdown
/// flag and should return promptly once it is raised.
pub fn attach<F>(entry: F) -> io::Result<WorkerHandle>
where
    F: FnOnce(Arc<AtomicBool>) + Send + 'static,
{
    let shutdown = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&shutdown);
    let thread = thread::Builder::new()
        .name("voice-bridge-worker".to_string())
        .spawn(move || entry(flag))?;

    log::info!("Worker attached");
    Ok(WorkerHandle {
        shutdown,
        thread: Some(thread),
    })
}

impl WorkerHandle {
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal shutdown and wait for the worker to finish.
    pub fn detach(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Worker thread panicked");
            }
            log::info!("Worker detached");
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn detach_stops_the_entry_point() {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let handle = attach(move |shutdown| {
            while !shutdown.load(Ordering::Acquire) {
                counter.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        while ticks.load(Ordering::Relaxed) == 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(handle.is_running());
        handle.detach();
    }

    #[test]
    fn entry_that_returns_early_is_fine() {
        let handle = attach(|_| {}).unwrap();
        handle.detach();
    }
}
