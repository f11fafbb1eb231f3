//! The worker's polling loop.
//!
//! A [`Worker`] owns everything the worker process needs: the consumer end of
//! the mailbox and the speech pipeline (engine and sink). It is built once at
//! startup, driven by [`Worker::run`] until the shutdown flag is raised, and
//! dropped once, which releases the mailbox mapping and the engine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::bridge::ConsumerEndpoint;
use crate::config::WorkerConfig;
use crate::mailbox::Job;
use crate::pipeline::{init_engine, SpeechPipeline};
use crate::playback::AudioSink;
use crate::SynthesisEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for a job.
    Idle,
    /// A job was taken and the talking flag raised.
    Busy,
    Synthesizing,
    Playing,
}

pub struct Worker<E, S> {
    bridge: ConsumerEndpoint,
    pipeline: SpeechPipeline<E, S>,
    state: WorkerState,
    tick: Duration,
}

impl<E: SynthesisEngine, S: AudioSink> Worker<E, S> {
    pub fn new(bridge: ConsumerEndpoint, pipeline: SpeechPipeline<E, S>, tick: Duration) -> Self {
        Self {
            bridge,
            pipeline,
            state: WorkerState::Idle,
            tick,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.bridge.is_connected()
    }

    pub fn pipeline(&self) -> &SpeechPipeline<E, S> {
        &self.pipeline
    }

    /// Check the mailbox once and, if a job is waiting, handle it to
    /// completion. Returns whether a job was handled.
    pub fn poll_once(&mut self) -> bool {
        match self.bridge.check_for_job() {
            Some(job) => {
                self.handle(&job);
                true
            }
            None => false,
        }
    }

    fn handle(&mut self, job: &Job) {
        self.state = WorkerState::Busy;
        self.bridge.set_talking_state(true);

        self.state = WorkerState::Synthesizing;
        if self.pipeline.render(job) {
            self.state = WorkerState::Playing;
            self.pipeline.play();
        }

        self.bridge.set_talking_state(false);
        self.state = WorkerState::Idle;
    }

    /// Poll until `shutdown` is raised, sleeping one tick whenever the mailbox
    /// is empty. Returns immediately if the mailbox is not connected.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        if !self.is_connected() {
            log::error!("Mailbox not connected, worker loop not started");
            return;
        }

        log::info!("Worker loop started (tick {:?})", self.tick);
        while !shutdown.load(Ordering::Acquire) {
            if !self.poll_once() {
                std::thread::sleep(self.tick);
            }
        }
        log::info!("Worker loop stopped");
    }

    /// Release the engine and the mailbox mapping.
    pub fn shutdown(mut self) {
        self.pipeline.shutdown();
        self.bridge.set_talking_state(false);
    }
}

/// Worker entry point: connect, initialise the engine, poll until shutdown,
/// tear down.
pub fn script_main<E: SynthesisEngine, S: AudioSink>(
    config: &WorkerConfig,
    engine: E,
    params: E::ModelParams,
    sink: S,
    shutdown: &AtomicBool,
) {
    let bridge = ConsumerEndpoint::open(&config.segment_path());
    if !bridge.is_connected() {
        return;
    }

    let engine = init_engine(engine, params, &config.resolver());
    let pipeline = SpeechPipeline::new(engine, sink, &config.output_file);

    let mut worker = Worker::new(bridge, pipeline, config.poll_interval());
    worker.run(shutdown);
    worker.shutdown();
}
