//! Background CSI sampling task.
//!
//! Each collector owns at most one sampling task. The task runs on its own
//! named thread, driving an async loop with `futures::executor::block_on`:
//! acquire a sample, publish it, then sleep for the interval. The sleep races
//! a cancellation signal so `stop()` does not wait out a long interval.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::Utc;
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use futures::executor::block_on;

use super::sink::CsiSink;
use super::source::CsiSource;
use super::types::{CsiSample, CsiSampleEvent};
use crate::common::error::{Error, Result};

type StopSignal = Signal<CriticalSectionRawMutex, ()>;

/// Clears the running flag when the sampling thread exits, even by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Handle to one spawned sampling task.
struct CollectorTask {
    stop: Arc<StopSignal>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl CollectorTask {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Signal cancellation and wait for the in-flight iteration to finish.
    fn stop_and_join(&mut self) {
        self.stop.signal(());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("CSI sampling thread panicked");
            }
        }
    }
}

/// Periodic CSI sampler bound to one owner.
pub struct CsiCollector {
    name: String,
    source: Arc<dyn CsiSource>,
    sink: Arc<dyn CsiSink>,
    task: Option<CollectorTask>,
}

impl CsiCollector {
    pub fn new(name: impl Into<String>, source: Arc<dyn CsiSource>, sink: Arc<dyn CsiSink>) -> Self {
        Self {
            name: name.into(),
            source,
            sink,
            task: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start sampling every `interval`. Starting a running collector is a no-op.
    pub fn start(&mut self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::InvalidArgument("CSI sampling interval must be positive".to_string()));
        }
        if let Some(task) = self.task.as_mut() {
            if task.is_running() {
                log::debug!("CSI collector {} already running", self.name);
                return Ok(());
            }
            // A finished task still holds its join handle.
            task.stop_and_join();
        }

        let stop = Arc::new(StopSignal::new());
        let running = Arc::new(AtomicBool::new(true));
        let guard = RunningGuard(running.clone());
        let name = self.name.clone();
        let source = self.source.clone();
        let sink = self.sink.clone();
        let task_stop = stop.clone();

        let handle = thread::Builder::new()
            .name(format!("csi-{}", self.name))
            .spawn(move || {
                let _guard = guard;
                block_on(sampling_loop(name, source, sink, interval, task_stop));
            })
            .map_err(|e| {
                running.store(false, Ordering::Release);
                Error::Device(format!("failed to spawn CSI collector {}: {}", self.name, e))
            })?;

        self.task = Some(CollectorTask {
            stop,
            running,
            handle: Some(handle),
        });
        Ok(())
    }

    /// Stop sampling and wait for the current iteration to finish.
    pub fn stop(&mut self) -> Result<()> {
        let task = self.task.as_mut().ok_or(Error::NotRunning("stop"))?;
        task.stop_and_join();
        log::info!("CSI collector {} stopped", self.name);
        Ok(())
    }

    /// Whether the sampling task is currently running. Never blocks.
    pub fn is_running(&self) -> Result<bool> {
        self.task
            .as_ref()
            .map(CollectorTask::is_running)
            .ok_or_else(|| Error::NotConfigured(format!("CSI collector {} was never started", self.name)))
    }
}

impl Drop for CsiCollector {
    fn drop(&mut self) {
        if let Some(task) = self.task.as_mut() {
            task.stop_and_join();
        }
    }
}

async fn sampling_loop(
    name: String,
    source: Arc<dyn CsiSource>,
    sink: Arc<dyn CsiSink>,
    interval: Duration,
    stop: Arc<StopSignal>,
) {
    log::info!("CSI collector {} started, sampling every {:?}", name, interval);
    let interval = embassy_time::Duration::from_micros(interval.as_micros().min(u64::MAX as u128) as u64);
    let mut sequence = 0u64;

    loop {
        if stop.signaled() {
            break;
        }

        match source.acquire() {
            Ok(matrix) => {
                sink.publish(CsiSampleEvent {
                    collector: name.clone(),
                    sequence,
                    sample: CsiSample {
                        matrix,
                        captured_at: Utc::now(),
                    },
                });
                sequence += 1;
            }
            Err(e) => {
                log::warn!("CSI collector {}: {}", name, e);
            }
        }

        if let Either::Second(()) = select(Timer::after(interval), stop.wait()).await {
            break;
        }
    }

    log::debug!("CSI collector {} published {} samples", name, sequence);
}
