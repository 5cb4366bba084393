//! publisher.rs
//! Drain-and-publish consumer: the 100 ms timer tick between the sample
//! queue and the control bridge.
//!
//! Each tick drains the queue to empty (non-blocking). An empty batch has
//! no observable effect. A non-empty batch goes to the UI sink in full for
//! plotting; if the simulation process is alive, only the *last* sample is
//! published to the bridge. Control reacts to the latest reading, never an
//! average, so a spike is reflected without lag-smoothing.

use log::debug;
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::acquisition::queue::SampleQueue;
use crate::control::bridge::ControlBridge;
use crate::control::lifecycle::SimulationLifecycle;
use crate::utils::events::{Event, EventRecorder};

/// Consumer tick period. Worst-case staleness between sample arrival and
/// control propagation is one period.
pub const DRAIN_PERIOD: Duration = Duration::from_millis(100);

/// UI-facing collaborator receiving each drained batch for plotting. The
/// dashboard itself is out of scope; this is its seam.
pub trait SampleSink: Send + Sync {
    fn extend(&self, batch: &[f64]);
}

/// Default sink: batch sizes at debug level, nothing else.
pub struct LogSink;

impl SampleSink for LogSink {
    fn extend(&self, batch: &[f64]) {
        debug!("drained batch of {} samples", batch.len());
    }
}

pub struct DrainPublisher {
    queue: Arc<SampleQueue>,
    bridge: Arc<ControlBridge>,
    lifecycle: Arc<SimulationLifecycle>,
    sink: Arc<dyn SampleSink>,
    recorder: Arc<EventRecorder>,
}

impl DrainPublisher {
    pub fn new(
        queue: Arc<SampleQueue>,
        bridge: Arc<ControlBridge>,
        lifecycle: Arc<SimulationLifecycle>,
        sink: Arc<dyn SampleSink>,
        recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            queue,
            bridge,
            lifecycle,
            sink,
            recorder,
        }
    }

    /// One consumer tick. O(batch) work, no blocking calls.
    pub fn tick(&self) {
        let batch = self.queue.drain();
        if batch.is_empty() {
            return;
        }

        self.recorder.record(Event::BatchDrained {
            ts_ns: self.recorder.now_ns(),
            len: batch.len(),
        });
        self.sink.extend(&batch);

        if !self.lifecycle.is_running() {
            return;
        }
        // Earlier samples in the batch exist only for plotting.
        if let Some(value) = batch.last().copied().filter(|v| v.is_finite()) {
            let value = value.round() as i32;
            self.bridge.publish(value);
            self.recorder.record(Event::ControlPublished {
                ts_ns: self.recorder.now_ns(),
                value,
            });
        } else {
            // Loss of one control update is acceptable; a crashed
            // consumer is not.
            debug!("skipping control publish: non-finite sample");
        }
    }

    /// Run `tick()` on a fixed-period timer thread until stopped. The
    /// publisher is shared, so callers may also tick it directly.
    pub fn spawn(self: &Arc<Self>, period: Duration) -> PublisherHandle {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let publisher = Arc::clone(self);

        let join = thread::spawn(move || {
            let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
            while flag.load(Ordering::Acquire) {
                publisher.tick();
                sleeper.sleep(period);
            }
        });

        PublisherHandle {
            running,
            join: Some(join),
        }
    }
}

/// Stops the timer thread on `stop()` or drop.
pub struct PublisherHandle {
    running: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl PublisherHandle {
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for PublisherHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
