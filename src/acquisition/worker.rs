//! worker.rs
//! Acquisition worker: one thread per active sensor connection.
//!
//! Polls the driver at its declared sample rate with a `SpinSleeper`, pushes
//! every sample into the shared queue, and exits as soon as the stop flag
//! flips (bounded by one sample period of latency). Transient read errors
//! are logged and swallowed: driver hiccups must not kill the thread.

use log::{debug, warn};
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crate::acquisition::driver::SignalSource;
use crate::acquisition::queue::SampleQueue;
use crate::utils::events::{Event, EventRecorder};

/// Handle to a running acquisition thread. `stop()` flips the shared flag
/// and joins; dropping the handle does the same.
pub struct AcquisitionHandle {
    running: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl AcquisitionHandle {
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Request the worker to stop and wait for it to exit. Idempotent.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for AcquisitionHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the acquisition loop for one connected driver.
pub fn spawn(
    name: String,
    mut driver: Box<dyn SignalSource>,
    queue: Arc<SampleQueue>,
    recorder: Arc<EventRecorder>,
) -> AcquisitionHandle {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    let join = thread::spawn(move || {
        let period = Duration::from_secs_f64(1.0 / driver.sample_rate().max(f64::MIN_POSITIVE));
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let mut seq: u64 = 0;

        while flag.load(Ordering::Acquire) {
            match driver.read_one() {
                Ok(sample) => {
                    seq += 1;
                    queue.push(sample);
                    recorder.record(Event::SampleQueued {
                        seq,
                        ts_ns: recorder.now_ns(),
                    });
                }
                Err(e) => {
                    // Catch-and-continue: only the stop flag ends this loop.
                    if flag.load(Ordering::Acquire) {
                        warn!("[{name}] read error: {e}");
                    }
                }
            }
            sleeper.sleep(period);
        }

        driver.shutdown();
        debug!("[{name}] acquisition stopped after {seq} samples");
    });

    AcquisitionHandle {
        running,
        join: Some(join),
    }
}
