//! events.rs
//! Lock-free pipeline trace: every stage of the biofeedback loop records a
//! timestamped event without blocking the hot path.
//!
//! - `record()` appends to a bounded `ArrayQueue`; full queue drops silently.
//! - `start_exporter()` spawns a background thread draining the queue to a
//!   CSV trace file (diagnostics, not signal history).
//! - Tests drain the queue in-process via `drain()`.

use crossbeam_queue::ArrayQueue;
use log::error;
use std::{
    fs::File,
    io::{BufWriter, Write},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

const EVENT_QUEUE_CAPACITY: usize = 16_384;
const EXPORTER_POLL_MS: u64 = 20;

/// One traced moment in the sample → control → simulation pipeline.
#[derive(Debug, Clone)]
pub enum Event {
    /// Acquisition worker pushed a sample into the queue.
    SampleQueued { seq: u64, ts_ns: u64 },
    /// Consumer drained a non-empty batch.
    BatchDrained { ts_ns: u64, len: usize },
    /// Consumer wrote the freshest sample into the control bridge.
    ControlPublished { ts_ns: u64, value: i32 },
    /// Lifecycle manager spawned a simulation process.
    SimulationStarted { ts_ns: u64, pid: u32 },
    /// Lifecycle manager confirmed the simulation is gone.
    SimulationStopped { ts_ns: u64, forced: bool },
}

impl Event {
    fn to_csv_row(&self) -> String {
        match self {
            Event::SampleQueued { seq, ts_ns } => {
                format!("{ts_ns},acquisition,SampleQueued,{seq},")
            }
            Event::BatchDrained { ts_ns, len } => {
                format!("{ts_ns},consumer,BatchDrained,{len},")
            }
            Event::ControlPublished { ts_ns, value } => {
                format!("{ts_ns},consumer,ControlPublished,,{value}")
            }
            Event::SimulationStarted { ts_ns, pid } => {
                format!("{ts_ns},lifecycle,SimulationStarted,{pid},")
            }
            Event::SimulationStopped { ts_ns, forced } => {
                format!("{ts_ns},lifecycle,SimulationStopped,,{forced}")
            }
        }
    }
}

/// Non-blocking recorder shared by all pipeline stages.
pub struct EventRecorder {
    queue: Arc<ArrayQueue<Event>>,
    run_start: Instant,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecorder {
    pub fn new() -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(EVENT_QUEUE_CAPACITY)),
            run_start: Instant::now(),
        }
    }

    /// Append an event. Never blocks; drops when the queue is full.
    #[inline]
    pub fn record(&self, event: Event) {
        let _ = self.queue.push(event);
    }

    /// Nanoseconds since recorder creation.
    #[inline]
    pub fn now_ns(&self) -> u64 {
        self.run_start.elapsed().as_nanos() as u64
    }

    /// Pop everything currently queued. Used by tests and the demo summary.
    pub fn drain(&self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Some(ev) = self.queue.pop() {
            out.push(ev);
        }
        out
    }

    /// Spawn a background thread writing the trace to `output_csv` until the
    /// returned handle is stopped. Export failures are logged, never raised.
    pub fn start_exporter(&self, output_csv: String) -> ExporterHandle {
        let queue = Arc::clone(&self.queue);
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        let join = thread::spawn(move || {
            let file = match File::create(&output_csv) {
                Ok(f) => f,
                Err(e) => {
                    error!("event exporter: cannot create {output_csv}: {e}");
                    return;
                }
            };
            let mut writer = BufWriter::new(file);
            let _ = writeln!(writer, "ts_ns,component,event,field1,field2");

            loop {
                let mut wrote = false;
                while let Some(ev) = queue.pop() {
                    let _ = writeln!(writer, "{}", ev.to_csv_row());
                    wrote = true;
                }
                if wrote {
                    let _ = writer.flush();
                }
                if !flag.load(Ordering::Acquire) && queue.is_empty() {
                    break;
                }
                thread::sleep(Duration::from_millis(EXPORTER_POLL_MS));
            }
            let _ = writer.flush();
        });

        ExporterHandle {
            running,
            join: Some(join),
        }
    }
}

/// Stops and joins the exporter thread on `stop()` or drop.
pub struct ExporterHandle {
    running: Arc<AtomicBool>,
    join: Option<thread::JoinHandle<()>>,
}

impl ExporterHandle {
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

impl Drop for ExporterHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
