//! session.rs
//! Explicit per-channel session object: one sensor connection bound to one
//! simulation instance.
//!
//! Owns the queue, the bridge, the publisher timer, the acquisition handle
//! and the lifecycle manager, so channel state lives in one place instead
//! of module-level globals. Every command here is idempotent: connect
//! replaces an existing connection, disconnect/stop on an idle channel are
//! no-ops.

use dashmap::DashMap;
use log::info;
use std::{path::Path, sync::Arc, time::Duration};

use crate::acquisition::driver::SignalSource;
use crate::acquisition::queue::SampleQueue;
use crate::acquisition::worker::{self, AcquisitionHandle};
use crate::control::bridge::ControlBridge;
use crate::control::lifecycle::{SimLauncher, SimulationLifecycle};
use crate::control::publisher::{DrainPublisher, PublisherHandle, SampleSink, DRAIN_PERIOD};
use crate::error::{LifecycleError, SessionError};
use crate::sim::SimKind;
use crate::utils::events::EventRecorder;

pub struct ChannelSession {
    name: String,
    queue: Arc<SampleQueue>,
    bridge: Arc<ControlBridge>,
    lifecycle: Arc<SimulationLifecycle>,
    publisher: Arc<DrainPublisher>,
    timer: Option<PublisherHandle>,
    acquisition: Option<AcquisitionHandle>,
    recorder: Arc<EventRecorder>,
}

impl ChannelSession {
    /// Allocate the channel's bridge and start its drain timer. The bridge
    /// outlives individual simulation runs; it dies with the session.
    pub fn new(
        name: &str,
        kind: SimKind,
        bridge_path: &Path,
        launcher: Box<dyn SimLauncher>,
        sink: Arc<dyn SampleSink>,
        recorder: Arc<EventRecorder>,
    ) -> Result<Self, SessionError> {
        Self::with_drain_period(name, kind, bridge_path, launcher, sink, recorder, DRAIN_PERIOD)
    }

    /// Same as `new` with an explicit drain period (tests slow the timer
    /// down and tick manually).
    pub fn with_drain_period(
        name: &str,
        kind: SimKind,
        bridge_path: &Path,
        launcher: Box<dyn SimLauncher>,
        sink: Arc<dyn SampleSink>,
        recorder: Arc<EventRecorder>,
        drain_period: Duration,
    ) -> Result<Self, SessionError> {
        let queue = Arc::new(SampleQueue::new());
        let bridge = Arc::new(ControlBridge::create(bridge_path)?);
        let lifecycle = Arc::new(SimulationLifecycle::new(
            kind,
            Arc::clone(&bridge),
            launcher,
            Arc::clone(&recorder),
        ));
        let publisher = Arc::new(DrainPublisher::new(
            Arc::clone(&queue),
            Arc::clone(&bridge),
            Arc::clone(&lifecycle),
            sink,
            Arc::clone(&recorder),
        ));
        let timer = publisher.spawn(drain_period);

        Ok(Self {
            name: name.to_string(),
            queue,
            bridge,
            lifecycle,
            publisher,
            timer: Some(timer),
            acquisition: None,
            recorder,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn queue(&self) -> &Arc<SampleQueue> {
        &self.queue
    }

    pub fn bridge(&self) -> &Arc<ControlBridge> {
        &self.bridge
    }

    pub fn recorder(&self) -> &Arc<EventRecorder> {
        &self.recorder
    }

    /// Force one consumer tick. The timer does this on its own; tests and
    /// the demo summary use it for determinism.
    pub fn pump(&self) {
        self.publisher.tick();
    }

    /// Attach a connected driver. A previous connection is torn down first
    /// and pending samples are discarded so the new run starts clean.
    pub fn connect(&mut self, driver: Box<dyn SignalSource>) {
        if let Some(mut old) = self.acquisition.take() {
            info!("[{}] replacing existing acquisition", self.name);
            old.stop();
        }
        self.queue.clear();
        self.acquisition = Some(worker::spawn(
            self.name.clone(),
            driver,
            Arc::clone(&self.queue),
            Arc::clone(&self.recorder),
        ));
    }

    /// Stop acquisition, discard pending samples, return the bridge to
    /// neutral. No-op when nothing is connected.
    pub fn disconnect(&mut self) {
        let Some(mut handle) = self.acquisition.take() else {
            return;
        };
        handle.stop();
        self.queue.clear();
        self.bridge.reset();
        info!("[{}] acquisition disconnected", self.name);
    }

    pub fn is_acquiring(&self) -> bool {
        self.acquisition.as_ref().is_some_and(|h| h.is_running())
    }

    pub fn start_simulation(&self) -> Result<(), LifecycleError> {
        self.lifecycle.start()
    }

    pub fn stop_simulation(&self) {
        self.lifecycle.stop()
    }

    pub fn is_simulation_running(&self) -> bool {
        self.lifecycle.is_running()
    }

    /// Tear everything down: acquisition, simulation, drain timer.
    pub fn close(&mut self) {
        self.disconnect();
        self.lifecycle.stop();
        if let Some(mut timer) = self.timer.take() {
            timer.stop();
        }
    }
}

impl Drop for ChannelSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// All live channels, keyed by name ("player1", "player2", ...).
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, ChannelSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: ChannelSession) {
        self.sessions.insert(session.name().to_string(), session);
    }

    /// Run a command against one channel. Returns None for unknown names.
    pub fn with<R>(&self, name: &str, f: impl FnOnce(&mut ChannelSession) -> R) -> Option<R> {
        self.sessions.get_mut(name).map(|mut s| f(&mut s))
    }

    pub fn remove(&self, name: &str) -> Option<ChannelSession> {
        self.sessions.remove(name).map(|(_, s)| s)
    }

    pub fn names(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
