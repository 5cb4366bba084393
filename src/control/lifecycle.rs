//! lifecycle.rs
//! Process lifecycle manager: at most one simulation process per bridge.
//!
//! `start` is idempotent (liveness check first). `stop` is a two-phase
//! shutdown: reset the bridge to neutral, request graceful termination,
//! wait a bounded grace period, then force-kill; the recorded process
//! identity is cleared unconditionally. Liveness is always asked of the
//! OS, never a manager-side flag: the child can die on its own (window
//! closed, signal received) without the manager hearing about it.

use log::{debug, error, info};
use parking_lot::Mutex;
use std::{
    io,
    path::Path,
    process::{Child, Command},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use crate::control::bridge::ControlBridge;
use crate::error::LifecycleError;
use crate::sim::SimKind;
use crate::utils::events::{Event, EventRecorder};

const STOP_GRACE: Duration = Duration::from_secs(1);
const STOP_POLL: Duration = Duration::from_millis(25);

/// One running simulation process, as seen by the manager. Abstracted so
/// tests can substitute a fake backend for the OS child.
pub trait SimProcess: Send {
    fn id(&self) -> u32;
    /// Ask the OS whether the process is still alive.
    fn is_alive(&mut self) -> bool;
    /// Request graceful termination (SIGTERM or equivalent).
    fn terminate(&mut self) -> io::Result<()>;
    /// Force termination. Best effort; errors are the caller's to log.
    fn kill(&mut self) -> io::Result<()>;
}

/// Spawns simulation processes for a given kind and bridge path.
pub trait SimLauncher: Send + Sync {
    fn launch(&self, kind: SimKind, bridge_path: &Path) -> io::Result<Box<dyn SimProcess>>;
}

struct OsSimProcess {
    child: Child,
}

impl SimProcess for OsSimProcess {
    fn id(&self) -> u32 {
        self.child.id()
    }

    fn is_alive(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    fn terminate(&mut self) -> io::Result<()> {
        let rc = unsafe { libc::kill(self.child.id() as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }
}

/// Default launcher: re-exec the current binary in simulation mode, handing
/// the child the bridge path to poll.
pub struct OsLauncher;

impl SimLauncher for OsLauncher {
    fn launch(&self, kind: SimKind, bridge_path: &Path) -> io::Result<Box<dyn SimProcess>> {
        let exe = std::env::current_exe()?;
        let child = Command::new(exe)
            .arg("--sim")
            .arg(kind.as_str())
            .arg("--bridge")
            .arg(bridge_path)
            .spawn()?;
        Ok(Box::new(OsSimProcess { child }))
    }
}

/// Per-channel lifecycle: STOPPED → (start) → RUNNING → (stop | independent
/// exit) → STOPPED. `start` while running and `stop` while stopped are
/// no-ops.
pub struct SimulationLifecycle {
    kind: SimKind,
    bridge: Arc<ControlBridge>,
    launcher: Box<dyn SimLauncher>,
    proc: Mutex<Option<Box<dyn SimProcess>>>,
    recorder: Arc<EventRecorder>,
}

impl SimulationLifecycle {
    pub fn new(
        kind: SimKind,
        bridge: Arc<ControlBridge>,
        launcher: Box<dyn SimLauncher>,
        recorder: Arc<EventRecorder>,
    ) -> Self {
        Self {
            kind,
            bridge,
            launcher,
            proc: Mutex::new(None),
            recorder,
        }
    }

    pub fn kind(&self) -> SimKind {
        self.kind
    }

    /// True iff a process identity is recorded and the OS confirms it is
    /// alive. A child that died on its own is forgotten here.
    pub fn is_running(&self) -> bool {
        let mut slot = self.proc.lock();
        match slot.as_mut() {
            Some(proc) => {
                if proc.is_alive() {
                    true
                } else {
                    debug!("[{}] simulation exited on its own", self.kind);
                    *slot = None;
                    false
                }
            }
            None => false,
        }
    }

    /// Spawn the simulation process unless one is already alive. A failed
    /// launch leaves the bridge at neutral.
    pub fn start(&self) -> Result<(), LifecycleError> {
        if self.is_running() {
            debug!("[{}] start ignored: already running", self.kind);
            return Ok(());
        }
        match self.launcher.launch(self.kind, self.bridge.path()) {
            Ok(proc) => {
                info!("[{}] simulation started (pid {})", self.kind, proc.id());
                self.recorder.record(Event::SimulationStarted {
                    ts_ns: self.recorder.now_ns(),
                    pid: proc.id(),
                });
                *self.proc.lock() = Some(proc);
                Ok(())
            }
            Err(e) => {
                error!("[{}] simulation failed to start: {e}", self.kind);
                self.bridge.reset();
                Err(LifecycleError::Launch(e))
            }
        }
    }

    /// Two-phase stop. Never raises: signal failures are logged and
    /// followed by an unconditional force-kill attempt.
    pub fn stop(&self) {
        // Reset before signaling so a child finishing its last frame reads
        // neutral, not a stale biased value.
        self.bridge.reset();

        let Some(mut proc) = self.proc.lock().take() else {
            debug!("[{}] stop ignored: not running", self.kind);
            return;
        };

        let mut forced = false;
        if proc.is_alive() {
            if let Err(e) = proc.terminate() {
                error!("[{}] graceful stop failed: {e}", self.kind);
                if let Err(e) = proc.kill() {
                    error!("[{}] force kill failed: {e}", self.kind);
                }
                forced = true;
            }

            let deadline = Instant::now() + STOP_GRACE;
            while proc.is_alive() && Instant::now() < deadline {
                thread::sleep(STOP_POLL);
            }
            if proc.is_alive() {
                if let Err(e) = proc.kill() {
                    error!("[{}] force kill failed: {e}", self.kind);
                }
                forced = true;
            }
        }

        info!("[{}] simulation stopped (forced={forced})", self.kind);
        self.recorder.record(Event::SimulationStopped {
            ts_ns: self.recorder.now_ns(),
            forced,
        });
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

    /// Shared state observed by a test and mutated by its fake processes.
    #[derive(Default)]
    pub struct FakeWorld {
        pub alive: AtomicBool,
        pub launches: AtomicUsize,
        pub terminates: AtomicUsize,
        pub kills: AtomicUsize,
        pub next_pid: AtomicU32,
        pub fail_terminate: AtomicBool,
        pub ignore_terminate: AtomicBool,
    }

    pub struct FakeProcess {
        pub pid: u32,
        pub world: Arc<FakeWorld>,
    }

    impl SimProcess for FakeProcess {
        fn id(&self) -> u32 {
            self.pid
        }

        fn is_alive(&mut self) -> bool {
            self.world.alive.load(Ordering::SeqCst)
        }

        fn terminate(&mut self) -> io::Result<()> {
            self.world.terminates.fetch_add(1, Ordering::SeqCst);
            if self.world.fail_terminate.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "EPERM"));
            }
            if !self.world.ignore_terminate.load(Ordering::SeqCst) {
                self.world.alive.store(false, Ordering::SeqCst);
            }
            Ok(())
        }

        fn kill(&mut self) -> io::Result<()> {
            self.world.kills.fetch_add(1, Ordering::SeqCst);
            self.world.alive.store(false, Ordering::SeqCst);
            Ok(())
        }
    }

    pub struct FakeLauncher {
        pub world: Arc<FakeWorld>,
        pub fail_launch: bool,
    }

    impl SimLauncher for FakeLauncher {
        fn launch(&self, _kind: SimKind, _bridge: &Path) -> io::Result<Box<dyn SimProcess>> {
            if self.fail_launch {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no exe"));
            }
            self.world.launches.fetch_add(1, Ordering::SeqCst);
            self.world.alive.store(true, Ordering::SeqCst);
            let pid = self.world.next_pid.fetch_add(1, Ordering::SeqCst) + 1000;
            Ok(Box::new(FakeProcess {
                pid,
                world: Arc::clone(&self.world),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::control::bridge::{test_bridge_path, NEUTRAL_CONTROL_VALUE};
    use std::sync::atomic::Ordering;

    fn lifecycle(tag: &str, world: &Arc<FakeWorld>, fail_launch: bool) -> (SimulationLifecycle, Arc<ControlBridge>) {
        let bridge = Arc::new(ControlBridge::create(&test_bridge_path(tag)).unwrap());
        let lc = SimulationLifecycle::new(
            SimKind::Race,
            Arc::clone(&bridge),
            Box::new(FakeLauncher {
                world: Arc::clone(world),
                fail_launch,
            }),
            Arc::new(EventRecorder::new()),
        );
        (lc, bridge)
    }

    #[test]
    fn double_start_spawns_exactly_one_process() {
        let world = Arc::new(FakeWorld::default());
        let (lc, _bridge) = lifecycle("lc_double_start", &world, false);

        lc.start().unwrap();
        lc.start().unwrap();
        assert_eq!(world.launches.load(Ordering::SeqCst), 1);
        assert!(lc.is_running());
    }

    #[test]
    fn stop_resets_bridge_before_anything_else() {
        let world = Arc::new(FakeWorld::default());
        let (lc, bridge) = lifecycle("lc_stop_reset", &world, false);

        lc.start().unwrap();
        bridge.publish(97);
        lc.stop();
        assert_eq!(bridge.read(), NEUTRAL_CONTROL_VALUE);
        assert!(!lc.is_running());
    }

    #[test]
    fn stop_when_stopped_is_a_noop_and_leaves_neutral() {
        let world = Arc::new(FakeWorld::default());
        let (lc, bridge) = lifecycle("lc_stop_noop", &world, false);

        lc.stop();
        lc.stop();
        assert_eq!(bridge.read(), NEUTRAL_CONTROL_VALUE);
        assert_eq!(world.terminates.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn graceful_failure_escalates_to_force_kill() {
        let world = Arc::new(FakeWorld::default());
        world.fail_terminate.store(true, Ordering::SeqCst);
        let (lc, _bridge) = lifecycle("lc_escalate", &world, false);

        lc.start().unwrap();
        lc.stop();
        assert!(world.kills.load(Ordering::SeqCst) >= 1);
        assert!(!lc.is_running());
    }

    #[test]
    fn stubborn_child_is_killed_after_grace_period() {
        let world = Arc::new(FakeWorld::default());
        world.ignore_terminate.store(true, Ordering::SeqCst);
        let (lc, _bridge) = lifecycle("lc_stubborn", &world, false);

        lc.start().unwrap();
        lc.stop();
        assert_eq!(world.terminates.load(Ordering::SeqCst), 1);
        assert_eq!(world.kills.load(Ordering::SeqCst), 1);
        assert!(!lc.is_running());
    }

    #[test]
    fn failed_launch_resets_bridge_and_reports() {
        let world = Arc::new(FakeWorld::default());
        let (lc, bridge) = lifecycle("lc_fail_launch", &world, true);

        bridge.publish(70);
        assert!(lc.start().is_err());
        assert_eq!(bridge.read(), NEUTRAL_CONTROL_VALUE);
        assert!(!lc.is_running());
    }

    #[test]
    fn independent_exit_clears_recorded_identity() {
        let world = Arc::new(FakeWorld::default());
        let (lc, _bridge) = lifecycle("lc_indep_exit", &world, false);

        lc.start().unwrap();
        // Child dies without telling the manager.
        world.alive.store(false, Ordering::SeqCst);
        assert!(!lc.is_running());

        // A fresh start is allowed afterwards.
        lc.start().unwrap();
        assert_eq!(world.launches.load(Ordering::SeqCst), 2);
    }
}
