//! engine.rs
//! Shared shape of both simulation engines: a fixed-rate tick loop that
//! polls the control bridge, applies hysteresis inside the domain state,
//! advances it once, and renders one frame.
//!
//! The tick rate (60 Hz) is deliberately unrelated to the acquisition
//! sample rate; that decoupling is why the control value is a polled
//! scalar and not a pushed event. Without a bridge the engine runs in
//! manual mode: up/down inputs stand in for the biosignal, lateral inputs
//! and quit work in both modes.

use crossbeam::channel::Receiver;
use spin_sleep::{SpinSleeper, SpinStrategy};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use crate::control::bridge::ControlBridge;

/// Inputs the engine honors. `Lateral` is always accepted; `Manual` only
/// in keyboard mode (a bridge overrides the controlled axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Lateral(i32),
    Manual(i32),
    Quit,
}

/// One rendered frame's destination. Graphics are out of scope; the crate
/// ships a rate-limited text HUD.
pub trait FrameSink {
    fn present(&mut self, lines: &[String]);
}

/// Prints the HUD every `every` frames (60 Hz loop → every=30 is 2 Hz).
pub struct ConsoleHud {
    every: u32,
    frame: u32,
}

impl ConsoleHud {
    pub fn new(every: u32) -> Self {
        Self {
            every: every.max(1),
            frame: 0,
        }
    }
}

impl FrameSink for ConsoleHud {
    fn present(&mut self, lines: &[String]) {
        self.frame = self.frame.wrapping_add(1);
        if self.frame % self.every == 0 {
            println!("--- {}", lines.join(" | "));
        }
    }
}

/// Sink for headless runs and tests.
pub struct NullSink;

impl FrameSink for NullSink {
    fn present(&mut self, _lines: &[String]) {}
}

/// What a domain must provide to run under the engine loop.
pub trait Simulation: Send {
    /// Apply one polled control value through the domain's hysteresis.
    fn apply_signal(&mut self, signal: i32);
    /// Keyboard substitute for the controlled axis (manual mode only).
    fn manual_adjust(&mut self, delta: i32);
    /// Lateral input; accepted regardless of control mode.
    fn shift_lane(&mut self, dir: i32);
    /// Advance domain state exactly once.
    fn step(&mut self, dt: f64);
    fn hud(&self) -> Vec<String>;
}

const DEFAULT_TICK_HZ: u32 = 60;
// Guards against a huge first dt after a scheduler stall.
const MAX_DT_SECS: f64 = 0.25;

pub struct EngineLoop {
    tick_hz: u32,
}

impl Default for EngineLoop {
    fn default() -> Self {
        Self {
            tick_hz: DEFAULT_TICK_HZ,
        }
    }
}

impl EngineLoop {
    pub fn new(tick_hz: u32) -> Self {
        Self {
            tick_hz: tick_hz.max(1),
        }
    }

    /// Run until a quit input arrives or `quit` flips true. The loop never
    /// self-terminates from simulation logic; goal-reached conditions reset
    /// domain state instead of exiting.
    pub fn run(
        &self,
        sim: &mut dyn Simulation,
        bridge: Option<&ControlBridge>,
        inputs: &Receiver<InputEvent>,
        quit: &AtomicBool,
        sink: &mut dyn FrameSink,
    ) {
        let period = Duration::from_secs_f64(1.0 / self.tick_hz as f64);
        let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);
        let mut next_deadline = Instant::now() + period;
        let mut last_tick = Instant::now();

        while !quit.load(Ordering::Acquire) {
            let now = Instant::now();
            if now < next_deadline {
                sleeper.sleep(next_deadline - now);
            }
            next_deadline += period;

            let tick = Instant::now();
            let dt = tick.duration_since(last_tick).as_secs_f64().min(MAX_DT_SECS);
            last_tick = tick;

            if let Some(bridge) = bridge {
                sim.apply_signal(bridge.read());
            }

            for ev in inputs.try_iter() {
                match ev {
                    InputEvent::Lateral(dir) => sim.shift_lane(dir),
                    InputEvent::Manual(delta) => {
                        if bridge.is_none() {
                            sim.manual_adjust(delta);
                        }
                    }
                    InputEvent::Quit => return,
                }
            }

            sim.step(dt);
            sink.present(&sim.hud());
        }
    }
}
