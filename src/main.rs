//! # Biofeedback Pipeline Entry Point
//!
//! Two personalities in one binary:
//! - **Monitor (default):** interactive menu that connects a simulated
//!   headset, runs the acquisition → queue → consumer → bridge pipeline,
//!   and manages the simulation child process.
//! - **Simulation child (`--sim race|garden [--bridge <path>]`):** the
//!   process the lifecycle manager spawns. With a bridge path it polls the
//!   shared control value at 60 Hz; without one it runs standalone on
//!   keyboard-style stdin input (w/s speed, a/d lanes, q quits).

use crossbeam::channel::{unbounded, Sender};
use log::{error, info};
use std::{
    io::{stdin, stdout, BufRead, Write},
    path::PathBuf,
    sync::atomic::{AtomicBool, Ordering},
    sync::Arc,
    thread,
    time::Duration,
};

use mindbridge::acquisition::driver::SimulatedHeadset;
use mindbridge::control::bridge::ControlBridge;
use mindbridge::control::lifecycle::OsLauncher;
use mindbridge::control::publisher::LogSink;
use mindbridge::control::session::ChannelSession;
use mindbridge::sim::engine::{ConsoleHud, EngineLoop, InputEvent};
use mindbridge::sim::garden::{GardenConfig, GardenState};
use mindbridge::sim::race::{RaceConfig, RaceState};
use mindbridge::sim::SimKind;
use mindbridge::utils::events::EventRecorder;

const DEFAULT_DEMO_SECS: u64 = 30;
const HUD_FRAME_DIVIDER: u32 = 30; // 60 Hz loop → HUD at 2 Hz

static QUIT: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_sigterm(_sig: libc::c_int) {
    // Async-signal-safe: a single atomic store.
    QUIT.store(true, Ordering::Relaxed);
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if let Some(kind) = arg_value(&args, "--sim") {
        let kind: SimKind = match kind.parse() {
            Ok(k) => k,
            Err(e) => {
                error!("{e}");
                std::process::exit(2);
            }
        };
        let bridge_path = arg_value(&args, "--bridge").map(PathBuf::from);
        run_simulation_child(kind, bridge_path);
        return;
    }

    info!("=== BIOFEEDBACK PIPELINE START ===");
    loop {
        match prompt_menu().as_str() {
            "1" => run_demo(SimKind::Race),
            "2" => run_demo(SimKind::Garden),
            "3" => run_simulation_child(SimKind::Race, None),
            "4" => run_simulation_child(SimKind::Garden, None),
            "5" | "" => {
                println!("Goodbye!");
                info!("=== BIOFEEDBACK PIPELINE FINISHED ===");
                return;
            }
            other => println!("Unrecognized option '{other}', please try again."),
        }
    }
}

fn arg_value(args: &[String], key: &str) -> Option<String> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

fn prompt_menu() -> String {
    println!("\n┌──────────────────────────────────────────┐");
    println!("│        SELECT MODE                       │");
    println!("├──────────────────────────────────────────┤");
    println!("│  1) Race    — simulated headset demo     │");
    println!("│  2) Garden  — simulated headset demo     │");
    println!("│  3) Race    — standalone (keyboard)      │");
    println!("│  4) Garden  — standalone (keyboard)      │");
    println!("│  5) Exit                                 │");
    println!("└──────────────────────────────────────────┘");
    print!("Select [1-5] (default: 5): ");
    let _ = stdout().flush();

    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    input.trim().to_string()
}

fn prompt_line(label: &str, default: &str) -> String {
    print!("{label} [default: {default}]: ");
    let _ = stdout().flush();
    let mut input = String::new();
    let _ = stdin().read_line(&mut input);
    let trimmed = input.trim();
    if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Full-pipeline demo: simulated headset → session → child process.
fn run_demo(kind: SimKind) {
    let signal_kind = prompt_line("Signal kind", "attention");
    let secs = prompt_line("Run for how many seconds", &DEFAULT_DEMO_SECS.to_string())
        .parse::<u64>()
        .unwrap_or(DEFAULT_DEMO_SECS);

    let driver = match SimulatedHeadset::connect("sim0", &signal_kind) {
        Ok(d) => d,
        Err(e) => {
            println!("Cannot connect: {e}");
            return;
        }
    };

    let recorder = Arc::new(EventRecorder::new());
    let trace_path = std::env::temp_dir().join(format!(
        "mindbridge_trace_{}_{kind}.csv",
        std::process::id()
    ));
    let mut exporter = recorder.start_exporter(trace_path.display().to_string());
    info!("pipeline trace: {}", trace_path.display());

    let bridge_path =
        std::env::temp_dir().join(format!("mindbridge_{}_{kind}.cell", std::process::id()));
    let mut session = match ChannelSession::new(
        "player1",
        kind,
        &bridge_path,
        Box::new(OsLauncher),
        Arc::new(LogSink),
        Arc::clone(&recorder),
    ) {
        Ok(s) => s,
        Err(e) => {
            error!("cannot open channel: {e}");
            return;
        }
    };

    session.connect(Box::new(driver));
    if let Err(e) = session.start_simulation() {
        error!("{e}");
        session.close();
        return;
    }

    println!("Running '{kind}' for {secs} s; quit early from the simulation window with 'q'.");
    let deadline = std::time::Instant::now() + Duration::from_secs(secs);
    while std::time::Instant::now() < deadline && session.is_simulation_running() {
        thread::sleep(Duration::from_millis(200));
    }

    session.close();
    exporter.stop();
    println!("Demo finished.\n");
}

/// Simulation process body, also reachable as the standalone game.
fn run_simulation_child(kind: SimKind, bridge_path: Option<PathBuf>) {
    unsafe {
        libc::signal(libc::SIGTERM, handle_sigterm as libc::sighandler_t);
    }
    QUIT.store(false, Ordering::Relaxed);

    let bridge = match bridge_path {
        Some(path) => match ControlBridge::open(&path) {
            Ok(b) => Some(b),
            Err(e) => {
                error!("cannot open control bridge: {e}");
                std::process::exit(1);
            }
        },
        None => None,
    };

    let (tx, rx) = unbounded();
    let _input_thread = spawn_stdin_reader(tx);

    let mode = if bridge.is_some() { "bridge" } else { "keyboard" };
    println!("[{kind}] running in {mode} mode (a/d lanes, w/s manual, q quits)");

    let engine = EngineLoop::default();
    let mut hud = ConsoleHud::new(HUD_FRAME_DIVIDER);
    match kind {
        SimKind::Race => {
            let mut race = RaceState::new(RaceConfig::default());
            engine.run(&mut race, bridge.as_ref(), &rx, &QUIT, &mut hud);
            report_race(&race);
        }
        SimKind::Garden => {
            let mut garden = GardenState::new(GardenConfig::default());
            engine.run(&mut garden, bridge.as_ref(), &rx, &QUIT, &mut hud);
        }
    }
}

fn report_race(race: &RaceState) {
    let summary = race.summary();
    println!(
        "Session over: {:.2} s, {:.1}% of the time above the attention threshold",
        summary.elapsed_secs,
        summary.focus_ratio * 100.0
    );
    match serde_json::to_string(&summary) {
        Ok(json) => info!("race summary: {json}"),
        Err(e) => error!("cannot serialize summary: {e}"),
    }
}

/// Map stdin lines to engine inputs until EOF or a quit command.
fn spawn_stdin_reader(tx: Sender<InputEvent>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let stdin = stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let event = match line.trim() {
                "a" | "left" => Some(InputEvent::Lateral(-1)),
                "d" | "right" => Some(InputEvent::Lateral(1)),
                "w" | "up" => Some(InputEvent::Manual(1)),
                "s" | "down" => Some(InputEvent::Manual(-1)),
                "q" | "quit" => Some(InputEvent::Quit),
                _ => None,
            };
            if let Some(event) = event {
                let quit = event == InputEvent::Quit;
                if tx.send(event).is_err() || quit {
                    break;
                }
            }
        }
    })
}
