//! garden.rs
//! Garden domain: a row of flower slots grown by sustained attention.
//!
//! Only the current slot is mutable. Once per second (60 ticks) the slot is
//! evaluated: enough accumulated attention grows it one stage and heals it,
//! too little shrinks it and hurts it, and at a stage boundary health moves
//! by a larger delta instead. A finished flower freezes into the completed
//! list and hands its health to the next slot; an empty garden or zero
//! health reseeds everything with a fresh random layout.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::sim::engine::Simulation;
use crate::sim::hysteresis::Hysteresis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GardenConfig {
    pub slot_count: usize,
    pub stages: u8,
    /// Per-slot attention accumulator threshold for growth.
    pub growth_threshold: i32,
    pub lower_threshold: i32,
    pub upper_threshold: i32,
    /// Attention points added/removed per tick outside the dead-band.
    pub control_sensitivity: i32,
    /// Keyboard nudge per manual input.
    pub manual_step: i32,
    /// Ticks between slot evaluations (60 ≈ 1 s at 60 Hz).
    pub eval_ticks: u32,
    pub health_gain: i32,
    pub health_loss: i32,
    /// Health delta at a stage boundary (can't grow/shrink further).
    pub boundary_gain: i32,
    pub boundary_loss: i32,
    /// Horizontal layout range for slot positions.
    pub field_width: i32,
    pub margin: i32,
    pub seed: Option<u64>,
}

impl Default for GardenConfig {
    fn default() -> Self {
        Self {
            slot_count: 5,
            stages: 6,
            growth_threshold: 60,
            lower_threshold: 45,
            upper_threshold: 55,
            control_sensitivity: 1,
            manual_step: 10,
            eval_ticks: 60,
            health_gain: 3,
            health_loss: 3,
            boundary_gain: 7,
            boundary_loss: 3,
            field_width: 800,
            margin: 100,
            seed: None,
        }
    }
}

/// One growth slot. `x` only matters for layout/rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowerSlot {
    pub x: i32,
    pub attention: i32,
    pub threshold: i32,
    pub health: i32,
    pub stage: u8,
    pub ticks: u32,
}

impl FlowerSlot {
    fn new(x: i32, threshold: i32) -> Self {
        Self {
            x,
            attention: 50,
            threshold,
            health: 50,
            stage: 0,
            ticks: 0,
        }
    }
}

pub struct GardenState {
    cfg: GardenConfig,
    hysteresis: Hysteresis,
    slots: Vec<FlowerSlot>,
    completed: Vec<FlowerSlot>,
    current: usize,
    /// Full garden resets since the session started.
    resets: u32,
    rng: StdRng,
}

impl GardenState {
    pub fn new(cfg: GardenConfig) -> Self {
        let hysteresis = Hysteresis {
            lower: cfg.lower_threshold,
            upper: cfg.upper_threshold,
            step: cfg.control_sensitivity,
            min: 0,
            max: 100,
        };
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let mut garden = Self {
            cfg,
            hysteresis,
            slots: Vec::new(),
            completed: Vec::new(),
            current: 0,
            resets: 0,
            rng,
        };
        garden.reseed();
        garden
    }

    /// Fresh random layout; all progress discarded.
    fn reseed(&mut self) {
        let lo = self.cfg.margin;
        let hi = (self.cfg.field_width - self.cfg.margin).max(lo + 1);
        let mut positions: Vec<i32> = (lo..hi).collect();
        positions.shuffle(&mut self.rng);
        positions.truncate(self.cfg.slot_count);

        let threshold = self.cfg.growth_threshold;
        self.slots = positions
            .into_iter()
            .map(|x| FlowerSlot::new(x, threshold))
            .collect();
        self.completed.clear();
        self.current = 0;
    }

    pub fn current_slot(&self) -> &FlowerSlot {
        &self.slots[self.current]
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn completed(&self) -> &[FlowerSlot] {
        &self.completed
    }

    pub fn resets(&self) -> u32 {
        self.resets
    }

    /// One slot evaluation, applied every `eval_ticks` ticks.
    fn evaluate_current(&mut self) {
        let stages = self.cfg.stages;
        let slot = &mut self.slots[self.current];
        if slot.attention >= slot.threshold && slot.stage < stages {
            slot.stage += 1;
            slot.health = (slot.health + self.cfg.health_gain).min(100);
        } else if slot.attention < slot.threshold && slot.stage > 0 {
            slot.health = (slot.health - self.cfg.health_loss).max(0);
            slot.stage -= 1;
        } else {
            // Stage boundary: health absorbs the whole effect.
            let delta = if slot.attention >= slot.threshold {
                self.cfg.boundary_gain
            } else {
                -self.cfg.boundary_loss
            };
            slot.health = (slot.health + delta).clamp(0, 100);
        }
    }
}

impl Simulation for GardenState {
    fn apply_signal(&mut self, signal: i32) {
        let slot = &mut self.slots[self.current];
        slot.attention = self.hysteresis.apply(slot.attention, signal);
    }

    fn manual_adjust(&mut self, delta: i32) {
        let slot = &mut self.slots[self.current];
        slot.attention = (slot.attention + delta * self.cfg.manual_step).clamp(0, 100);
    }

    fn shift_lane(&mut self, _dir: i32) {
        // The garden has no lateral axis.
    }

    fn step(&mut self, _dt: f64) {
        if self.current_slot().health == 0 {
            self.resets += 1;
            self.reseed();
            return;
        }

        {
            let slot = &mut self.slots[self.current];
            slot.ticks += 1;
            if slot.ticks < self.cfg.eval_ticks {
                return;
            }
            slot.ticks = 0;
        }
        self.evaluate_current();

        if self.current_slot().stage == self.cfg.stages {
            let finished = self.slots[self.current].clone();
            let inherited = finished.health;
            self.completed.push(finished);

            let next = self.current + 1;
            if next < self.slots.len() {
                self.slots[next].health = inherited;
                self.current = next;
            } else {
                self.resets += 1;
                self.reseed();
            }
        }
    }

    fn hud(&self) -> Vec<String> {
        let slot = self.current_slot();
        vec![
            format!("flower: {}/{}", self.current + 1, self.slots.len()),
            format!("stage: {}/{}", slot.stage, self.cfg.stages),
            format!("health: {}%", slot.health),
            format!("attention: {}", slot.attention),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn garden() -> GardenState {
        GardenState::new(GardenConfig {
            seed: Some(11),
            ..GardenConfig::default()
        })
    }

    /// Run exactly one evaluation window (60 ticks).
    fn run_window(g: &mut GardenState) {
        for _ in 0..g.cfg.eval_ticks {
            g.step(1.0 / 60.0);
        }
    }

    #[test]
    fn layout_has_distinct_positions_and_one_current_slot() {
        let g = garden();
        assert_eq!(g.slots.len(), 5);
        let mut xs: Vec<i32> = g.slots.iter().map(|s| s.x).collect();
        xs.sort_unstable();
        xs.dedup();
        assert_eq!(xs.len(), 5, "slot positions must be distinct");
        assert_eq!(g.current_index(), 0);
    }

    #[test]
    fn sustained_attention_grows_one_stage_per_window() {
        let mut g = garden();
        g.slots[0].attention = 80; // above per-slot threshold 60
        run_window(&mut g);
        assert_eq!(g.current_slot().stage, 1);
        assert_eq!(g.current_slot().health, 53);

        run_window(&mut g);
        assert_eq!(g.current_slot().stage, 2);
        assert_eq!(g.current_slot().health, 56);
    }

    #[test]
    fn low_attention_shrinks_a_grown_slot() {
        let mut g = garden();
        g.slots[0].attention = 80;
        run_window(&mut g);
        assert_eq!(g.current_slot().stage, 1);

        g.slots[0].attention = 20;
        run_window(&mut g);
        assert_eq!(g.current_slot().stage, 0);
        assert_eq!(g.current_slot().health, 50);
    }

    #[test]
    fn stage_boundary_moves_health_by_larger_delta() {
        let mut g = garden();
        // Stage 0, attention below threshold: can't shrink, health -3.
        g.slots[0].attention = 20;
        run_window(&mut g);
        assert_eq!(g.current_slot().stage, 0);
        assert_eq!(g.current_slot().health, 47);
    }

    #[test]
    fn finished_flower_freezes_and_next_slot_inherits_health() {
        let mut g = garden();
        g.slots[0].attention = 90;
        for _ in 0..6 {
            run_window(&mut g);
        }
        assert_eq!(g.completed().len(), 1);
        assert_eq!(g.completed()[0].stage, 6);
        assert_eq!(g.current_index(), 1);
        // 50 + 6 growth windows × +3 = 68, inherited by slot 1.
        assert_eq!(g.current_slot().health, 68);
        assert_eq!(g.current_slot().stage, 0);
    }

    #[test]
    fn zero_health_resets_the_whole_garden() {
        let mut g = garden();
        g.slots[0].health = 0;
        g.step(1.0 / 60.0);
        assert_eq!(g.resets(), 1);
        assert_eq!(g.current_index(), 0);
        assert_eq!(g.current_slot().health, 50);
        assert!(g.completed().is_empty());
    }

    #[test]
    fn exhausting_every_slot_resets_the_garden() {
        let mut g = GardenState::new(GardenConfig {
            slot_count: 2,
            seed: Some(3),
            ..GardenConfig::default()
        });
        g.slots[0].attention = 90;
        for _ in 0..6 {
            run_window(&mut g);
        }
        assert_eq!(g.current_index(), 1);
        g.slots[1].attention = 90;
        for _ in 0..6 {
            run_window(&mut g);
        }
        // Second flower finished, no slot left: fresh garden.
        assert_eq!(g.resets(), 1);
        assert_eq!(g.current_index(), 0);
        assert!(g.completed().is_empty());
    }

    #[test]
    fn hysteresis_drives_the_attention_accumulator() {
        let mut g = garden();
        g.apply_signal(70); // above upper 55
        assert_eq!(g.current_slot().attention, 51);
        g.apply_signal(50); // dead-band
        assert_eq!(g.current_slot().attention, 51);
        g.apply_signal(30); // below lower 45
        assert_eq!(g.current_slot().attention, 50);
    }
}
