//! race.rs
//! Lane-racing domain: attention drives speed, lateral inputs change lanes,
//! collisions cost a decaying speed penalty, a ghost opponent paces the run.
//!
//! Distances are in meters, the visible field is `field_depth` deep with
//! the player pinned to a band at the bottom. Obstacles spawn in a random
//! lane every `obstacle_interval` meters of player distance and advance at
//! the player's speed, so braking also slows the hazards.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::sim::engine::Simulation;
use crate::sim::hysteresis::Hysteresis;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceConfig {
    pub lane_count: usize,
    pub base_speed: f64,
    /// Speed bonus starts once scaled attention clears this.
    pub attention_threshold: f64,
    /// The two race implementations upstream disagreed on whether the
    /// attention input is halved before thresholding; the factor is an
    /// explicit knob instead of a guess. 0.5 reproduces the shipped game.
    pub attention_scale: f64,
    /// Keyboard nudge per manual input.
    pub attention_step: i32,
    /// Per-tick nudge in bridge mode; softer than the keyboard.
    pub control_sensitivity: i32,
    pub min_attention: i32,
    pub max_attention: i32,
    pub lower_threshold: i32,
    pub upper_threshold: i32,
    pub penalty_speed_loss: f64,
    /// Penalty recovered per second.
    pub penalty_recovery_rate: f64,
    /// Ghost runs at base_speed + bonus, constant.
    pub ghost_speed_bonus: f64,
    /// Player distance between obstacle spawns.
    pub obstacle_interval: f64,
    pub field_depth: f64,
    /// Player collision band at the bottom of the field.
    pub car_zone: f64,
    pub obstacle_length: f64,
    /// Fixed seed for deterministic runs; None draws from the OS.
    pub seed: Option<u64>,
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self {
            lane_count: 3,
            base_speed: 5.0,
            attention_threshold: 50.0,
            attention_scale: 0.5,
            attention_step: 5,
            control_sensitivity: 1,
            min_attention: 0,
            max_attention: 200,
            lower_threshold: 25,
            upper_threshold: 35,
            penalty_speed_loss: 3.0,
            penalty_recovery_rate: 1.0,
            ghost_speed_bonus: 40.0,
            obstacle_interval: 10.0,
            field_depth: 40.0,
            car_zone: 5.0,
            obstacle_length: 4.5,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Obstacle {
    pub lane: usize,
    /// Distance from the top of the visible field.
    pub y: f64,
}

/// End-of-session report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceSummary {
    pub elapsed_secs: f64,
    /// Fraction of time spent with attention above the threshold.
    pub focus_ratio: f64,
}

pub struct RaceState {
    cfg: RaceConfig,
    hysteresis: Hysteresis,
    attention: i32,
    player_lane: usize,
    distance: f64,
    ghost_distance: f64,
    last_obstacle_at: f64,
    obstacles: Vec<Obstacle>,
    collision_penalty: f64,
    total_time: f64,
    focused_time: f64,
    rng: StdRng,
}

impl RaceState {
    pub fn new(cfg: RaceConfig) -> Self {
        let hysteresis = Hysteresis {
            lower: cfg.lower_threshold,
            upper: cfg.upper_threshold,
            step: cfg.control_sensitivity,
            min: cfg.min_attention,
            max: cfg.max_attention,
        };
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            player_lane: cfg.lane_count / 2,
            hysteresis,
            attention: 50,
            distance: 0.0,
            ghost_distance: 0.0,
            last_obstacle_at: 0.0,
            obstacles: Vec::new(),
            collision_penalty: 0.0,
            total_time: 0.0,
            focused_time: 0.0,
            rng,
            cfg,
        }
    }

    pub fn attention(&self) -> i32 {
        self.attention
    }

    pub fn player_lane(&self) -> usize {
        self.player_lane
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn ghost_distance(&self) -> f64 {
        self.ghost_distance
    }

    pub fn collision_penalty(&self) -> f64 {
        self.collision_penalty
    }

    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Current speed in m/s, derived from attention and penalty.
    pub fn speed(&self) -> f64 {
        let extra = (self.attention as f64 * self.cfg.attention_scale
            - self.cfg.attention_threshold)
            .max(0.0);
        self.cfg.base_speed + extra - self.collision_penalty
    }

    pub fn summary(&self) -> RaceSummary {
        let focus_ratio = if self.total_time > 0.0 {
            self.focused_time / self.total_time
        } else {
            0.0
        };
        RaceSummary {
            elapsed_secs: self.total_time,
            focus_ratio,
        }
    }

    /// Drop an obstacle at an exact spot. Test hook for collision cases.
    #[cfg(test)]
    pub(crate) fn place_obstacle(&mut self, lane: usize, y: f64) {
        self.obstacles.push(Obstacle { lane, y });
    }
}

impl Simulation for RaceState {
    fn apply_signal(&mut self, signal: i32) {
        self.attention = self.hysteresis.apply(self.attention, signal);
    }

    fn manual_adjust(&mut self, delta: i32) {
        self.attention = (self.attention + delta * self.cfg.attention_step)
            .clamp(self.cfg.min_attention, self.cfg.max_attention);
    }

    fn shift_lane(&mut self, dir: i32) {
        let max_lane = self.cfg.lane_count.saturating_sub(1) as i64;
        self.player_lane = (self.player_lane as i64 + dir as i64).clamp(0, max_lane) as usize;
    }

    fn step(&mut self, dt: f64) {
        self.total_time += dt;

        let speed = self.speed();
        self.collision_penalty =
            (self.collision_penalty - self.cfg.penalty_recovery_rate * dt).max(0.0);

        // Unscaled attention vs. threshold, as the session stat was defined.
        if self.attention as f64 > self.cfg.attention_threshold {
            self.focused_time += dt;
        }

        self.distance += speed * dt;
        self.ghost_distance += (self.cfg.base_speed + self.cfg.ghost_speed_bonus) * dt;

        if self.distance - self.last_obstacle_at >= self.cfg.obstacle_interval {
            let lane = self.rng.random_range(0..self.cfg.lane_count);
            self.obstacles.push(Obstacle { lane, y: 0.0 });
            self.last_obstacle_at = self.distance;
        }

        let field_depth = self.cfg.field_depth;
        let band_top = field_depth - self.cfg.car_zone;
        let obstacle_length = self.cfg.obstacle_length;
        let player_lane = self.player_lane;
        let mut penalty_hits = 0u32;
        let mut survivors = Vec::with_capacity(self.obstacles.len());
        for mut obstacle in self.obstacles.drain(..) {
            obstacle.y += speed * dt;
            let hit = obstacle.lane == player_lane
                && obstacle.y + obstacle_length >= band_top
                && obstacle.y <= field_depth;
            if hit {
                // One collision credit, then the obstacle is gone.
                penalty_hits += 1;
            } else if obstacle.y <= field_depth {
                survivors.push(obstacle);
            }
        }
        self.obstacles = survivors;
        self.collision_penalty += penalty_hits as f64 * self.cfg.penalty_speed_loss;
    }

    fn hud(&self) -> Vec<String> {
        vec![
            format!("distance: {:.1} m", self.distance),
            format!("attention: {}", self.attention),
            format!("speed: {:.1} m/s", self.speed()),
            format!("ghost: {:.1} m", self.ghost_distance),
            format!("lane: {}", self.player_lane),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn quiet_cfg() -> RaceConfig {
        RaceConfig {
            obstacle_interval: f64::INFINITY,
            seed: Some(42),
            ..RaceConfig::default()
        }
    }

    #[test]
    fn dead_band_signal_leaves_attention_unchanged() {
        let mut race = RaceState::new(quiet_cfg());
        for signal in 25..=35 {
            race.apply_signal(signal);
        }
        assert_eq!(race.attention(), 50);
    }

    #[test]
    fn high_signal_accelerates_low_signal_brakes() {
        let mut race = RaceState::new(quiet_cfg());
        for _ in 0..20 {
            race.apply_signal(80);
        }
        assert_eq!(race.attention(), 70);
        for _ in 0..100 {
            race.apply_signal(10);
        }
        assert_eq!(race.attention(), 0); // clamped at min
    }

    #[test]
    fn speed_formula_applies_scale_threshold_and_penalty() {
        let mut race = RaceState::new(quiet_cfg());
        // attention 50, scale 0.5 → 25, below threshold 50 → no bonus.
        assert_eq!(race.speed(), 5.0);

        for _ in 0..70 {
            race.apply_signal(99);
        }
        // attention 120 → 120*0.5 - 50 = 10 extra.
        assert_eq!(race.attention(), 120);
        assert!((race.speed() - 15.0).abs() < 1e-9);

        race.collision_penalty = 3.0;
        assert!((race.speed() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn lane_changes_clamp_to_valid_range() {
        let mut race = RaceState::new(quiet_cfg());
        assert_eq!(race.player_lane(), 1);
        race.shift_lane(-1);
        race.shift_lane(-1);
        assert_eq!(race.player_lane(), 0);
        race.shift_lane(1);
        race.shift_lane(1);
        race.shift_lane(1);
        assert_eq!(race.player_lane(), 2);
    }

    #[test]
    fn collision_adds_one_penalty_and_removes_the_obstacle() {
        let mut race = RaceState::new(quiet_cfg());
        let lane = race.player_lane();
        race.place_obstacle(lane, 36.0); // inside the 35..40 player band

        race.step(DT);
        assert!(
            (race.collision_penalty() - 3.0).abs() < 1e-9,
            "penalty {} after collision",
            race.collision_penalty()
        );
        assert!(race.obstacles().is_empty(), "obstacle must be consumed");

        // No second credit from the same obstacle.
        race.step(DT);
        assert!(race.collision_penalty() < 3.0);
    }

    #[test]
    fn other_lane_obstacles_do_not_collide() {
        let mut race = RaceState::new(quiet_cfg());
        let other = (race.player_lane() + 1) % 3;
        race.place_obstacle(other, 36.0);
        race.step(DT);
        assert_eq!(race.collision_penalty(), 0.0);
    }

    #[test]
    fn penalty_decays_to_zero_within_penalty_over_rate_seconds() {
        let mut race = RaceState::new(quiet_cfg());
        race.collision_penalty = 3.0;
        // 3.0 / 1.0 per sec = 3 s = 180 ticks, ±1 tick.
        for _ in 0..181 {
            race.step(DT);
        }
        assert_eq!(race.collision_penalty(), 0.0);
    }

    #[test]
    fn obstacles_spawn_every_interval_and_fall_off_the_field() {
        let mut race = RaceState::new(RaceConfig {
            seed: Some(7),
            ..RaceConfig::default()
        });
        for _ in 0..70 {
            race.apply_signal(99); // speed up so distance accumulates
        }
        let mut seen_any = false;
        for _ in 0..60 * 30 {
            race.step(DT);
            seen_any |= !race.obstacles().is_empty();
            for o in race.obstacles() {
                assert!(o.lane < 3);
                assert!(o.y <= race.cfg.field_depth + 1e-9);
            }
        }
        assert!(seen_any, "expected obstacles to spawn over 30 s");
    }

    #[test]
    fn summary_tracks_focused_fraction() {
        let mut race = RaceState::new(quiet_cfg());
        for _ in 0..70 {
            race.apply_signal(99);
        }
        for _ in 0..60 {
            race.step(DT);
        }
        let s = race.summary();
        assert!((s.elapsed_secs - 1.0).abs() < 1e-6);
        assert!((s.focus_ratio - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ghost_outpaces_an_idle_player() {
        let mut race = RaceState::new(quiet_cfg());
        for _ in 0..120 {
            race.step(DT);
        }
        assert!(race.ghost_distance() > race.distance());
    }
}
