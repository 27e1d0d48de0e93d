//! Traffic signals at intersections.

use bevy::prelude::*;
use rand::Rng;

use crate::roads::RoadAxis;

/// Seconds each phase stays green.
pub const SIGNAL_CYCLE_SECS: f32 = 5.0;

/// Which axis currently has right of way. `NorthSouth` is traffic along Z.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalPhase {
    NorthSouth,
    EastWest,
}

impl SignalPhase {
    pub fn flipped(self) -> Self {
        match self {
            SignalPhase::NorthSouth => SignalPhase::EastWest,
            SignalPhase::EastWest => SignalPhase::NorthSouth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrafficSignal {
    pub position: Vec2,
    pub phase: SignalPhase,
    /// Time spent in the current phase.
    pub timer: f32,
}

impl TrafficSignal {
    pub fn new(position: Vec2, rng: &mut impl Rng) -> Self {
        let phase = if rng.gen_bool(0.5) {
            SignalPhase::NorthSouth
        } else {
            SignalPhase::EastWest
        };
        Self {
            position,
            phase,
            timer: 0.0,
        }
    }

    pub fn tick(&mut self, dt: f32) {
        self.timer += dt;
        while self.timer >= SIGNAL_CYCLE_SECS {
            self.timer -= SIGNAL_CYCLE_SECS;
            self.phase = self.phase.flipped();
        }
    }

    /// Red for traffic travelling along `axis`.
    pub fn is_red_for(&self, axis: RoadAxis) -> bool {
        match axis {
            RoadAxis::AlongX => self.phase == SignalPhase::NorthSouth,
            RoadAxis::AlongZ => self.phase == SignalPhase::EastWest,
            RoadAxis::Angled(_) => false,
        }
    }
}

/// One signal per intersection.
pub fn spawn_signals(intersections: &[Vec2], rng: &mut impl Rng) -> Vec<TrafficSignal> {
    intersections.iter().map(|&p| TrafficSignal::new(p, rng)).collect()
}
